//! Mutable per-run tracking state.

use crate::filter::FilterState;
use ar_overlay_core::{
    intrinsics_to_projection, MarkerId, ModelTransform, ProjectionTransform, TransformError,
};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Projection transform memoized on its inputs.
#[derive(Clone, Debug, Default)]
pub struct ProjectionCache {
    key: Option<(Matrix3<f64>, u32, u32, f64, f64)>,
    current: Option<ProjectionTransform>,
}

impl ProjectionCache {
    /// Return the projection for these inputs, rebuilding it only when they
    /// changed. The flag is `true` on a rebuild.
    pub fn get_or_update(
        &mut self,
        k: &Matrix3<f64>,
        width: u32,
        height: u32,
        near: f64,
        far: f64,
    ) -> Result<(ProjectionTransform, bool), TransformError> {
        let key = (*k, width, height, near, far);
        if let (Some(cached_key), Some(proj)) = (&self.key, &self.current) {
            if *cached_key == key {
                return Ok((*proj, false));
            }
        }
        let proj = intrinsics_to_projection(k, width, height, near, far)?;
        log::debug!("projection rebuilt for {width}x{height} viewport");
        self.key = Some(key);
        self.current = Some(proj);
        Ok((proj, true))
    }

    pub fn current(&self) -> Option<&ProjectionTransform> {
        self.current.as_ref()
    }
}

/// Whether a marker has ever produced an accepted pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerState {
    Unseen,
    Tracked(ModelTransform),
}

/// Running counters for a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames: u64,
    pub transform_computations: u64,
    pub transform_reuses: u64,
    pub solve_failures: u64,
}

/// Filter state, retained transforms and projection cache for one run.
///
/// Retained transforms survive marker dropouts: a marker that disappears
/// for any number of frames keeps its last accepted transform.
#[derive(Clone, Debug, Default)]
pub struct TrackingSession {
    pub(crate) filters: HashMap<MarkerId, FilterState>,
    pub(crate) transforms: HashMap<MarkerId, ModelTransform>,
    pub(crate) projection: ProjectionCache,
    pub(crate) stats: SessionStats,
}

impl TrackingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: MarkerId) -> MarkerState {
        match self.transforms.get(&id) {
            Some(m) => MarkerState::Tracked(*m),
            None => MarkerState::Unseen,
        }
    }

    pub fn retained_transform(&self, id: MarkerId) -> Option<&ModelTransform> {
        self.transforms.get(&id)
    }

    pub fn filter_state(&self, id: MarkerId) -> FilterState {
        self.filters.get(&id).copied().unwrap_or_default()
    }

    pub fn projection(&self) -> Option<&ProjectionTransform> {
        self.projection.current()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}
