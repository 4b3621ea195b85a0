//! Per-frame marker pose pipeline.

use crate::filter::FilterThresholds;
use crate::session::{SessionStats, TrackingSession};
use crate::{MeshHandle, ModelRegistry, OverlayAdjust, PipelineError, Renderer};
use ar_overlay_core::{
    extrinsic_to_model_view, CameraCalibration, DetectedMarker, MarkerId, ModelTransform,
};
use ar_overlay_marker::{PlanarTarget, PoseError, PoseSolver};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Tunables of [`MarkerPosePipeline`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Physical layout the detector's corners refer to.
    pub target: PlanarTarget,
    pub thresholds: FilterThresholds,
    /// Arm length of the axes drawn on unbound markers, in meters.
    pub axis_length: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            target: PlanarTarget::default(),
            thresholds: FilterThresholds::default(),
            axis_length: 0.1,
            near: 0.01,
            far: 100.0,
        }
    }
}

/// What happened to a detected marker's transform this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerOutcome {
    /// Pose accepted by the filter; transform rebuilt.
    Recomputed,
    /// Pose rejected as jitter; the retained transform was used.
    Reused,
    /// No pose this frame; the marker was skipped.
    SolveFailed { reason: String },
}

/// Draw call issued for a marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawKind {
    Axes,
    Mesh { handle: MeshHandle },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerReport {
    pub id: MarkerId,
    pub outcome: MarkerOutcome,
    pub draw: Option<DrawKind>,
}

/// Summary of one [`MarkerPosePipeline::process_frame`] call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub markers: Vec<MarkerReport>,
    /// Session counters after this frame.
    pub stats: SessionStats,
}

impl FrameReport {
    pub fn marker(&self, id: MarkerId) -> Option<&MarkerReport> {
        self.markers.iter().find(|m| m.id == id)
    }
}

/// Turns marker detections into draw calls.
///
/// Holds only immutable configuration. All state that evolves from frame to
/// frame lives in the [`TrackingSession`] passed to each call.
#[derive(Debug)]
pub struct MarkerPosePipeline<S> {
    calibration: CameraCalibration,
    solver: S,
    registry: ModelRegistry,
    params: PipelineParams,
    object_points: Vec<Point3<f64>>,
}

impl<S: PoseSolver> MarkerPosePipeline<S> {
    pub fn new(
        calibration: CameraCalibration,
        solver: S,
        registry: ModelRegistry,
        params: PipelineParams,
    ) -> Result<Self, PipelineError> {
        if !params.thresholds.validate() {
            return Err(PipelineError::InvalidThresholds);
        }
        if !(params.axis_length.is_finite() && params.axis_length > 0.0) {
            return Err(PipelineError::InvalidAxisLength(params.axis_length));
        }
        let object_points = params.target.object_points();
        Ok(Self {
            calibration,
            solver,
            registry,
            params,
            object_points,
        })
    }

    pub fn calibration(&self) -> &CameraCalibration {
        &self.calibration
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Make sure the renderer holds the projection for this viewport.
    ///
    /// The projection is rebuilt and pushed only when the viewport (or
    /// calibration) differs from the cached one. Returns `true` when it was
    /// pushed.
    pub fn prepare_viewport<R: Renderer>(
        &self,
        session: &mut TrackingSession,
        width: u32,
        height: u32,
        renderer: &mut R,
    ) -> Result<bool, PipelineError> {
        let (projection, rebuilt) = session.projection.get_or_update(
            self.calibration.camera_matrix(),
            width,
            height,
            self.params.near,
            self.params.far,
        )?;
        if rebuilt {
            renderer.set_projection(&projection);
        }
        Ok(rebuilt)
    }

    /// Run one frame's worth of detections through solve, filter, retain
    /// and dispatch.
    ///
    /// Markers are handled independently in detection order. A marker whose
    /// pose cannot be solved, or comes back non-finite, is skipped for this
    /// frame only; its retained transform and filter state are untouched.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(markers = detections.len()))
    )]
    pub fn process_frame<R: Renderer>(
        &self,
        session: &mut TrackingSession,
        detections: &[DetectedMarker],
        adjust: &OverlayAdjust,
        renderer: &mut R,
    ) -> FrameReport {
        let frame_index = session.stats.frames;
        session.stats.frames += 1;

        let mut markers = Vec::with_capacity(detections.len());
        for det in detections {
            let solved = self
                .solver
                .solve(&self.object_points, &det.corners, &self.calibration)
                .and_then(|pose| {
                    if pose.is_finite() {
                        Ok(pose)
                    } else {
                        Err(PoseError::NonFinite)
                    }
                });
            let pose = match solved {
                Ok(pose) => pose,
                Err(err) => {
                    log::warn!("marker {}: pose solve failed: {err}", det.id);
                    session.stats.solve_failures += 1;
                    markers.push(MarkerReport {
                        id: det.id,
                        outcome: MarkerOutcome::SolveFailed {
                            reason: err.to_string(),
                        },
                        draw: None,
                    });
                    continue;
                }
            };

            let accepted = session
                .filters
                .entry(det.id)
                .or_default()
                .update(&pose.tvec, &self.params.thresholds);

            let (transform, outcome) = match session.transforms.get(&det.id) {
                Some(retained) if !accepted => {
                    session.stats.transform_reuses += 1;
                    (*retained, MarkerOutcome::Reused)
                }
                _ => {
                    let fresh = extrinsic_to_model_view(&pose);
                    session.transforms.insert(det.id, fresh);
                    session.stats.transform_computations += 1;
                    (fresh, MarkerOutcome::Recomputed)
                }
            };
            log::debug!("marker {}: {:?}", det.id, outcome);

            let draw = self.dispatch(det.id, &transform, adjust, renderer);
            markers.push(MarkerReport {
                id: det.id,
                outcome,
                draw: Some(draw),
            });
        }

        FrameReport {
            frame_index,
            markers,
            stats: session.stats,
        }
    }

    fn dispatch<R: Renderer>(
        &self,
        id: MarkerId,
        transform: &ModelTransform,
        adjust: &OverlayAdjust,
        renderer: &mut R,
    ) -> DrawKind {
        match self.registry.get(id) {
            Some(binding) => {
                let placed = transform
                    .compose_binding(binding.scale * adjust.scale_factor, &adjust.offset);
                renderer.draw_mesh(binding.mesh, &placed);
                DrawKind::Mesh {
                    handle: binding.mesh,
                }
            }
            None => {
                renderer.draw_axes(transform, self.params.axis_length);
                DrawKind::Axes
            }
        }
    }
}
