//! Marker id → mesh binding table.

use crate::{MeshHandle, Renderer};
use ar_overlay_core::MarkerId;
use ar_overlay_mesh::{load_mesh, MeshError, MeshLoadOptions};
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, HashMap};
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("failed to load mesh for marker {marker_id}: {source}")]
    Mesh {
        marker_id: MarkerId,
        #[source]
        source: MeshError,
    },
    #[error("marker {0} is bound more than once")]
    DuplicateMarker(MarkerId),
    #[error("marker {marker_id} has invalid scale {scale}")]
    InvalidScale { marker_id: MarkerId, scale: f64 },
}

fn default_scale() -> f64 {
    0.01
}

/// One binding as written in configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelBindingConfig {
    pub marker_id: MarkerId,
    pub mesh_path: PathBuf,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub load: MeshLoadOptions,
}

/// What to draw on a marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelBinding {
    pub mesh: MeshHandle,
    pub scale: f64,
}

/// Read-only lookup table built once at startup.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    bindings: HashMap<MarkerId, ModelBinding>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding; each marker can be bound once.
    pub fn insert(&mut self, marker_id: MarkerId, binding: ModelBinding) -> Result<(), RegistryError> {
        if !(binding.scale.is_finite() && binding.scale > 0.0) {
            return Err(RegistryError::InvalidScale {
                marker_id,
                scale: binding.scale,
            });
        }
        match self.bindings.entry(marker_id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateMarker(marker_id)),
            Entry::Vacant(slot) => {
                slot.insert(binding);
                Ok(())
            }
        }
    }

    /// Load every configured mesh, upload it and bind it.
    ///
    /// Any missing or malformed mesh aborts the whole load.
    pub fn load<R: Renderer>(
        configs: &[ModelBindingConfig],
        renderer: &mut R,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for cfg in configs {
            let mesh = load_mesh(&cfg.mesh_path, &cfg.load).map_err(|source| {
                RegistryError::Mesh {
                    marker_id: cfg.marker_id,
                    source,
                }
            })?;
            let handle = renderer.upload_mesh(&mesh);
            registry.insert(
                cfg.marker_id,
                ModelBinding {
                    mesh: handle,
                    scale: cfg.scale,
                },
            )?;
            log::info!(
                "bound marker {} to '{}' (scale {})",
                cfg.marker_id,
                cfg.mesh_path.display(),
                cfg.scale
            );
        }
        Ok(registry)
    }

    #[inline]
    pub fn get(&self, marker_id: MarkerId) -> Option<&ModelBinding> {
        self.bindings.get(&marker_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
