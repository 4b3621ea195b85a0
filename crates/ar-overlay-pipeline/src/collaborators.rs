//! Seams to the external collaborators of the pipeline.
//!
//! Frame capture, marker detection and rasterization live outside this
//! workspace. The pipeline only talks to them through these traits.

use ar_overlay_core::{DetectedMarker, ModelTransform, ProjectionTransform};
use ar_overlay_mesh::Mesh;
use serde::{Deserialize, Serialize};

/// Opaque handle to a mesh uploaded to a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(pub u32);

/// A raster frame; only its size matters to the pipeline.
pub trait Frame {
    fn dimensions(&self) -> (u32, u32);
}

/// Source of successive frames.
///
/// `None` means end of stream (device closed, read failure, file exhausted);
/// it is never an error.
pub trait FrameSource {
    type Frame: Frame;

    fn next_frame(&mut self) -> Option<Self::Frame>;
}

/// Finds markers in a frame.
///
/// May return nothing for a marker that is physically present (occlusion,
/// blur); the pipeline tolerates that.
pub trait MarkerDetector<F> {
    fn detect(&mut self, frame: &F) -> Vec<DetectedMarker>;
}

/// Consumer of projection and model-view transforms.
pub trait Renderer {
    /// Register mesh geometry once at startup.
    fn upload_mesh(&mut self, mesh: &Mesh) -> MeshHandle;
    /// Install a new projection (on startup and whenever the viewport changes).
    fn set_projection(&mut self, projection: &ProjectionTransform);
    /// Draw the marker's coordinate axes with the given arm length in meters.
    fn draw_axes(&mut self, transform: &ModelTransform, length: f64);
    fn draw_mesh(&mut self, mesh: MeshHandle, transform: &ModelTransform);
    /// Finish the frame (buffer swap).
    fn present(&mut self);
}
