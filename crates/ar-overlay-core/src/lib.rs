//! Core types and geometry for planar-marker AR overlays.
//!
//! This crate is purely geometric. It does *not* talk to a camera, a marker
//! detector or a renderer; it only knows how to describe what they exchange:
//! poses, camera calibration, and the 4×4 transforms an OpenGL-style renderer
//! consumes.

mod camera;
mod homography;
mod image;
mod logger;
mod rotation;
mod transform;
mod types;

pub use camera::{CalibrationError, CameraCalibration, Distortion};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::GrayImage;
pub use rotation::{matrix_to_rodrigues, rodrigues_to_matrix};
pub use transform::{
    extrinsic_to_model_view, intrinsics_to_projection, ModelTransform, ProjectionTransform,
    TransformError, VISION_TO_GL,
};
pub use types::{DetectedMarker, MarkerId, Pose};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
