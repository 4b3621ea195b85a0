use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Identifier of a physical marker pattern.
///
/// Stable across frames; all per-marker state is keyed by it.
pub type MarkerId = u32;

/// Rigid pose of a reference target in the camera frame.
///
/// `rvec` is a Rodrigues axis-angle vector, `tvec` is in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    /// Both vectors free of NaN and infinities.
    pub fn is_finite(&self) -> bool {
        self.rvec.iter().chain(self.tvec.iter()).all(|v| v.is_finite())
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }
}

/// One marker returned by a detector for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: MarkerId,
    /// Pixel corners ordered top-left, top-right, bottom-right, bottom-left.
    pub corners: Vec<Point2<f64>>,
}

impl DetectedMarker {
    pub fn new(id: MarkerId, corners: Vec<Point2<f64>>) -> Self {
        Self { id, corners }
    }
}
