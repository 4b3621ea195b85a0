//! Persisted camera calibration: pinhole intrinsics plus lens distortion.

use crate::{rodrigues_to_matrix, Pose};
use nalgebra::{Matrix3, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(
        "camera calibration '{path}' not found; run the camera calibration step first to produce it"
    )]
    Missing { path: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("camera matrix is not invertible")]
    SingularCameraMatrix,
}

/// Brown–Conrady lens distortion in OpenCV coefficient order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    /// Build from an OpenCV-style coefficient vector `[k1, k2, p1, p2, k3, ...]`.
    ///
    /// Missing trailing terms are zero; rational/thin-prism terms beyond `k3`
    /// are ignored.
    pub fn from_coeffs(coeffs: &[f64]) -> Self {
        if coeffs.len() > 5 {
            log::warn!(
                "ignoring {} distortion coefficients beyond k3",
                coeffs.len() - 5
            );
        }
        let c = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Self {
            k1: c(0),
            k2: c(1),
            p1: c(2),
            p2: c(3),
            k3: c(4),
        }
    }

    pub fn to_coeffs(&self) -> Vec<f64> {
        vec![self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Apply distortion to a normalized image point.
    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, d: &Vector2<f64>) -> Vector2<f64> {
        if self.is_zero() {
            return *d;
        }
        let mut u = *d;
        for _ in 0..20 {
            let err = self.distort(&u) - d;
            u -= err;
            if err.norm_squared() < 1e-24 {
                break;
            }
        }
        u
    }
}

#[derive(Serialize, Deserialize)]
struct CalibrationFile {
    camera_matrix: [[f64; 3]; 3],
    dist_coeffs: Vec<f64>,
}

/// Camera intrinsics and distortion, loaded once per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CalibrationFile", into = "CalibrationFile")]
pub struct CameraCalibration {
    camera_matrix: Matrix3<f64>,
    k_inv: Matrix3<f64>,
    distortion: Distortion,
}

impl TryFrom<CalibrationFile> for CameraCalibration {
    type Error = CalibrationError;

    fn try_from(file: CalibrationFile) -> Result<Self, Self::Error> {
        let rows = file.camera_matrix;
        let k = Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]);
        Self::new(k, Distortion::from_coeffs(&file.dist_coeffs))
    }
}

impl From<CameraCalibration> for CalibrationFile {
    fn from(c: CameraCalibration) -> Self {
        let k = c.camera_matrix;
        Self {
            camera_matrix: [
                [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
                [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
                [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
            ],
            dist_coeffs: c.distortion.to_coeffs(),
        }
    }
}

impl CameraCalibration {
    pub fn new(camera_matrix: Matrix3<f64>, distortion: Distortion) -> Result<Self, CalibrationError> {
        let k_inv = camera_matrix
            .try_inverse()
            .ok_or(CalibrationError::SingularCameraMatrix)?;
        Ok(Self {
            camera_matrix,
            k_inv,
            distortion,
        })
    }

    /// Calibration from `fx, fy, cx, cy` without distortion.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CalibrationError> {
        Self::new(
            Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            Distortion::default(),
        )
    }

    #[inline]
    pub fn camera_matrix(&self) -> &Matrix3<f64> {
        &self.camera_matrix
    }

    #[inline]
    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    /// Load a calibration record from JSON on disk.
    ///
    /// A missing file is reported as [`CalibrationError::Missing`] so callers
    /// can point the user at the calibration step.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => CalibrationError::Missing {
                path: path.display().to_string(),
            },
            _ => CalibrationError::Io(err),
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this calibration to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Map a pixel to undistorted normalized image coordinates.
    pub fn pixel_to_normalized(&self, p: &Point2<f64>) -> Vector2<f64> {
        let v = self.k_inv * p.to_homogeneous();
        self.distortion.undistort(&Vector2::new(v.x / v.z, v.y / v.z))
    }

    /// Map normalized (undistorted) coordinates to a distorted pixel.
    pub fn normalized_to_pixel(&self, n: &Vector2<f64>) -> Point2<f64> {
        let d = self.distortion.distort(n);
        let v = self.camera_matrix * d.push(1.0);
        Point2::new(v.x / v.z, v.y / v.z)
    }

    /// Project target-frame points into the image through `pose`.
    ///
    /// Points at or behind the camera plane yield `None`.
    pub fn project_points(&self, pose: &Pose, points: &[Point3<f64>]) -> Vec<Option<Point2<f64>>> {
        let r = rodrigues_to_matrix(&pose.rvec);
        points
            .iter()
            .map(|p| {
                let pc = r * p.coords + pose.tvec;
                if pc.z <= f64::EPSILON {
                    return None;
                }
                Some(self.normalized_to_pixel(&Vector2::new(pc.x / pc.z, pc.y / pc.z)))
            })
            .collect()
    }
}
