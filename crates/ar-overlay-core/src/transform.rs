//! Conversions from vision-side geometry into renderer-ready transforms.
//!
//! The vision side (OpenCV-style solvers) uses a right-handed camera frame
//! with X right, Y down and Z forward. OpenGL-style renderers look down -Z
//! with Y up. Both transforms produced here are exported in OpenGL
//! column-major order, ready for `glLoadMatrixf`/`glMultMatrixf`.

use crate::{rodrigues_to_matrix, Pose};
use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

/// Basis change from the vision camera frame to the GL camera frame.
///
/// Negates the Y and Z rows; it is its own inverse.
pub const VISION_TO_GL: Matrix4<f64> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0, //
    0.0, -1.0, 0.0, 0.0, //
    0.0, 0.0, -1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
);

/// Errors returned when building a projection transform.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },
    #[error("invalid clip range (near={near}, far={far})")]
    InvalidClipRange { near: f64, far: f64 },
    #[error("camera matrix has a non-positive focal length (fx={fx}, fy={fy})")]
    InvalidFocalLength { fx: f64, fy: f64 },
}

/// Model-view transform placing a marker's local frame in GL camera space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelTransform {
    pub m: Matrix4<f64>,
}

impl ModelTransform {
    pub fn new(m: Matrix4<f64>) -> Self {
        Self { m }
    }

    /// Column-major array for a GL matrix load.
    pub fn to_gl(&self) -> [f32; 16] {
        to_gl_array(&self.m)
    }

    /// Translation of the marker in the *vision* camera frame.
    ///
    /// Undoes the axis flip applied by [`extrinsic_to_model_view`].
    pub fn marker_translation(&self) -> Vector3<f64> {
        let gl = self.m.fixed_view::<3, 1>(0, 3).into_owned();
        Vector3::new(gl.x, -gl.y, -gl.z)
    }

    /// Compose a mesh binding on top of the marker transform.
    ///
    /// Produces `M · S(scale) · T(offset)`: the offset is expressed in the
    /// scaled model frame.
    pub fn compose_binding(&self, scale: f64, offset: &Vector3<f64>) -> Self {
        let s = Matrix4::new_scaling(scale);
        let t = Matrix4::new_translation(offset);
        Self::new(self.m * s * t)
    }
}

/// Perspective projection matching a pinhole camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionTransform {
    pub m: Matrix4<f64>,
}

impl ProjectionTransform {
    /// Column-major array for a GL matrix load.
    pub fn to_gl(&self) -> [f32; 16] {
        to_gl_array(&self.m)
    }
}

fn to_gl_array(m: &Matrix4<f64>) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    // nalgebra storage is column-major already.
    for (dst, src) in out.iter_mut().zip(m.as_slice()) {
        *dst = *src as f32;
    }
    out
}

/// Build the model-view transform for a solver pose.
///
/// `M = F · [R | t]` where `R` is the Rodrigues expansion of `pose.rvec` and
/// `F` is [`VISION_TO_GL`]. A zero pose therefore yields `F` itself.
pub fn extrinsic_to_model_view(pose: &Pose) -> ModelTransform {
    let r = rodrigues_to_matrix(&pose.rvec);
    let mut rt = Matrix4::identity();
    rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    rt.fixed_view_mut::<3, 1>(0, 3).copy_from(&pose.tvec);
    ModelTransform::new(VISION_TO_GL * rt)
}

/// Build an off-axis GL projection from pinhole intrinsics.
///
/// The principal point is folded into the third column instead of being
/// assumed at the image center, so a point projecting to pixel `(u, v)`
/// lands at NDC `(2u/w - 1, 1 - 2v/h)`.
pub fn intrinsics_to_projection(
    k: &Matrix3<f64>,
    width: u32,
    height: u32,
    near: f64,
    far: f64,
) -> Result<ProjectionTransform, TransformError> {
    if width == 0 || height == 0 {
        return Err(TransformError::InvalidViewport { width, height });
    }
    if !(near > 0.0 && far > near && far.is_finite()) {
        return Err(TransformError::InvalidClipRange { near, far });
    }
    let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
    if !(fx > 0.0 && fy > 0.0) {
        return Err(TransformError::InvalidFocalLength { fx, fy });
    }
    let (cx, cy) = (k[(0, 2)], k[(1, 2)]);
    let (w, h) = (width as f64, height as f64);

    let m = Matrix4::new(
        2.0 * fx / w, 0.0, 1.0 - 2.0 * cx / w, 0.0, //
        0.0, 2.0 * fy / h, 2.0 * cy / h - 1.0, 0.0, //
        0.0, 0.0, -(far + near) / (far - near), -2.0 * far * near / (far - near), //
        0.0, 0.0, -1.0, 0.0,
    );
    Ok(ProjectionTransform { m })
}
