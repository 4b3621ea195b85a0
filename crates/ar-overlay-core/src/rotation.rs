//! Rodrigues (axis-angle) conversions.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Expand a Rodrigues vector into a 3×3 rotation matrix.
///
/// The vector direction is the rotation axis and its norm the angle in
/// radians; a zero vector maps to the identity.
pub fn rodrigues_to_matrix(rvec: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*rvec).into_inner()
}

/// Collapse a rotation matrix into a Rodrigues vector.
///
/// The input is re-orthonormalized first, so slightly drifted matrices
/// (e.g. from a linear solve) are accepted.
pub fn matrix_to_rodrigues(r: &Matrix3<f64>) -> Vector3<f64> {
    Rotation3::from_matrix_eps(r, 1e-12, 64, Rotation3::identity()).scaled_axis()
}
