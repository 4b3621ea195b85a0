//! Planar perspective-n-point.

use ar_overlay_core::{
    estimate_homography, matrix_to_rodrigues, rodrigues_to_matrix, CameraCalibration, Pose,
};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors returned by pose solvers.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("object/image point count mismatch ({object} vs {image})")]
    CountMismatch { object: usize, image: usize },
    #[error("object points are not planar (max |z| = {max_z})")]
    NonPlanar { max_z: f64 },
    #[error("degenerate correspondence geometry")]
    Degenerate,
    #[error("pose places the target behind the camera")]
    BehindCamera,
    #[error("solver returned a non-finite pose")]
    NonFinite,
}

/// Recovers a target pose from 2-D/3-D correspondences.
///
/// Implementations fail per call; callers treat a failure as "no pose this
/// frame" for that target.
pub trait PoseSolver {
    fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        calib: &CameraCalibration,
    ) -> Result<Pose, PoseError>;
}

/// Tuning for [`PlanarPoseSolver`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Gauss–Newton iterations after the linear initialization; `0` disables refinement.
    pub refine_iterations: usize,
    /// Tolerance on `|z|` for object points, relative to the target extent.
    pub planarity_tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            refine_iterations: 10,
            planarity_tolerance: 1e-6,
        }
    }
}

/// PnP for targets lying in their own `z = 0` plane.
#[derive(Clone, Debug, Default)]
pub struct PlanarPoseSolver {
    params: SolverParams,
}

impl PlanarPoseSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &SolverParams {
        &self.params
    }
}

impl PoseSolver for PlanarPoseSolver {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(points = object.len()))
    )]
    fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        calib: &CameraCalibration,
    ) -> Result<Pose, PoseError> {
        if object.len() != image.len() {
            return Err(PoseError::CountMismatch {
                object: object.len(),
                image: image.len(),
            });
        }
        if object.len() < 4 {
            return Err(PoseError::NotEnoughPoints(object.len()));
        }

        let extent = object
            .iter()
            .map(|p| p.coords.norm())
            .fold(0.0_f64, f64::max)
            .max(f64::MIN_POSITIVE);
        let max_z = object.iter().map(|p| p.z.abs()).fold(0.0_f64, f64::max);
        if max_z > self.params.planarity_tolerance * extent {
            return Err(PoseError::NonPlanar { max_z });
        }

        let plane: Vec<Point2<f64>> = object.iter().map(|p| Point2::new(p.x, p.y)).collect();
        let normalized: Vec<Point2<f64>> = image
            .iter()
            .map(|p| Point2::from(calib.pixel_to_normalized(p)))
            .collect();
        if !well_spread(&plane) || !well_spread(&normalized) {
            return Err(PoseError::Degenerate);
        }

        let h = estimate_homography(&plane, &normalized).ok_or(PoseError::Degenerate)?;
        let initial = decompose_planar_homography(&h.h)?;

        let pose = if self.params.refine_iterations > 0 {
            refine_pose(initial, object, &normalized, self.params.refine_iterations)
        } else {
            initial
        };

        if pose.tvec.z <= 0.0 {
            return Err(PoseError::BehindCamera);
        }
        log::trace!("solved pose rvec={:?} tvec={:?}", pose.rvec, pose.tvec);
        Ok(pose)
    }
}

/// Reject point sets that are (nearly) collinear or collapsed.
fn well_spread(pts: &[Point2<f64>]) -> bool {
    let n = pts.len() as f64;
    let (mx, my) = pts
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x / n, sy + p.y / n));
    let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
    for p in pts {
        let (dx, dy) = (p.x - mx, p.y - my);
        a += dx * dx;
        b += dx * dy;
        c += dy * dy;
    }
    let half_tr = 0.5 * (a + c);
    let disc = (0.25 * (a - c) * (a - c) + b * b).sqrt();
    let (l_max, l_min) = (half_tr + disc, half_tr - disc);
    l_max > 0.0 && l_min > 1e-8 * l_max
}

/// Split `H ~ [r1 r2 t]` (plane → normalized image) into a rigid pose.
fn decompose_planar_homography(h: &Matrix3<f64>) -> Result<Pose, PoseError> {
    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let norm = 0.5 * (h1.norm() + h2.norm());
    if norm < 1e-12 {
        return Err(PoseError::Degenerate);
    }
    // Sign chosen so the target sits in front of the camera.
    let lambda = if h3.z < 0.0 { -1.0 / norm } else { 1.0 / norm };

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let r_approx = Matrix3::from_columns(&[r1, r2, r3]);

    // Project onto SO(3).
    let svd = r_approx.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(PoseError::Degenerate);
    };
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }

    Ok(Pose::new(matrix_to_rodrigues(&r), h3 * lambda))
}

fn residuals(
    params: &DVector<f64>,
    object: &[Point3<f64>],
    observed: &[Point2<f64>],
) -> Option<DVector<f64>> {
    let r = rodrigues_to_matrix(&Vector3::new(params[0], params[1], params[2]));
    let t = Vector3::new(params[3], params[4], params[5]);
    let mut out = DVector::zeros(2 * object.len());
    for (k, (p, o)) in object.iter().zip(observed).enumerate() {
        let pc = r * p.coords + t;
        if pc.z <= f64::EPSILON {
            return None;
        }
        out[2 * k] = pc.x / pc.z - o.x;
        out[2 * k + 1] = pc.y / pc.z - o.y;
    }
    Some(out)
}

/// Levenberg-damped Gauss–Newton on normalized reprojection error.
///
/// Steps that would increase the cost (or push points behind the camera) are
/// rejected; the best pose seen is returned.
fn refine_pose(
    initial: Pose,
    object: &[Point3<f64>],
    observed: &[Point2<f64>],
    iterations: usize,
) -> Pose {
    const STEP: f64 = 1e-7;

    let mut x = DVector::from_column_slice(&[
        initial.rvec.x,
        initial.rvec.y,
        initial.rvec.z,
        initial.tvec.x,
        initial.tvec.y,
        initial.tvec.z,
    ]);
    let Some(mut r) = residuals(&x, object, observed) else {
        return initial;
    };
    let mut cost = r.norm_squared();
    let mut damping = 1e-6;

    for _ in 0..iterations {
        let mut jac = DMatrix::zeros(r.len(), 6);
        for i in 0..6 {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[i] += STEP;
            minus[i] -= STEP;
            let (Some(rp), Some(rm)) = (
                residuals(&plus, object, observed),
                residuals(&minus, object, observed),
            ) else {
                return to_pose(&x);
            };
            jac.set_column(i, &((rp - rm) / (2.0 * STEP)));
        }

        let jtj = jac.transpose() * &jac;
        let jtr = jac.transpose() * &r;
        let mut lhs = jtj.clone();
        for i in 0..6 {
            lhs[(i, i)] += damping * (1.0 + jtj[(i, i)]);
        }
        let Some(chol) = lhs.cholesky() else {
            break;
        };
        let delta = chol.solve(&(-jtr));
        let candidate = &x + &delta;

        match residuals(&candidate, object, observed) {
            Some(rc) if rc.norm_squared() < cost => {
                x = candidate;
                cost = rc.norm_squared();
                r = rc;
                damping = (damping * 0.1).max(1e-12);
                if delta.norm() < 1e-12 {
                    break;
                }
            }
            _ => damping *= 10.0,
        }
    }

    to_pose(&x)
}

fn to_pose(x: &DVector<f64>) -> Pose {
    Pose::new(Vector3::new(x[0], x[1], x[2]), Vector3::new(x[3], x[4], x[5]))
}
