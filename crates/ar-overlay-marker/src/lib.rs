//! Planar reference targets and pose recovery from their image corners.
//!
//! This crate focuses on:
//! - the metric layout of the supported references (square fiducial markers
//!   in the OpenCV single-marker corner order, and chessboard inner corners),
//! - a planar perspective-n-point solver (homography decomposition refined by
//!   Gauss–Newton on reprojection error).
//!
//! It does **not** detect markers. Corner sets come from an external detector.
//!
//! ## Quickstart
//!
//! ```
//! use ar_overlay_core::{CameraCalibration, Pose};
//! use ar_overlay_marker::{PlanarPoseSolver, PlanarTarget, PoseSolver};
//! use nalgebra::Vector3;
//!
//! let calib = CameraCalibration::pinhole(800.0, 800.0, 320.0, 240.0).unwrap();
//! let target = PlanarTarget::SquareMarker { length: 0.06 };
//! let object = target.object_points();
//!
//! let truth = Pose::new(Vector3::new(0.1, -0.2, 0.05), Vector3::new(0.01, 0.02, 0.5));
//! let image: Vec<_> = calib
//!     .project_points(&truth, &object)
//!     .into_iter()
//!     .map(Option::unwrap)
//!     .collect();
//!
//! let pose = PlanarPoseSolver::default().solve(&object, &image, &calib).unwrap();
//! assert!((pose.tvec - truth.tvec).norm() < 1e-6);
//! ```

mod solver;
mod target;

pub use solver::{PlanarPoseSolver, PoseError, PoseSolver, SolverParams};
pub use target::{chessboard_object_points, square_marker_object_points, PlanarTarget};
