//! High-level facade for the `ar-overlay-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates under short module names,
//! - an offline replay runner that drives recorded detections through the
//!   pose pipeline with a call-recording renderer,
//! - (feature `cli`) the `ar-overlay` binary with `chart` and `replay`
//!   subcommands.
//!
//! ## Quickstart
//!
//! ```no_run
//! use ar_overlay::replay::{run_replay, ReplayConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ReplayConfig::load_json("replay.json")?;
//! let report = run_replay(&cfg)?;
//! println!("{} frames, {} transforms computed", report.frames, report.stats.transform_computations);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ar_overlay::core`: poses, camera calibration, GL transforms, logging.
//! - `ar_overlay::marker`: marker/chessboard layouts and the planar pose solver.
//! - `ar_overlay::mesh`: STL/OBJ loading and normalization.
//! - `ar_overlay::pipeline`: pose filter, model registry and the per-frame pipeline.
//! - `ar_overlay::print`: printable chessboard charts.
//! - `ar_overlay::replay`: offline replay of recorded detections.

pub use ar_overlay_core as core;
pub use ar_overlay_marker as marker;
pub use ar_overlay_mesh as mesh;
pub use ar_overlay_pipeline as pipeline;
pub use ar_overlay_print as print;

pub use ar_overlay_core::{CameraCalibration, DetectedMarker, MarkerId, ModelTransform, Pose};
pub use ar_overlay_pipeline::{MarkerPosePipeline, ModelRegistry, PipelineParams, TrackingSession};

pub mod replay;
