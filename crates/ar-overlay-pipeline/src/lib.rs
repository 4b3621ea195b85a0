//! Per-frame pose pipeline for planar-marker overlays.
//!
//! For each frame the pipeline takes marker detections, solves a pose per
//! marker, suppresses jitter with an anisotropic translation filter, keeps
//! the last accepted model-view transform for every marker, and tells a
//! [`Renderer`] what to draw: the bound mesh, or coordinate axes when the
//! marker has no binding.
//!
//! Capture, detection and rasterization are external and reached through the
//! traits in this crate ([`FrameSource`], [`MarkerDetector`], [`Renderer`]).
//! Processing is strictly sequential; mutable state lives in a
//! [`TrackingSession`] owned by the caller.

mod adjust;
mod collaborators;
mod error;
mod filter;
mod pipeline;
mod registry;
mod run;
mod session;

pub use adjust::{OverlayAdjust, MIN_SCALE_FACTOR, OFFSET_STEP, SCALE_STEP};
pub use collaborators::{Frame, FrameSource, MarkerDetector, MeshHandle, Renderer};
pub use error::PipelineError;
pub use filter::{FilterState, FilterThresholds};
pub use pipeline::{
    DrawKind, FrameReport, MarkerOutcome, MarkerPosePipeline, MarkerReport, PipelineParams,
};
pub use registry::{ModelBinding, ModelBindingConfig, ModelRegistry, RegistryError};
pub use run::{run_session, RunSummary, StopReason};
pub use session::{MarkerState, ProjectionCache, SessionStats, TrackingSession};
