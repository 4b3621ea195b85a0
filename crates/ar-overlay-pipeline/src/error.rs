use ar_overlay_core::TransformError;

/// Errors raised while configuring or driving the pipeline.
///
/// Per-marker solve failures are not errors; they show up in the
/// [`FrameReport`](crate::FrameReport) instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("filter thresholds must be finite and non-negative")]
    InvalidThresholds,
    #[error("axis length must be positive, got {0}")]
    InvalidAxisLength(f64),
    #[error(transparent)]
    Projection(#[from] TransformError),
}
