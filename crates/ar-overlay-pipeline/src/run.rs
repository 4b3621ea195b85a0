//! Sequential frame loop.

use crate::pipeline::{FrameReport, MarkerPosePipeline};
use crate::{
    Frame, FrameSource, MarkerDetector, OverlayAdjust, PipelineError, Renderer, TrackingSession,
};
use ar_overlay_marker::PoseSolver;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Why [`run_session`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndOfStream,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames: u64,
    pub stop: StopReason,
}

/// Drive frames from `source` through the pipeline until the stream ends or
/// `on_frame` breaks.
///
/// Each iteration pulls a frame, refreshes the projection if the frame size
/// changed, detects, processes, presents, and then hands the report to
/// `on_frame`, which may also apply overlay adjustments for the next frame.
/// Empty (zero-sized) frames are skipped without touching the renderer and
/// are not counted.
pub fn run_session<Src, D, S, R, F>(
    source: &mut Src,
    detector: &mut D,
    pipeline: &MarkerPosePipeline<S>,
    session: &mut TrackingSession,
    adjust: &mut OverlayAdjust,
    renderer: &mut R,
    mut on_frame: F,
) -> Result<RunSummary, PipelineError>
where
    Src: FrameSource,
    D: MarkerDetector<Src::Frame>,
    S: PoseSolver,
    R: Renderer,
    F: FnMut(&FrameReport, &mut OverlayAdjust) -> ControlFlow<()>,
{
    let mut frames = 0u64;
    loop {
        let Some(frame) = source.next_frame() else {
            log::info!("frame source exhausted after {frames} frames");
            return Ok(RunSummary {
                frames,
                stop: StopReason::EndOfStream,
            });
        };
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            log::warn!("skipping empty {width}x{height} frame after {frames} frames");
            continue;
        }
        pipeline.prepare_viewport(session, width, height, renderer)?;

        let detections = detector.detect(&frame);
        let report = pipeline.process_frame(session, &detections, adjust, renderer);
        renderer.present();
        frames += 1;

        if on_frame(&report, adjust).is_break() {
            log::info!("quit requested after {frames} frames");
            return Ok(RunSummary {
                frames,
                stop: StopReason::Quit,
            });
        }
    }
}
