//! Offline replay of recorded marker detections.
//!
//! A replay feeds a JSON list of per-frame detections through the same
//! pipeline a live overlay would use, with a renderer that records every call
//! instead of drawing. The result is a [`ReplayReport`] that can be diffed
//! between runs.

use crate::core::{
    CalibrationError, CameraCalibration, DetectedMarker, ModelTransform, ProjectionTransform,
};
use crate::marker::{PlanarPoseSolver, SolverParams};
use crate::mesh::Mesh;
use crate::pipeline::{
    run_session, Frame, FrameReport, FrameSource, MarkerDetector, MarkerPosePipeline, MeshHandle,
    ModelBindingConfig, ModelRegistry, OverlayAdjust, PipelineError, PipelineParams,
    RegistryError, Renderer, SessionStats, StopReason, TrackingSession,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_viewport() -> [u32; 2] {
    [640, 480]
}

/// Replay job description, loaded from JSON.
///
/// Relative paths are resolved against the directory holding the config
/// file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub calibration_path: PathBuf,
    /// JSON list of frames, each a list of detected markers.
    pub detections_path: PathBuf,
    #[serde(default)]
    pub bindings: Vec<ModelBindingConfig>,
    #[serde(default)]
    pub pipeline: PipelineParams,
    #[serde(default)]
    pub solver: SolverParams,
    #[serde(default)]
    pub adjust: OverlayAdjust,
    /// Frame size `[width, height]` in pixels.
    #[serde(default = "default_viewport")]
    pub viewport: [u32; 2],
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl ReplayConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let mut cfg: Self = read_json(path)?;
        if let Some(base) = path.parent() {
            cfg.resolve_relative_to(base);
        }
        Ok(cfg)
    }

    /// Rebase every relative path onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.calibration_path);
        rebase(&mut self.detections_path);
        for binding in &mut self.bindings {
            rebase(&mut binding.mesh_path);
        }
        if let Some(out) = self.output_path.as_mut() {
            rebase(out);
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReplayError> {
    let file = File::open(path).map_err(|source| ReplayError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ReplayError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// One renderer call, as recorded during a replay.
///
/// Matrices are the column-major arrays a GL renderer would load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum DrawRecord {
    Projection { matrix: [f32; 16] },
    Axes { matrix: [f32; 16], length: f64 },
    Mesh { handle: MeshHandle, matrix: [f32; 16] },
    Present,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadedMesh {
    pub handle: MeshHandle,
    pub triangles: usize,
}

/// Renderer that keeps a log of every call.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    pub meshes: Vec<UploadedMesh>,
    pub calls: Vec<DrawRecord>,
}

impl Renderer for RecordingRenderer {
    fn upload_mesh(&mut self, mesh: &Mesh) -> MeshHandle {
        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(UploadedMesh {
            handle,
            triangles: mesh.triangles.len(),
        });
        handle
    }

    fn set_projection(&mut self, projection: &ProjectionTransform) {
        self.calls.push(DrawRecord::Projection {
            matrix: projection.to_gl(),
        });
    }

    fn draw_axes(&mut self, transform: &ModelTransform, length: f64) {
        self.calls.push(DrawRecord::Axes {
            matrix: transform.to_gl(),
            length,
        });
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, transform: &ModelTransform) {
        self.calls.push(DrawRecord::Mesh {
            handle: mesh,
            matrix: transform.to_gl(),
        });
    }

    fn present(&mut self) {
        self.calls.push(DrawRecord::Present);
    }
}

struct RecordedFrame {
    size: (u32, u32),
    markers: Vec<DetectedMarker>,
}

impl Frame for RecordedFrame {
    fn dimensions(&self) -> (u32, u32) {
        self.size
    }
}

struct RecordedSource(VecDeque<RecordedFrame>);

impl FrameSource for RecordedSource {
    type Frame = RecordedFrame;

    fn next_frame(&mut self) -> Option<RecordedFrame> {
        self.0.pop_front()
    }
}

/// Detections were captured ahead of time; hand them back unchanged.
struct RecordedDetector;

impl MarkerDetector<RecordedFrame> for RecordedDetector {
    fn detect(&mut self, frame: &RecordedFrame) -> Vec<DetectedMarker> {
        frame.markers.clone()
    }
}

/// Outcome of a replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub frames: u64,
    pub stop: StopReason,
    pub stats: SessionStats,
    pub meshes: Vec<UploadedMesh>,
    pub reports: Vec<FrameReport>,
    pub draws: Vec<DrawRecord>,
}

impl ReplayReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Load everything `config` names and run the recorded frames through the
/// pipeline.
pub fn run_replay(config: &ReplayConfig) -> Result<ReplayReport, ReplayError> {
    let calibration = CameraCalibration::load_json(&config.calibration_path)?;
    let frames: Vec<Vec<DetectedMarker>> = read_json(&config.detections_path)?;
    log::info!(
        "replaying {} frames from '{}'",
        frames.len(),
        config.detections_path.display()
    );

    let mut renderer = RecordingRenderer::default();
    let registry = ModelRegistry::load(&config.bindings, &mut renderer)?;
    let pipeline = MarkerPosePipeline::new(
        calibration,
        PlanarPoseSolver::new(config.solver.clone()),
        registry,
        config.pipeline.clone(),
    )?;

    let [width, height] = config.viewport;
    let mut source = RecordedSource(
        frames
            .into_iter()
            .map(|markers| RecordedFrame {
                size: (width, height),
                markers,
            })
            .collect(),
    );
    let mut session = TrackingSession::new();
    let mut adjust = config.adjust;
    let mut reports = Vec::new();

    let summary = run_session(
        &mut source,
        &mut RecordedDetector,
        &pipeline,
        &mut session,
        &mut adjust,
        &mut renderer,
        |report, _| {
            reports.push(report.clone());
            ControlFlow::Continue(())
        },
    )?;

    let stats = *session.stats();
    log::info!(
        "replay done: {} frames, {} transforms computed, {} reused, {} solve failures",
        summary.frames,
        stats.transform_computations,
        stats.transform_reuses,
        stats.solve_failures
    );

    Ok(ReplayReport {
        frames: summary.frames,
        stop: summary.stop,
        stats,
        meshes: renderer.meshes,
        reports,
        draws: renderer.calls,
    })
}
