use ar_overlay_core::{CameraCalibration, DetectedMarker, ModelTransform, Pose, ProjectionTransform};
use ar_overlay_marker::{PlanarPoseSolver, PlanarTarget, PoseSolver};
use ar_overlay_mesh::Mesh;
use ar_overlay_pipeline::{
    MarkerPosePipeline, MeshHandle, ModelRegistry, OverlayAdjust, PipelineParams, Renderer,
    TrackingSession,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;

struct NullRenderer;

impl Renderer for NullRenderer {
    fn upload_mesh(&mut self, _mesh: &Mesh) -> MeshHandle {
        MeshHandle(0)
    }
    fn set_projection(&mut self, _projection: &ProjectionTransform) {}
    fn draw_axes(&mut self, transform: &ModelTransform, _length: f64) {
        black_box(transform);
    }
    fn draw_mesh(&mut self, _mesh: MeshHandle, transform: &ModelTransform) {
        black_box(transform);
    }
    fn present(&mut self) {}
}

fn calib() -> CameraCalibration {
    CameraCalibration::pinhole(900.0, 900.0, 640.0, 360.0).expect("calibration")
}

/// Eight markers spread over the view, jittering by a few millimeters.
fn make_frames(count: usize) -> Vec<Vec<DetectedMarker>> {
    let target = PlanarTarget::SquareMarker { length: 0.05 };
    let object = target.object_points();
    let cam = calib();
    (0..count)
        .map(|f| {
            (0..8u32)
                .map(|id| {
                    let jitter = 0.003 * ((f as f64 * 0.7 + id as f64).sin());
                    let pose = Pose::new(
                        Vector3::new(0.2, -0.1 * id as f64, 0.05),
                        Vector3::new(-0.3 + 0.08 * id as f64 + jitter, 0.05, 0.8),
                    );
                    let corners = cam
                        .project_points(&pose, &object)
                        .into_iter()
                        .flatten()
                        .collect();
                    DetectedMarker::new(id, corners)
                })
                .collect()
        })
        .collect()
}

fn bench_solve(c: &mut Criterion) {
    let cam = calib();
    let solver = PlanarPoseSolver::default();
    let object = PlanarTarget::SquareMarker { length: 0.05 }.object_points();
    let frames = make_frames(1);
    let corners = &frames[0][0].corners;

    c.bench_function("planar_solve_square_marker", |b| {
        b.iter(|| black_box(solver.solve(black_box(&object), black_box(corners), &cam)))
    });
}

fn bench_frame_step(c: &mut Criterion) {
    let params = PipelineParams {
        target: PlanarTarget::SquareMarker { length: 0.05 },
        ..PipelineParams::default()
    };
    let pipeline =
        MarkerPosePipeline::new(calib(), PlanarPoseSolver::default(), ModelRegistry::new(), params)
            .expect("pipeline");
    let frames = make_frames(64);
    let adjust = OverlayAdjust::default();

    c.bench_function("process_frame_8_markers", |b| {
        let mut session = TrackingSession::new();
        let mut renderer = NullRenderer;
        let mut i = 0usize;
        b.iter(|| {
            let report = pipeline.process_frame(
                &mut session,
                black_box(&frames[i % frames.len()]),
                &adjust,
                &mut renderer,
            );
            i += 1;
            black_box(report.markers.len())
        })
    });
}

criterion_group!(frame_step, bench_solve, bench_frame_step);
criterion_main!(frame_step);
