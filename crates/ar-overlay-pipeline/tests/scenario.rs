use ar_overlay_core::{
    extrinsic_to_model_view, CameraCalibration, DetectedMarker, MarkerId, ModelTransform, Pose,
    ProjectionTransform,
};
use ar_overlay_marker::{PlanarPoseSolver, PlanarTarget, PoseError, PoseSolver};
use ar_overlay_mesh::Mesh;
use ar_overlay_pipeline::{
    run_session, DrawKind, FilterState, Frame, FrameSource, MarkerDetector, MarkerOutcome,
    MarkerPosePipeline, MarkerState, MeshHandle, ModelBinding, ModelRegistry, OverlayAdjust,
    PipelineParams, Renderer, StopReason, TrackingSession,
};
use approx::assert_relative_eq;
use nalgebra::{Point2, Point3, Vector3};
use std::cell::Cell;
use std::collections::VecDeque;
use std::ops::ControlFlow;

const MARKER_LENGTH: f64 = 0.06;

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Projection(ProjectionTransform),
    Axes(ModelTransform, f64),
    Mesh(MeshHandle, ModelTransform),
    Present,
}

#[derive(Default)]
struct RecordingRenderer {
    calls: Vec<Call>,
    next_handle: u32,
}

impl RecordingRenderer {
    fn draws(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Axes(..) | Call::Mesh(..)))
            .collect()
    }

    fn projections(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Projection(_)))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn upload_mesh(&mut self, _mesh: &Mesh) -> MeshHandle {
        self.next_handle += 1;
        MeshHandle(self.next_handle)
    }
    fn set_projection(&mut self, projection: &ProjectionTransform) {
        self.calls.push(Call::Projection(*projection));
    }
    fn draw_axes(&mut self, transform: &ModelTransform, length: f64) {
        self.calls.push(Call::Axes(*transform, length));
    }
    fn draw_mesh(&mut self, mesh: MeshHandle, transform: &ModelTransform) {
        self.calls.push(Call::Mesh(mesh, *transform));
    }
    fn present(&mut self) {
        self.calls.push(Call::Present);
    }
}

fn calib() -> CameraCalibration {
    CameraCalibration::pinhole(800.0, 800.0, 320.0, 240.0).expect("calibration")
}

fn params() -> PipelineParams {
    PipelineParams {
        target: PlanarTarget::SquareMarker {
            length: MARKER_LENGTH,
        },
        ..PipelineParams::default()
    }
}

fn pipeline(registry: ModelRegistry) -> MarkerPosePipeline<PlanarPoseSolver> {
    let _ = env_logger::builder().is_test(true).try_init();
    MarkerPosePipeline::new(calib(), PlanarPoseSolver::default(), registry, params())
        .expect("pipeline")
}

fn base_pose() -> Pose {
    Pose::new(Vector3::new(0.1, -0.2, 0.05), Vector3::new(0.01, 0.02, 0.5))
}

/// Synthetic detection: the marker's corners seen through `pose`.
fn detection(id: MarkerId, pose: &Pose) -> DetectedMarker {
    let object = params().target.object_points();
    let corners = calib()
        .project_points(pose, &object)
        .into_iter()
        .map(|p| p.expect("marker in front of camera"))
        .collect();
    DetectedMarker::new(id, corners)
}

fn shifted(dx: f64) -> Pose {
    let p = base_pose();
    Pose::new(p.rvec, p.tvec + Vector3::new(dx, 0.0, 0.0))
}

#[test]
fn static_marker_is_computed_once() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let adjust = OverlayAdjust::default();
    let dets = [detection(0, &base_pose())];

    let n = 12;
    for i in 0..n {
        let report = pipe.process_frame(&mut session, &dets, &adjust, &mut renderer);
        let expected = if i == 0 {
            MarkerOutcome::Recomputed
        } else {
            MarkerOutcome::Reused
        };
        assert_eq!(report.marker(0).map(|m| &m.outcome), Some(&expected));
    }

    let stats = session.stats();
    assert_eq!(stats.frames, n);
    assert_eq!(stats.transform_computations, 1);
    assert_eq!(stats.transform_reuses, n - 1);

    // Every frame drew the same retained transform.
    let draws = renderer.draws();
    assert_eq!(draws.len() as u64, n);
    assert!(draws.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn unbound_marker_draws_axes_only() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();

    let report = pipe.process_frame(
        &mut session,
        &[detection(7, &base_pose())],
        &OverlayAdjust::default(),
        &mut renderer,
    );
    assert_eq!(report.markers[0].draw, Some(DrawKind::Axes));

    let expected = extrinsic_to_model_view(&base_pose());
    match renderer.draws().as_slice() {
        [Call::Axes(m, len)] => {
            assert_relative_eq!(m.m, expected.m, epsilon = 1e-6);
            assert_relative_eq!(*len, 0.1);
        }
        other => panic!("unexpected draws: {other:?}"),
    }
}

#[test]
fn bound_marker_draws_scaled_and_offset_mesh() {
    let mut registry = ModelRegistry::new();
    registry
        .insert(
            3,
            ModelBinding {
                mesh: MeshHandle(42),
                scale: 0.02,
            },
        )
        .expect("bind");
    let pipe = pipeline(registry);
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let mut adjust = OverlayAdjust::default();
    adjust.apply_key('d');
    adjust.apply_key('=');

    let report = pipe.process_frame(
        &mut session,
        &[detection(3, &base_pose())],
        &adjust,
        &mut renderer,
    );
    assert_eq!(
        report.markers[0].draw,
        Some(DrawKind::Mesh {
            handle: MeshHandle(42)
        })
    );

    let expected = extrinsic_to_model_view(&base_pose())
        .compose_binding(0.02 * adjust.scale_factor, &Vector3::new(0.0, 0.1, 0.0));
    match renderer.draws().as_slice() {
        [Call::Mesh(handle, m)] => {
            assert_eq!(*handle, MeshHandle(42));
            assert_relative_eq!(m.m, expected.m, epsilon = 1e-6);
        }
        other => panic!("unexpected draws: {other:?}"),
    }
}

#[test]
fn retained_transform_survives_dropout() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let adjust = OverlayAdjust::default();
    let dets = [detection(5, &base_pose())];

    pipe.process_frame(&mut session, &dets, &adjust, &mut renderer);
    let first = *session.retained_transform(5).expect("tracked");

    for _ in 1..9 {
        let report = pipe.process_frame(&mut session, &[], &adjust, &mut renderer);
        assert!(report.markers.is_empty());
        assert_eq!(session.state(5), MarkerState::Tracked(first));
    }

    let report = pipe.process_frame(&mut session, &dets, &adjust, &mut renderer);
    assert_eq!(report.frame_index, 9);
    assert_eq!(report.markers[0].outcome, MarkerOutcome::Reused);
    match renderer.draws().last() {
        Some(Call::Axes(m, _)) => assert_eq!(*m, first),
        other => panic!("unexpected draw: {other:?}"),
    }
}

/// Replays `[P1, P1, P2]` for one marker and returns the three drawn transforms.
fn drawn_over_three_frames(dx: f64) -> Vec<ModelTransform> {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let adjust = OverlayAdjust::default();
    for pose in [base_pose(), base_pose(), shifted(dx)] {
        pipe.process_frame(&mut session, &[detection(0, &pose)], &adjust, &mut renderer);
    }
    renderer
        .draws()
        .into_iter()
        .map(|c| match c {
            Call::Axes(m, _) => *m,
            other => panic!("unexpected draw: {other:?}"),
        })
        .collect()
}

#[test]
fn sub_threshold_x_step_keeps_first_transform() {
    let drawn = drawn_over_three_frames(0.0005);
    assert_eq!(drawn.len(), 3);
    assert!(drawn.iter().all(|m| *m == drawn[0]));
    assert_relative_eq!(
        drawn[2].marker_translation(),
        base_pose().tvec,
        epsilon = 1e-6
    );
}

#[test]
fn supra_threshold_x_step_moves_the_overlay() {
    let drawn = drawn_over_three_frames(0.0015);
    assert_eq!(drawn[0], drawn[1]);
    assert_ne!(drawn[1], drawn[2]);
    assert_relative_eq!(
        drawn[2].marker_translation(),
        shifted(0.0015).tvec,
        epsilon = 1e-6
    );
}

#[test]
fn solve_failure_skips_marker_for_one_frame() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let adjust = OverlayAdjust::default();

    let mut broken = detection(1, &base_pose());
    broken.corners.truncate(3);
    let good = detection(2, &base_pose());

    let report = pipe.process_frame(&mut session, &[broken, good], &adjust, &mut renderer);
    assert!(matches!(
        report.marker(1).map(|m| &m.outcome),
        Some(MarkerOutcome::SolveFailed { .. })
    ));
    assert_eq!(report.marker(1).and_then(|m| m.draw), None);
    assert_eq!(report.marker(2).map(|m| &m.outcome), Some(&MarkerOutcome::Recomputed));
    assert_eq!(session.state(1), MarkerState::Unseen);
    assert_eq!(session.stats().solve_failures, 1);
    assert_eq!(renderer.draws().len(), 1);
}

#[test]
fn markers_are_filtered_independently() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let adjust = OverlayAdjust::default();

    let frame_a = [detection(0, &base_pose()), detection(1, &base_pose())];
    let frame_b = [detection(0, &base_pose()), detection(1, &shifted(0.01))];
    pipe.process_frame(&mut session, &frame_a, &adjust, &mut renderer);
    let report = pipe.process_frame(&mut session, &frame_b, &adjust, &mut renderer);

    assert_eq!(report.marker(0).map(|m| &m.outcome), Some(&MarkerOutcome::Reused));
    assert_eq!(report.marker(1).map(|m| &m.outcome), Some(&MarkerOutcome::Recomputed));
}

struct SizedFrame {
    size: (u32, u32),
    markers: Vec<DetectedMarker>,
}

impl Frame for SizedFrame {
    fn dimensions(&self) -> (u32, u32) {
        self.size
    }
}

struct QueueSource(VecDeque<SizedFrame>);

impl FrameSource for QueueSource {
    type Frame = SizedFrame;

    fn next_frame(&mut self) -> Option<SizedFrame> {
        self.0.pop_front()
    }
}

struct PassThroughDetector;

impl MarkerDetector<SizedFrame> for PassThroughDetector {
    fn detect(&mut self, frame: &SizedFrame) -> Vec<DetectedMarker> {
        frame.markers.clone()
    }
}

fn queue(sizes: &[(u32, u32)]) -> QueueSource {
    QueueSource(
        sizes
            .iter()
            .map(|&size| SizedFrame {
                size,
                markers: vec![detection(0, &base_pose())],
            })
            .collect(),
    )
}

#[test]
fn run_session_stops_at_end_of_stream_and_tracks_viewport() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let mut adjust = OverlayAdjust::default();
    let mut source = queue(&[(640, 480), (640, 480), (1280, 720), (1280, 720)]);

    let summary = run_session(
        &mut source,
        &mut PassThroughDetector,
        &pipe,
        &mut session,
        &mut adjust,
        &mut renderer,
        |_, _| ControlFlow::Continue(()),
    )
    .expect("run");

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.stop, StopReason::EndOfStream);
    assert_eq!(renderer.projections(), 2);
    assert_eq!(
        renderer
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Present))
            .count(),
        4
    );
    assert_eq!(session.stats().transform_computations, 1);
}

#[test]
fn run_session_honours_quit_and_adjustments() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let mut adjust = OverlayAdjust::default();
    let mut source = queue(&[(640, 480); 10]);

    let summary = run_session(
        &mut source,
        &mut PassThroughDetector,
        &pipe,
        &mut session,
        &mut adjust,
        &mut renderer,
        |report, adjust| {
            adjust.apply_key('w');
            if report.frame_index == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        },
    )
    .expect("run");

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.stop, StopReason::Quit);
    assert_relative_eq!(adjust.offset.x, -0.3, epsilon = 1e-12);
    assert_eq!(source.0.len(), 7);
}

#[test]
fn zero_sized_frame_is_skipped_and_the_stream_continues() {
    let pipe = pipeline(ModelRegistry::new());
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let mut adjust = OverlayAdjust::default();
    let mut source = queue(&[(640, 480), (0, 0), (640, 480), (640, 480)]);

    let summary = run_session(
        &mut source,
        &mut PassThroughDetector,
        &pipe,
        &mut session,
        &mut adjust,
        &mut renderer,
        |_, _| ControlFlow::Continue(()),
    )
    .expect("run");

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.stop, StopReason::EndOfStream);
    assert!(source.0.is_empty());
    // The cached projection from the first frame is kept across the gap.
    assert_eq!(renderer.projections(), 1);
    assert_eq!(renderer.draws().len(), 3);
    assert_eq!(session.stats().frames, 3);
}

/// Returns NaN on its first call, then defers to the planar solver.
#[derive(Default)]
struct NanOnceSolver {
    calls: Cell<u32>,
    inner: PlanarPoseSolver,
}

impl PoseSolver for NanOnceSolver {
    fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        calib: &CameraCalibration,
    ) -> Result<Pose, PoseError> {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n == 0 {
            return Ok(Pose::new(
                Vector3::new(f64::NAN, 0.0, 0.0),
                Vector3::new(f64::NAN, 0.0, 0.5),
            ));
        }
        self.inner.solve(object, image, calib)
    }
}

#[test]
fn non_finite_pose_is_treated_as_solve_failure() {
    let _ = env_logger::builder().is_test(true).try_init();
    let pipe = MarkerPosePipeline::new(
        calib(),
        NanOnceSolver::default(),
        ModelRegistry::new(),
        params(),
    )
    .expect("pipeline");
    let mut session = TrackingSession::new();
    let mut renderer = RecordingRenderer::default();
    let adjust = OverlayAdjust::default();
    let dets = [detection(0, &base_pose())];

    let first = pipe.process_frame(&mut session, &dets, &adjust, &mut renderer);
    assert_eq!(
        first.marker(0).map(|m| &m.outcome),
        Some(&MarkerOutcome::SolveFailed {
            reason: PoseError::NonFinite.to_string()
        })
    );
    assert_eq!(session.state(0), MarkerState::Unseen);
    assert_eq!(session.filter_state(0), FilterState::Unset);
    assert!(renderer.draws().is_empty());

    let second = pipe.process_frame(&mut session, &dets, &adjust, &mut renderer);
    assert_eq!(second.marker(0).map(|m| &m.outcome), Some(&MarkerOutcome::Recomputed));
    let retained = session.retained_transform(0).expect("retained");
    assert!(retained.m.iter().all(|v| v.is_finite()));
    assert_eq!(session.stats().solve_failures, 1);
}
