#![cfg(feature = "gpu")]

use compute::{ComputeError, WgpuBackend};
use glam::Vec3;
use raymarch::{
    Camera, FrameOutcome, Operation, RayMarchConfig, RayMarcher, ShapeController, ShapeNode,
    ShapeType, RAYMARCH_LAYOUT, RAYMARCH_WGSL,
};

fn backend() -> Option<WgpuBackend> {
    match WgpuBackend::new(RAYMARCH_WGSL, &RAYMARCH_LAYOUT) {
        Ok(backend) => Some(backend),
        Err(ComputeError::BackendUnavailable) => {
            eprintln!("no GPU adapter available; skipping");
            None
        }
        Err(e) => panic!("failed to create backend: {e}"),
    }
}

#[test]
fn gated_frames_run_on_device() {
    let Some(mut backend) = backend() else {
        return;
    };
    let (width, height) = (128, 96);
    let target = backend.create_image(width, height);
    let source = backend.create_image(width, height);
    let destination = backend.create_image(width, height);
    let mut marcher =
        RayMarcher::new(backend, target, RayMarchConfig::new(width, height)).expect("marcher");

    let mut controller = ShapeController::new();
    controller.attach([
        ShapeNode::new(ShapeType::Box)
            .with_size(Vec3::splat(1.0))
            .with_child(
                ShapeNode::new(ShapeType::Sphere)
                    .with_radius(1.2)
                    .with_operation(Operation::Cut, 0.0),
            ),
        ShapeNode::new(ShapeType::Plane).with_position(Vec3::new(0.0, -1.0, 0.0)),
    ]);
    let mut camera = Camera::new(width, height);

    let moved = camera.take_moved();
    let outcome = marcher.render_frame(&mut controller, &camera, moved, source, destination);
    assert_eq!(outcome, FrameOutcome::Dispatched { recreated: true });

    let moved = camera.take_moved();
    let outcome = marcher.render_frame(&mut controller, &camera, moved, source, destination);
    assert_eq!(outcome, FrameOutcome::Reused);

    controller.add_root(ShapeNode::new(ShapeType::Torus));
    let outcome = marcher.render_frame(&mut controller, &camera, false, source, destination);
    assert_eq!(outcome, FrameOutcome::Dispatched { recreated: true });

    marcher.teardown();
}
