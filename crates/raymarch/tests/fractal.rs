use compute::{Command, MockCpu, UniformValue};
use glam::Vec3;
use raymarch::{
    FixedCamera, FractalRenderer, LightData, RayMarchConfig, RenderError, FRACTAL_LAYOUT,
};

fn renderer() -> (FractalRenderer<MockCpu>, compute::ImageId) {
    let mut backend = MockCpu::with_layout(&FRACTAL_LAYOUT);
    let target = backend.create_image();
    let destination = backend.create_image();
    let renderer =
        FractalRenderer::new(backend, target, RayMarchConfig::new(96, 64)).expect("valid config");
    (renderer, destination)
}

fn light_writes(renderer: &FractalRenderer<MockCpu>) -> usize {
    renderer
        .backend()
        .count(|c| matches!(c, Command::SetUniform { name, .. } if name == "LightIntensity"))
}

#[test]
fn dispatches_every_frame() {
    let (mut renderer, destination) = renderer();
    let camera = FixedCamera::default();
    for _ in 0..4 {
        renderer
            .render_frame(&camera, LightData::default(), destination)
            .expect("frame");
    }
    assert_eq!(renderer.dispatches(), 4);
    assert_eq!(renderer.backend().dispatch_count(), 4);
    assert!(renderer
        .backend()
        .commands()
        .contains(&Command::Dispatch([3, 2, 1])));
}

#[test]
fn light_uniforms_follow_value_changes_only() {
    let (mut renderer, destination) = renderer();
    let camera = FixedCamera::default();
    let light = LightData::default();

    renderer.render_frame(&camera, light, destination).expect("frame");
    renderer.render_frame(&camera, light, destination).expect("frame");
    assert_eq!(light_writes(&renderer), 1);

    let warm = LightData {
        color: Vec3::new(1.0, 0.8, 0.6),
        ..light
    };
    renderer.render_frame(&camera, warm, destination).expect("frame");
    assert_eq!(light_writes(&renderer), 2);
    assert_eq!(renderer.light_updates(), 2);
    assert_eq!(
        renderer.backend().uniform("LightColor"),
        Some(UniformValue::Vec3([1.0, 0.8, 0.6]))
    );
}

#[test]
fn settings_reach_the_kernel_clamped() {
    let (mut renderer, destination) = renderer();
    renderer.settings_mut().set_power(1.0);
    renderer.settings_mut().set_darkness(500.0);
    renderer.settings_mut().set_color_mix(Vec3::new(0.1, 0.2, 0.3));
    renderer
        .render_frame(&FixedCamera::default(), LightData::default(), destination)
        .expect("frame");

    let backend = renderer.backend();
    assert_eq!(backend.uniform("Power"), Some(UniformValue::Float(2.0)));
    assert_eq!(backend.uniform("Darkness"), Some(UniformValue::Float(100.0)));
    assert_eq!(backend.uniform("BlackAndWhite"), Some(UniformValue::Float(0.5)));
    assert_eq!(
        backend.uniform("ColorMix"),
        Some(UniformValue::Vec3([0.1, 0.2, 0.3]))
    );
}

#[test]
fn backend_errors_propagate() {
    let (mut renderer, _) = renderer();
    let unknown = compute::ImageId(999);
    let result = renderer.render_frame(&FixedCamera::default(), LightData::default(), unknown);
    assert_eq!(
        result,
        Err(RenderError::Compute(compute::ComputeError::UnknownImage(unknown)))
    );
}

#[test]
fn light_is_resent_after_a_partial_write() {
    let (mut renderer, destination) = renderer();
    let camera = FixedCamera::default();
    let light = LightData::default();

    renderer.backend_mut().fail_next_uniform("LightColor");
    assert!(renderer.render_frame(&camera, light, destination).is_err());
    assert_eq!(renderer.light_updates(), 0);

    renderer.render_frame(&camera, light, destination).expect("frame");
    assert_eq!(renderer.light_updates(), 1);
    assert_eq!(light_writes(&renderer), 2);
    assert_eq!(
        renderer.backend().uniform("LightDirection"),
        Some(UniformValue::Vec3(light.direction.to_array()))
    );
}
