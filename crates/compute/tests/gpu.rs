#![cfg(feature = "gpu")]

use compute::layout::{Slot, UniformField};
use compute::{ComputeBackend, ComputeError, KernelLayout, UniformValue, WgpuBackend};

const FILL_WGSL: &str = r"
struct Params {
    tint: vec4<f32>,
}

@group(0) @binding(0) var<storage, read> weights: array<f32>;
@group(0) @binding(1) var<uniform> params: Params;
@group(0) @binding(2) var output: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(output);
    if id.x >= dims.x || id.y >= dims.y {
        return;
    }
    textureStore(output, vec2<i32>(id.xy), params.tint * weights[0]);
}
";

static FILL_LAYOUT: KernelLayout = KernelLayout {
    label: "fill",
    entry_point: "main",
    buffers: &[Slot { name: "Weights", binding: 0 }],
    images: &[Slot { name: "Result", binding: 2 }],
    uniform_binding: 1,
    uniform_size: 16,
    uniforms: &[UniformField { name: "Tint", offset: 0, size: 16 }],
};

fn backend() -> Option<WgpuBackend> {
    match WgpuBackend::new(FILL_WGSL, &FILL_LAYOUT) {
        Ok(backend) => Some(backend),
        Err(ComputeError::BackendUnavailable) => {
            eprintln!("no GPU adapter available; skipping");
            None
        }
        Err(e) => panic!("failed to create backend: {e}"),
    }
}

#[test]
fn dispatch_and_blit_on_device() {
    let Some(mut gpu) = backend() else {
        return;
    };
    let target = gpu.create_image(16, 16);
    let destination = gpu.create_image(16, 16);
    let weights = gpu.create_buffer("weights", 1, 4).unwrap();
    gpu.write_buffer(weights, bytemuck::bytes_of(&1.0f32)).unwrap();
    gpu.bind_buffer("Weights", weights).unwrap();
    gpu.bind_image("Result", target).unwrap();
    gpu.set_uniform("Tint", UniformValue::Vec4([1.0, 0.5, 0.25, 1.0]))
        .unwrap();

    gpu.dispatch([2, 2, 1]).unwrap();
    gpu.blit(target, destination).unwrap();
    gpu.destroy_buffer(weights);
    assert_eq!(gpu.dispatch([2, 2, 1]), Err(ComputeError::Unbound("Weights")));
}

#[test]
fn device_backend_validates_like_the_mock() {
    let Some(mut gpu) = backend() else {
        return;
    };
    assert!(matches!(
        gpu.create_buffer("empty", 0, 4),
        Err(ComputeError::EmptyBuffer(_))
    ));
    let buffer = gpu.create_buffer("weights", 4, 4).unwrap();
    assert!(matches!(
        gpu.write_buffer(buffer, &[0u8; 8]),
        Err(ComputeError::ShapeMismatch(_))
    ));
    assert!(matches!(
        gpu.bind_buffer("Missing", buffer),
        Err(ComputeError::UnknownBinding(_))
    ));
    assert!(matches!(
        gpu.set_uniform("Tint", UniformValue::Float(1.0)),
        Err(ComputeError::ShapeMismatch(_))
    ));

    let small = gpu.create_image(8, 8);
    let large = gpu.create_image(16, 16);
    assert!(matches!(
        gpu.blit(small, large),
        Err(ComputeError::ShapeMismatch(_))
    ));
}
