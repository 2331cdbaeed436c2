use std::mem::{offset_of, size_of};

use compute::layout::TILE_SIZE;
use naga::{AddressSpace, ShaderStage, TypeInner};
use raymarch::{CameraUniform, ShapeRecord, RAYMARCH_LAYOUT, RAYMARCH_WGSL};

fn parse_and_validate(source: &str) -> naga::Module {
    let module = match naga::front::wgsl::parse_str(source) {
        Ok(m) => m,
        Err(e) => panic!("WGSL parsing error:\n{}", e.emit_to_string(source)),
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    if let Err(e) = validator.validate(&module) {
        panic!("WGSL validation error:\n{}", e.emit_to_string(source));
    }
    module
}

/// Returns `(member name, offset)` pairs and the span of the named struct.
fn struct_layout(module: &naga::Module, name: &str) -> (Vec<(String, u32)>, u32) {
    module
        .types
        .iter()
        .find_map(|(_, ty)| match &ty.inner {
            TypeInner::Struct { members, span } if ty.name.as_deref() == Some(name) => Some((
                members
                    .iter()
                    .map(|m| (m.name.clone().unwrap_or_default(), m.offset))
                    .collect(),
                *span,
            )),
            _ => None,
        })
        .unwrap_or_else(|| panic!("struct {name} not found"))
}

fn binding_of(module: &naga::Module, name: &str) -> (AddressSpace, u32) {
    module
        .global_variables
        .iter()
        .find_map(|(_, var)| {
            if var.name.as_deref() != Some(name) {
                return None;
            }
            let binding = var.binding.as_ref()?;
            assert_eq!(binding.group, 0, "{name} must live in group 0");
            Some((var.space, binding.binding))
        })
        .unwrap_or_else(|| panic!("global {name} not found"))
}

fn as_u32(offset: usize) -> u32 {
    u32::try_from(offset).expect("offset fits in u32")
}

#[test]
fn raymarch_shader_compiles() {
    parse_and_validate(RAYMARCH_WGSL);
}

#[test]
fn shape_struct_matches_record() {
    let module = parse_and_validate(RAYMARCH_WGSL);
    let (members, span) = struct_layout(&module, "Shape");

    assert_eq!(span, as_u32(size_of::<ShapeRecord>()));
    let expected = [
        ("position", offset_of!(ShapeRecord, position)),
        ("color", offset_of!(ShapeRecord, color)),
        ("size", offset_of!(ShapeRecord, size)),
        ("radius", offset_of!(ShapeRecord, radius)),
        ("operation", offset_of!(ShapeRecord, operation)),
        ("shape_type", offset_of!(ShapeRecord, shape_type)),
        ("blend_strength", offset_of!(ShapeRecord, blend_strength)),
        ("child_count", offset_of!(ShapeRecord, child_count)),
    ]
    .map(|(name, offset)| (name.to_owned(), as_u32(offset)));
    assert_eq!(members, expected.to_vec());
}

#[test]
fn camera_block_matches_uniform_layout() {
    let module = parse_and_validate(RAYMARCH_WGSL);
    let (members, span) = struct_layout(&module, "Camera");

    assert_eq!(span, as_u32(size_of::<CameraUniform>()));
    assert_eq!(as_u32(RAYMARCH_LAYOUT.uniform_size), span);
    for (name, offset) in members {
        let field_name = match name.as_str() {
            "camera_to_world" => "CameraToWorld",
            "inverse_projection" => "CameraInverseProjection",
            other => panic!("unexpected camera member {other}"),
        };
        let field = RAYMARCH_LAYOUT
            .uniform(field_name)
            .unwrap_or_else(|| panic!("layout lacks {field_name}"));
        assert_eq!(as_u32(field.offset), offset, "{field_name}");
    }
}

#[test]
fn bindings_match_kernel_layout() {
    let module = parse_and_validate(RAYMARCH_WGSL);

    let (space, binding) = binding_of(&module, "shapes");
    assert!(matches!(space, AddressSpace::Storage { .. }));
    assert_eq!(Some(binding), RAYMARCH_LAYOUT.buffer_slot("Shapes").map(|s| s.binding));

    let (space, binding) = binding_of(&module, "camera");
    assert_eq!(space, AddressSpace::Uniform);
    assert_eq!(binding, RAYMARCH_LAYOUT.uniform_binding);

    let (space, binding) = binding_of(&module, "result_image");
    assert_eq!(space, AddressSpace::Handle);
    assert_eq!(Some(binding), RAYMARCH_LAYOUT.image_slot("Result").map(|s| s.binding));
}

#[test]
fn workgroup_covers_one_tile() {
    let module = parse_and_validate(RAYMARCH_WGSL);
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == RAYMARCH_LAYOUT.entry_point)
        .expect("entry point present");
    assert_eq!(entry.stage, ShaderStage::Compute);

    // Each invocation shades a 4x4 pixel block.
    let [x, y, z] = entry.workgroup_size;
    assert_eq!((x * 4, y * 4, z), (TILE_SIZE, TILE_SIZE, 1));
}
