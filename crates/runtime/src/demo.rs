//! Scripted scene and authoring timeline for the headless driver.

use glam::Vec3;
use raymarch::{Camera, HostTransform, NodeId, Operation, ShapeController, ShapeNode, ShapeType};
use tracing::info;

/// A plate with a spherical bite taken out, a blended pair and a floor.
pub fn scene() -> Vec<ShapeNode> {
    vec![
        ShapeNode::new(ShapeType::Box)
            .with_position(Vec3::new(-2.0, 0.0, 0.0))
            .with_size(Vec3::new(1.0, 0.25, 1.0))
            .with_color(Vec3::new(0.9, 0.4, 0.2))
            .with_child(
                ShapeNode::new(ShapeType::Sphere)
                    .with_position(Vec3::new(-2.0, 0.25, 0.0))
                    .with_radius(0.6)
                    .with_operation(Operation::Cut, 0.0),
            ),
        ShapeNode::new(ShapeType::Sphere)
            .with_position(Vec3::new(2.0, 0.5, 0.0))
            .with_color(Vec3::new(0.2, 0.6, 0.9))
            .with_child(
                ShapeNode::new(ShapeType::Torus)
                    .with_position(Vec3::new(2.0, 0.0, 0.0))
                    .with_radius(1.2)
                    .with_size(Vec3::splat(0.3))
                    .with_operation(Operation::Blend, 0.5),
            ),
        ShapeNode::new(ShapeType::Plane)
            .with_position(Vec3::new(0.0, -1.0, 0.0))
            .with_color(Vec3::splat(0.8)),
    ]
}

/// Applies the scripted events for `frame`. Most frames do nothing.
pub fn drive(
    frame: u32,
    camera: &mut Camera,
    controller: &mut ShapeController,
    host: &mut HostTransform,
) {
    match frame {
        10 => {
            info!(frame, "orbiting camera");
            camera.orbit(0.25, 0.0);
        }
        15 => {
            info!(frame, "authoring burst on the sphere");
            if let Some(sphere) = controller.node_mut(NodeId(2)) {
                sphere.set_radius(1.1);
                sphere.set_color(Vec3::new(0.3, 0.9, 0.4));
                sphere.set_blend_strength(0.2);
            }
        }
        20 => {
            info!(frame, "host moved the floor");
            host.move_to(Vec3::new(0.0, -1.5, 0.0));
        }
        25 => {
            info!(frame, "adding an octahedron");
            controller.add_root(
                ShapeNode::new(ShapeType::Octahedron)
                    .with_position(Vec3::new(0.0, 1.5, -2.0))
                    .with_radius(0.8),
            );
        }
        35 => {
            info!(frame, "removing the octahedron");
            let last = controller.roots().len().saturating_sub(1);
            controller.remove_root(last);
        }
        _ => {}
    }

    // The floor follows its host transform every frame.
    if let Some(floor) = controller.roots_mut().get_mut(2) {
        floor.apply_host_transform(host);
    }
}
