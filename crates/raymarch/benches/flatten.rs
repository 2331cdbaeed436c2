use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;
use raymarch::{ShapeController, ShapeNode, ShapeType};

/// A balanced tree with `fanout^depth` leaves.
fn tree(depth: u32, fanout: usize) -> ShapeNode {
    let mut node = ShapeNode::new(ShapeType::Sphere);
    if depth > 0 {
        for _ in 0..fanout {
            node.add_child(tree(depth - 1, fanout));
        }
    }
    node
}

fn bench_flatten(c: &mut Criterion) {
    let mut controller = ShapeController::new();
    controller.attach((0..8).map(|_| tree(3, 4)));

    c.bench_function("flatten_680_nodes", |b| {
        b.iter(|| {
            controller.roots_mut()[0].set_position(Vec3::X);
            black_box(controller.synchronize().len())
        });
    });

    c.bench_function("synchronize_clean", |b| {
        b.iter(|| black_box(controller.synchronize().len()));
    });
}

criterion_group!(benches, bench_flatten);
criterion_main!(benches);
