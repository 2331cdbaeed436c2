#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # SDF scene synchronization
//!
//! CPU side of an SDF ray marcher. An authored [`ShapeNode`] hierarchy is
//! flattened by the [`ShapeController`] into a pre-order sequence of
//! [`ShapeRecord`]s whose `child_count` lets the kernel skip whole subtrees.
//! The [`RayMarcher`] mirrors that sequence into a backend buffer and only
//! dispatches when the scene or the camera changed.
//!
//! ```
//! use compute::MockCpu;
//! use raymarch::{FixedCamera, FrameOutcome, RayMarchConfig, RayMarcher, ShapeController, ShapeNode, ShapeType, RAYMARCH_LAYOUT};
//!
//! let mut backend = MockCpu::with_layout(&RAYMARCH_LAYOUT);
//! let (target, source, destination) = (backend.create_image(), backend.create_image(), backend.create_image());
//! let mut marcher = RayMarcher::new(backend, target, RayMarchConfig::new(64, 64)).unwrap();
//!
//! let mut controller = ShapeController::new();
//! controller.attach([ShapeNode::new(ShapeType::Sphere).with_child(ShapeNode::new(ShapeType::Box))]);
//!
//! let camera = FixedCamera::default();
//! assert_eq!(
//!     marcher.render_frame(&mut controller, &camera, false, source, destination),
//!     FrameOutcome::Dispatched { recreated: true }
//! );
//! assert_eq!(
//!     marcher.render_frame(&mut controller, &camera, false, source, destination),
//!     FrameOutcome::Reused
//! );
//! ```

pub mod camera;
mod error;
pub mod fractal;
pub mod light;
pub mod node;
pub mod raymarcher;
pub mod scene;
pub mod shape;

pub use camera::{Camera, CameraProvider, CameraUniform, FixedCamera};
pub use error::RenderError;
pub use fractal::{FractalRenderer, FractalSettings, FRACTAL_LAYOUT};
pub use light::{LightData, LightSource};
pub use node::{ChangeSink, Geometry, HostTransform, ShapeNode};
pub use raymarcher::{
    FrameOutcome, GateStats, RayMarchConfig, RayMarcher, RAYMARCH_LAYOUT, RAYMARCH_WGSL,
};
pub use scene::{NodeId, ShapeController};
pub use shape::{Operation, ShapeRecord, ShapeType};
