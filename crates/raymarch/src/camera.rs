//! Camera matrices consumed by the ray marching kernels.
//!
//! The gate only needs two opaque matrices from a [`CameraProvider`]. The
//! orbit [`Camera`] is a convenience provider for the demo driver; it raises a
//! `moved` flag on every mutation which the driver reads and resets once per
//! frame with [`Camera::take_moved`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Source of the camera matrices read on frames that dispatch.
pub trait CameraProvider {
    /// View-to-world transform. Column-major, right-handed, camera looks down
    /// its local -Z.
    fn camera_to_world(&self) -> Mat4;

    /// Inverse of the projection matrix, mapping clip space back to view
    /// space.
    fn inverse_projection(&self) -> Mat4;
}

/// A provider holding matrices supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
}

impl FixedCamera {
    #[must_use]
    pub fn new(camera_to_world: Mat4, projection: Mat4) -> Self {
        Self {
            camera_to_world,
            inverse_projection: projection.inverse(),
        }
    }
}

impl Default for FixedCamera {
    fn default() -> Self {
        Self {
            camera_to_world: Mat4::IDENTITY,
            inverse_projection: Mat4::IDENTITY,
        }
    }
}

impl CameraProvider for FixedCamera {
    fn camera_to_world(&self) -> Mat4 {
        self.camera_to_world
    }

    fn inverse_projection(&self) -> Mat4 {
        self.inverse_projection
    }
}

/// Uniform block layout shared with `shaders/raymarch.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub camera_to_world: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
}

impl CameraUniform {
    #[must_use]
    pub fn from_provider(camera: &impl CameraProvider) -> Self {
        Self {
            camera_to_world: camera.camera_to_world().to_cols_array_2d(),
            inverse_projection: camera.inverse_projection().to_cols_array_2d(),
        }
    }
}

/// Orbit camera circling a target point.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Point the camera looks at
    pub target: Vec3,
    /// Distance from the target
    pub distance: f32,
    /// Horizontal rotation around the target
    pub yaw: f32,
    /// Vertical rotation, clamped to avoid flipping over the pole
    pub pitch: f32,
    /// Render target aspect ratio
    pub aspect: f32,
    /// Field of view in radians
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    moved: bool,
}

impl Camera {
    const PITCH_LIMIT: f32 = 1.5;

    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 8.0,
            yaw: 0.0,
            pitch: 0.3,
            aspect: aspect(width, height),
            fovy: 45.0f32.to_radians(),
            znear: 0.1,
            zfar: 100.0,
            moved: true,
        }
    }

    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        self.moved = true;
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance + delta).max(self.znear);
        self.moved = true;
    }

    /// Update aspect ratio when the output is resized
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect(width, height);
        self.moved = true;
    }

    /// Whether the camera moved since the last call. Resets the flag.
    pub fn take_moved(&mut self) -> bool {
        std::mem::take(&mut self.moved)
    }

    #[must_use]
    pub fn eye(&self) -> Vec3 {
        let orientation = Quat::from_axis_angle(Vec3::Y, self.yaw)
            * Quat::from_axis_angle(Vec3::X, -self.pitch);
        self.target + orientation * Vec3::Z * self.distance
    }

    #[must_use]
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

impl CameraProvider for Camera {
    fn camera_to_world(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y).inverse()
    }

    fn inverse_projection(&self) -> Mat4 {
        self.projection().inverse()
    }
}

#[allow(clippy::cast_precision_loss)]
fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}
