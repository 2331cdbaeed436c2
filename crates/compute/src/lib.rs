#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Compute dispatch boundary
//!
//! This crate is the seam between CPU-side scene code and whatever executes
//! compute kernels. A [`ComputeBackend`] owns GPU-resident buffers and images,
//! accepts named bindings and uniforms, and runs `dispatch(groups)` calls.
//!
//! Two backends are provided:
//!
//! -   [`MockCpu`] (feature `mock`, on by default) records every command and
//!     validates buffer shapes the way a strict driver would. Tests and the
//!     headless demo run on it.
//! -   [`WgpuBackend`] (feature `gpu`) runs a WGSL kernel on a real device.

use thiserror::Error;

pub mod layout;

#[cfg(feature = "mock")]
mod backend;
#[cfg(feature = "gpu")]
mod wgpu_backend;

#[cfg(feature = "mock")]
pub use backend::mock_cpu::{Command, MockCpu};
pub use layout::{workgroups_for, KernelLayout};
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuBackend;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    #[error("buffer shape mismatch: {0}")]
    ShapeMismatch(&'static str),
    #[error("backend not available")]
    BackendUnavailable,
    #[error("zero-length buffer `{0}` cannot be created")]
    EmptyBuffer(String),
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("unknown image {0:?}")]
    UnknownImage(ImageId),
    #[error("kernel has no binding named `{0}`")]
    UnknownBinding(String),
    #[error("binding `{0}` has nothing bound")]
    Unbound(&'static str),
    #[error("device error: {0}")]
    Device(String),
}

/// Opaque handle to a buffer owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Opaque handle to a 2D image (render target, source or destination frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

/// Value assigned to a named uniform.
///
/// Matrices are column-major, as produced by `glam::Mat4::to_cols_array_2d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    /// Raw bytes of the value, tightly packed.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UniformValue::Float(v) => bytemuck::bytes_of(v),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v),
            UniformValue::Mat4(m) => bytemuck::cast_slice(m),
        }
    }
}

pub trait ComputeBackend {
    /// Allocates a buffer holding exactly `element_count` elements of
    /// `element_size` bytes.
    ///
    /// Returns [`ComputeError::EmptyBuffer`] for a zero element count; callers
    /// must take their empty path instead of binding nothing.
    fn create_buffer(
        &mut self,
        label: &str,
        element_count: usize,
        element_size: usize,
    ) -> Result<BufferHandle, ComputeError>;

    /// Overwrites the whole buffer. `data` must be exactly the buffer's size.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<(), ComputeError>;

    /// Releases the buffer. Any binding that referenced it becomes unbound.
    ///
    /// Implementations must not free memory still referenced by submitted work.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Binds a buffer to the kernel's structured buffer slot `name`.
    fn bind_buffer(&mut self, name: &str, buffer: BufferHandle) -> Result<(), ComputeError>;

    /// Binds an image to the kernel's output slot `name`.
    fn bind_image(&mut self, name: &str, image: ImageId) -> Result<(), ComputeError>;

    /// Sets a named uniform. The value is latched until the next dispatch.
    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), ComputeError>;

    /// Dispatches the kernel over `workgroups` thread groups.
    fn dispatch(&mut self, workgroups: [u32; 3]) -> Result<(), ComputeError>;

    /// Copies `source` onto `destination`.
    fn blit(&mut self, source: ImageId, destination: ImageId) -> Result<(), ComputeError>;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for Box<B> {
    fn create_buffer(
        &mut self,
        label: &str,
        element_count: usize,
        element_size: usize,
    ) -> Result<BufferHandle, ComputeError> {
        (**self).create_buffer(label, element_count, element_size)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<(), ComputeError> {
        (**self).write_buffer(buffer, data)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        (**self).destroy_buffer(buffer);
    }

    fn bind_buffer(&mut self, name: &str, buffer: BufferHandle) -> Result<(), ComputeError> {
        (**self).bind_buffer(name, buffer)
    }

    fn bind_image(&mut self, name: &str, image: ImageId) -> Result<(), ComputeError> {
        (**self).bind_image(name, image)
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), ComputeError> {
        (**self).set_uniform(name, value)
    }

    fn dispatch(&mut self, workgroups: [u32; 3]) -> Result<(), ComputeError> {
        (**self).dispatch(workgroups)
    }

    fn blit(&mut self, source: ImageId, destination: ImageId) -> Result<(), ComputeError> {
        (**self).blit(source, destination)
    }
}
