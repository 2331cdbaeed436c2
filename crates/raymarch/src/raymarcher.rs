//! The render gate.
//!
//! [`RayMarcher`] owns the `Shapes` buffer on its backend and decides once per
//! frame whether the kernel has to run. A frame redraws when the camera moved,
//! when the controller is dirty, or when the controller flattened since the
//! last redraw (`attach` and host calls to `synchronize` leave it clean).
//! `needs_redraw` is only cleared once a redraw finishes or fails. The buffer
//! is recreated only when the flattened element count changes; otherwise it
//! is fully overwritten.

use compute::layout::{Slot, UniformField, TILE_SIZE};
use compute::{BufferHandle, ComputeBackend, ComputeError, ImageId, KernelLayout, UniformValue};
use tracing::{debug, trace, warn};

use crate::camera::CameraProvider;
use crate::error::RenderError;
use crate::scene::ShapeController;
use crate::shape::ShapeRecord;

pub const SHAPES: &str = "Shapes";
pub const RESULT: &str = "Result";
pub const CAMERA_TO_WORLD: &str = "CameraToWorld";
pub const CAMERA_INVERSE_PROJECTION: &str = "CameraInverseProjection";

/// WGSL source of the ray marching kernel.
pub const RAYMARCH_WGSL: &str = include_str!("../../../shaders/raymarch.wgsl");

/// Binding table for [`RAYMARCH_WGSL`].
pub static RAYMARCH_LAYOUT: KernelLayout = KernelLayout {
    label: "raymarch",
    entry_point: "main",
    buffers: &[Slot {
        name: SHAPES,
        binding: 0,
    }],
    images: &[Slot {
        name: RESULT,
        binding: 2,
    }],
    uniform_binding: 1,
    uniform_size: 128,
    uniforms: &[
        UniformField {
            name: CAMERA_TO_WORLD,
            offset: 0,
            size: 64,
        },
        UniformField {
            name: CAMERA_INVERSE_PROJECTION,
            offset: 64,
            size: 64,
        },
    ],
};

/// Output resolution and tiling of a ray marching pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayMarchConfig {
    pub width: u32,
    pub height: u32,
    /// Pixels covered by one thread group along each axis.
    pub tile_size: u32,
}

impl Default for RayMarchConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            tile_size: TILE_SIZE,
        }
    }
}

impl RayMarchConfig {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn workgroups(&self) -> [u32; 3] {
        compute::workgroups_for(self.width, self.height, self.tile_size.max(1))
    }

    pub(crate) fn check(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// What the gate did with a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The kernel ran. `recreated` is set when the shape buffer was
    /// reallocated for a new element count.
    Dispatched { recreated: bool },
    /// Nothing changed; the cached image was copied to the destination.
    Reused,
    /// The scene has no shapes; the source was copied to the destination.
    Empty,
    /// The backend rejected part of the frame. The previous image was reused.
    Failed(ComputeError),
}

/// Which image the destination last received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presented {
    /// Kernel output.
    Target,
    /// The frame's source, shown while the scene is empty.
    Source,
}

/// Running counters for the gate's decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    pub dispatches: u64,
    pub reuses: u64,
    pub empty_frames: u64,
    pub recreations: u64,
    pub writes: u64,
    pub failures: u64,
}

pub struct RayMarcher<B: ComputeBackend> {
    backend: B,
    config: RayMarchConfig,
    workgroups: [u32; 3],
    target: ImageId,
    shape_buffer: Option<BufferHandle>,
    /// Element count of the live buffer; `None` until the first upload and
    /// after a failure.
    element_count: Option<usize>,
    needs_redraw: bool,
    /// Controller flatten count seen by the last redraw.
    seen_flatten: Option<u64>,
    presented: Presented,
    stats: GateStats,
}

impl<B: ComputeBackend> RayMarcher<B> {
    /// Binds `target` as the kernel output. The first frame always redraws.
    pub fn new(mut backend: B, target: ImageId, config: RayMarchConfig) -> Result<Self, RenderError> {
        config.check()?;
        backend.bind_image(RESULT, target)?;
        let workgroups = config.workgroups();
        debug!(
            width = config.width,
            height = config.height,
            ?workgroups,
            "ray marcher ready"
        );
        Ok(Self {
            backend,
            config,
            workgroups,
            target,
            shape_buffer: None,
            element_count: None,
            needs_redraw: true,
            seen_flatten: None,
            presented: Presented::Target,
            stats: GateStats::default(),
        })
    }

    /// Runs the gate for one frame.
    ///
    /// Never panics on backend errors: a failed frame is logged, the previous
    /// image is copied to `destination` and the shape buffer is rebuilt on the
    /// next frame that needs it.
    pub fn render_frame(
        &mut self,
        controller: &mut ShapeController,
        camera: &impl CameraProvider,
        camera_moved: bool,
        source: ImageId,
        destination: ImageId,
    ) -> FrameOutcome {
        let unseen_flatten = self.seen_flatten != Some(controller.flatten_count());
        if camera_moved || controller.is_dirty() || unseen_flatten {
            self.needs_redraw = true;
        }

        if !self.needs_redraw {
            return match self.present(source, destination) {
                Ok(()) => {
                    self.stats.reuses += 1;
                    trace!("frame unchanged; reusing cached image");
                    FrameOutcome::Reused
                }
                Err(err) => self.fail(err, source, destination),
            };
        }

        match self.redraw(controller, camera, source, destination) {
            Ok(outcome) => {
                self.needs_redraw = false;
                outcome
            }
            Err(err) => self.fail(err, source, destination),
        }
    }

    /// Copies the image last shown to `destination` again.
    fn present(&mut self, source: ImageId, destination: ImageId) -> Result<(), ComputeError> {
        let image = match self.presented {
            Presented::Target => self.target,
            Presented::Source => source,
        };
        self.backend.blit(image, destination)
    }

    fn redraw(
        &mut self,
        controller: &mut ShapeController,
        camera: &impl CameraProvider,
        source: ImageId,
        destination: ImageId,
    ) -> Result<FrameOutcome, ComputeError> {
        controller.synchronize();
        self.seen_flatten = Some(controller.flatten_count());
        let records = controller.records();

        if records.is_empty() {
            if self.element_count != Some(0) {
                self.release_buffer();
                self.element_count = Some(0);
                debug!("scene is empty; shape buffer released");
            }
            self.backend.blit(source, destination)?;
            self.presented = Presented::Source;
            self.stats.empty_frames += 1;
            return Ok(FrameOutcome::Empty);
        }

        let recreated = self.shape_buffer.is_none() || self.element_count != Some(records.len());
        if recreated {
            self.release_buffer();
            let buffer = self.backend.create_buffer(
                SHAPES,
                records.len(),
                std::mem::size_of::<ShapeRecord>(),
            )?;
            self.shape_buffer = Some(buffer);
            self.backend.bind_buffer(SHAPES, buffer)?;
            self.element_count = Some(records.len());
            self.stats.recreations += 1;
            debug!(elements = records.len(), "shape buffer recreated");
        }

        let buffer = self
            .shape_buffer
            .ok_or(ComputeError::Unbound(SHAPES))?;
        self.backend
            .write_buffer(buffer, bytemuck::cast_slice(records))?;
        self.stats.writes += 1;

        self.backend.set_uniform(
            CAMERA_TO_WORLD,
            UniformValue::Mat4(camera.camera_to_world().to_cols_array_2d()),
        )?;
        self.backend.set_uniform(
            CAMERA_INVERSE_PROJECTION,
            UniformValue::Mat4(camera.inverse_projection().to_cols_array_2d()),
        )?;

        self.backend.dispatch(self.workgroups)?;
        self.stats.dispatches += 1;
        self.backend.blit(self.target, destination)?;
        self.presented = Presented::Target;
        trace!(elements = records.len(), recreated, "frame dispatched");
        Ok(FrameOutcome::Dispatched { recreated })
    }

    fn fail(&mut self, err: ComputeError, source: ImageId, destination: ImageId) -> FrameOutcome {
        warn!("ray marching frame failed, reusing previous image: {err}");
        self.stats.failures += 1;
        self.needs_redraw = false;
        self.release_buffer();
        self.element_count = None;
        if let Err(blit_err) = self.present(source, destination) {
            warn!("could not present previous image: {blit_err}");
        }
        FrameOutcome::Failed(err)
    }

    fn release_buffer(&mut self) {
        if let Some(buffer) = self.shape_buffer.take() {
            self.backend.destroy_buffer(buffer);
        }
    }

    /// Rebinds the output to `target` at the new resolution. The next frame
    /// redraws.
    pub fn resize(&mut self, width: u32, height: u32, target: ImageId) -> Result<(), RenderError> {
        let config = RayMarchConfig {
            width,
            height,
            ..self.config
        };
        config.check()?;
        self.backend.bind_image(RESULT, target)?;
        self.config = config;
        self.workgroups = config.workgroups();
        self.target = target;
        self.needs_redraw = true;
        debug!(width, height, workgroups = ?self.workgroups, "ray marcher resized");
        Ok(())
    }

    /// Forces the next frame to dispatch.
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Element count of the live shape buffer, if one was uploaded.
    #[must_use]
    pub fn element_count(&self) -> Option<usize> {
        self.element_count
    }

    #[must_use]
    pub fn workgroups(&self) -> [u32; 3] {
        self.workgroups
    }

    #[must_use]
    pub fn config(&self) -> RayMarchConfig {
        self.config
    }

    #[must_use]
    pub fn target(&self) -> ImageId {
        self.target
    }

    #[must_use]
    pub fn stats(&self) -> GateStats {
        self.stats
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Destroys the shape buffer. The next frame starts from scratch.
    pub fn teardown(&mut self) {
        self.release_buffer();
        self.element_count = None;
        self.needs_redraw = true;
        debug!(stats = ?self.stats, "ray marcher torn down");
    }
}
