//! GPU implementation of [`ComputeBackend`] built on [`wgpu`].
//!
//! One backend drives one compute kernel: the WGSL source and its
//! [`KernelLayout`] are supplied at construction, the bind group layout is
//! derived from the layout table, and the bind group is rebuilt lazily after
//! any binding changes. Initialization fails with
//! [`ComputeError::BackendUnavailable`] if no adapter is found.

use std::collections::HashMap;

use crate::{BufferHandle, ComputeBackend, ComputeError, ImageId, KernelLayout, UniformValue};

/// Storage image format used for every output slot.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: &'static KernelLayout,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    uniform_buffer: wgpu::Buffer,
    uniform_data: Vec<u8>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    images: HashMap<ImageId, wgpu::Texture>,
    bound_buffers: HashMap<u32, BufferHandle>,
    bound_images: HashMap<u32, ImageId>,
    next_id: u64,
}

impl WgpuBackend {
    /// Creates a headless backend on the default high-performance adapter and
    /// compiles `shader_source` against `layout`.
    pub fn new(shader_source: &str, layout: &'static KernelLayout) -> Result<Self, ComputeError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or(ComputeError::BackendUnavailable)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some(layout.label),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|err| {
            tracing::error!("Failed to request device: {err:?}");
            ComputeError::BackendUnavailable
        })?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(layout.label),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel bind group layout"),
            entries: &layout_entries(layout),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kernel pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(layout.label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: layout.entry_point,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        // Uniform blocks are sized in multiples of 16 bytes.
        let uniform_size = layout.uniform_size.max(16).next_multiple_of(16);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernel uniforms"),
            size: uniform_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            layout,
            pipeline,
            bind_group_layout,
            bind_group: None,
            uniform_buffer,
            uniform_data: vec![0u8; uniform_size],
            buffers: HashMap::new(),
            images: HashMap::new(),
            bound_buffers: HashMap::new(),
            bound_images: HashMap::new(),
            next_id: 0,
        })
    }

    /// Creates a storage image usable both as a kernel output and as a blit
    /// source or destination.
    pub fn create_image(&mut self, width: u32, height: u32) -> ImageId {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kernel image"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.register_texture(texture)
    }

    /// Registers an externally created texture.
    pub fn register_texture(&mut self, texture: wgpu::Texture) -> ImageId {
        self.next_id += 1;
        let id = ImageId(self.next_id);
        self.images.insert(id, texture);
        id
    }

    #[must_use]
    pub fn texture(&self, image: ImageId) -> Option<&wgpu::Texture> {
        self.images.get(&image)
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn ensure_bind_group(&mut self) -> Result<(), ComputeError> {
        if self.bind_group.is_some() {
            return Ok(());
        }

        let mut views = Vec::with_capacity(self.layout.images.len());
        for slot in self.layout.images {
            let image = self
                .bound_images
                .get(&slot.binding)
                .ok_or(ComputeError::Unbound(slot.name))?;
            let texture = self
                .images
                .get(image)
                .ok_or(ComputeError::UnknownImage(*image))?;
            views.push((
                slot.binding,
                texture.create_view(&wgpu::TextureViewDescriptor::default()),
            ));
        }

        let mut entries = Vec::with_capacity(self.layout.buffers.len() + views.len() + 1);
        for slot in self.layout.buffers {
            let handle = self
                .bound_buffers
                .get(&slot.binding)
                .ok_or(ComputeError::Unbound(slot.name))?;
            let buffer = self
                .buffers
                .get(handle)
                .ok_or(ComputeError::UnknownBuffer(*handle))?;
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: buffer.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: self.layout.uniform_binding,
            resource: self.uniform_buffer.as_entire_binding(),
        });
        for (binding, view) in &views {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel bind group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });
        self.bind_group = Some(bind_group);
        Ok(())
    }
}

fn layout_entries(layout: &KernelLayout) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::new();
    for slot in layout.buffers {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: layout.uniform_binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });
    for slot in layout.images {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: IMAGE_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });
    }
    entries
}

impl ComputeBackend for WgpuBackend {
    fn create_buffer(
        &mut self,
        label: &str,
        element_count: usize,
        element_size: usize,
    ) -> Result<BufferHandle, ComputeError> {
        if element_count == 0 || element_size == 0 {
            return Err(ComputeError::EmptyBuffer(label.to_owned()));
        }
        let size = (element_count * element_size) as u64;
        if size > u64::from(self.device.limits().max_storage_buffer_binding_size) {
            return Err(ComputeError::ShapeMismatch(
                "buffer exceeds the device storage binding limit",
            ));
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.next_id += 1;
        let handle = BufferHandle(self.next_id);
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<(), ComputeError> {
        let target = self
            .buffers
            .get(&buffer)
            .ok_or(ComputeError::UnknownBuffer(buffer))?;
        if target.size() != data.len() as u64 {
            return Err(ComputeError::ShapeMismatch(
                "write length does not match buffer size",
            ));
        }
        self.queue.write_buffer(target, 0, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        let Some(gpu_buffer) = self.buffers.remove(&buffer) else {
            return;
        };
        self.bound_buffers.retain(|_, b| *b != buffer);
        self.bind_group = None;
        // Wait for submitted work that may still read the buffer.
        let _ = self.device.poll(wgpu::Maintain::Wait);
        gpu_buffer.destroy();
    }

    fn bind_buffer(&mut self, name: &str, buffer: BufferHandle) -> Result<(), ComputeError> {
        let slot = self
            .layout
            .buffer_slot(name)
            .ok_or_else(|| ComputeError::UnknownBinding(name.to_owned()))?;
        if !self.buffers.contains_key(&buffer) {
            return Err(ComputeError::UnknownBuffer(buffer));
        }
        self.bound_buffers.insert(slot.binding, buffer);
        self.bind_group = None;
        Ok(())
    }

    fn bind_image(&mut self, name: &str, image: ImageId) -> Result<(), ComputeError> {
        let slot = self
            .layout
            .image_slot(name)
            .ok_or_else(|| ComputeError::UnknownBinding(name.to_owned()))?;
        if !self.images.contains_key(&image) {
            return Err(ComputeError::UnknownImage(image));
        }
        self.bound_images.insert(slot.binding, image);
        self.bind_group = None;
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), ComputeError> {
        let field = self
            .layout
            .uniform(name)
            .ok_or_else(|| ComputeError::UnknownBinding(name.to_owned()))?;
        let bytes = value.as_bytes();
        if bytes.len() != field.size {
            return Err(ComputeError::ShapeMismatch(
                "uniform value size does not match its declaration",
            ));
        }
        self.uniform_data[field.offset..field.offset + field.size].copy_from_slice(bytes);
        Ok(())
    }

    fn dispatch(&mut self, workgroups: [u32; 3]) -> Result<(), ComputeError> {
        self.ensure_bind_group()?;
        let Some(bind_group) = self.bind_group.as_ref() else {
            return Err(ComputeError::Unbound("bind group"));
        };

        self.queue
            .write_buffer(&self.uniform_buffer, 0, &self.uniform_data);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernel dispatch"),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(self.layout.label),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(0, bind_group, &[]);
            cpass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn blit(&mut self, source: ImageId, destination: ImageId) -> Result<(), ComputeError> {
        let src = self
            .images
            .get(&source)
            .ok_or(ComputeError::UnknownImage(source))?;
        let dst = self
            .images
            .get(&destination)
            .ok_or(ComputeError::UnknownImage(destination))?;
        if src.size() != dst.size() || src.format() != dst.format() {
            return Err(ComputeError::ShapeMismatch(
                "blit source and destination differ in size or format",
            ));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernel blit"),
            });
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: src,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: dst,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            src.size(),
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
