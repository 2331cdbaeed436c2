use std::collections::{BTreeMap, HashMap};

use crate::{
    BufferHandle, ComputeBackend, ComputeError, ImageId, KernelLayout, UniformValue,
};

/// One call received by [`MockCpu`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBuffer {
        buffer: BufferHandle,
        element_count: usize,
        element_size: usize,
    },
    WriteBuffer {
        buffer: BufferHandle,
        bytes: usize,
    },
    DestroyBuffer(BufferHandle),
    BindBuffer {
        name: String,
        buffer: BufferHandle,
    },
    BindImage {
        name: String,
        image: ImageId,
    },
    SetUniform {
        name: String,
        value: UniformValue,
    },
    Dispatch([u32; 3]),
    Blit {
        source: ImageId,
        destination: ImageId,
    },
}

#[derive(Debug)]
struct MockBuffer {
    element_size: usize,
    data: Vec<u8>,
}

/// Recording backend that executes nothing but validates like a strict driver.
///
/// - zero-length buffers are rejected
/// - writes must cover the whole buffer
/// - dispatching with a destroyed buffer still bound fails
/// - an optional [`KernelLayout`] restricts binding and uniform names
///
/// Images have no pixels; each one carries a generation counter that a
/// dispatch bumps on its bound outputs and a blit copies across, which is
/// enough to tell a fresh frame from a reused one.
#[derive(Debug, Default)]
pub struct MockCpu {
    layout: Option<&'static KernelLayout>,
    next_id: u64,
    buffers: HashMap<BufferHandle, MockBuffer>,
    images: HashMap<ImageId, u64>,
    bound_buffers: BTreeMap<String, BufferHandle>,
    bound_images: BTreeMap<String, ImageId>,
    uniforms: BTreeMap<String, UniformValue>,
    commands: Vec<Command>,
    fail_dispatches: usize,
    fail_uniform: Option<String>,
}

impl MockCpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts bindings and uniforms to the names declared by `layout`.
    #[must_use]
    pub fn with_layout(layout: &'static KernelLayout) -> Self {
        Self {
            layout: Some(layout),
            ..Self::default()
        }
    }

    /// Registers an image (render target, source or destination frame).
    pub fn create_image(&mut self) -> ImageId {
        let id = ImageId(self.allocate_id());
        self.images.insert(id, 0);
        id
    }

    /// Makes the next `count` dispatches fail with [`ComputeError::Device`].
    pub fn fail_next_dispatches(&mut self, count: usize) {
        self.fail_dispatches = count;
    }

    /// Makes the next write of uniform `name` fail with [`ComputeError::Device`].
    pub fn fail_next_uniform(&mut self, name: &str) {
        self.fail_uniform = Some(name.to_owned());
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of recorded commands matching `pred`.
    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    #[must_use]
    pub fn dispatch_count(&self) -> usize {
        self.count(|c| matches!(c, Command::Dispatch(_)))
    }

    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Bytes last written to `buffer`, if it is alive.
    #[must_use]
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// Element count of a live buffer.
    #[must_use]
    pub fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers
            .get(&buffer)
            .map(|b| b.data.len() / b.element_size)
    }

    #[must_use]
    pub fn bound_buffer(&self, name: &str) -> Option<BufferHandle> {
        self.bound_buffers.get(name).copied()
    }

    #[must_use]
    pub fn bound_image(&self, name: &str) -> Option<ImageId> {
        self.bound_images.get(name).copied()
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    /// Generation of `image`: 0 until something is rendered into it.
    #[must_use]
    pub fn image_generation(&self, image: ImageId) -> Option<u64> {
        self.images.get(&image).copied()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_image(&self, image: ImageId) -> Result<(), ComputeError> {
        if self.images.contains_key(&image) {
            Ok(())
        } else {
            Err(ComputeError::UnknownImage(image))
        }
    }
}

impl ComputeBackend for MockCpu {
    fn create_buffer(
        &mut self,
        label: &str,
        element_count: usize,
        element_size: usize,
    ) -> Result<BufferHandle, ComputeError> {
        if element_count == 0 || element_size == 0 {
            return Err(ComputeError::EmptyBuffer(label.to_owned()));
        }
        let buffer = BufferHandle(self.allocate_id());
        self.buffers.insert(
            buffer,
            MockBuffer {
                element_size,
                data: vec![0u8; element_count * element_size],
            },
        );
        self.commands.push(Command::CreateBuffer {
            buffer,
            element_count,
            element_size,
        });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<(), ComputeError> {
        let target = self
            .buffers
            .get_mut(&buffer)
            .ok_or(ComputeError::UnknownBuffer(buffer))?;
        if target.data.len() != data.len() {
            return Err(ComputeError::ShapeMismatch(
                "write length does not match buffer size",
            ));
        }
        target.data.copy_from_slice(data);
        self.commands.push(Command::WriteBuffer {
            buffer,
            bytes: data.len(),
        });
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            self.bound_buffers.retain(|_, b| *b != buffer);
            self.commands.push(Command::DestroyBuffer(buffer));
        }
    }

    fn bind_buffer(&mut self, name: &str, buffer: BufferHandle) -> Result<(), ComputeError> {
        if let Some(layout) = self.layout {
            if layout.buffer_slot(name).is_none() {
                return Err(ComputeError::UnknownBinding(name.to_owned()));
            }
        }
        if !self.buffers.contains_key(&buffer) {
            return Err(ComputeError::UnknownBuffer(buffer));
        }
        self.bound_buffers.insert(name.to_owned(), buffer);
        self.commands.push(Command::BindBuffer {
            name: name.to_owned(),
            buffer,
        });
        Ok(())
    }

    fn bind_image(&mut self, name: &str, image: ImageId) -> Result<(), ComputeError> {
        if let Some(layout) = self.layout {
            if layout.image_slot(name).is_none() {
                return Err(ComputeError::UnknownBinding(name.to_owned()));
            }
        }
        self.check_image(image)?;
        self.bound_images.insert(name.to_owned(), image);
        self.commands.push(Command::BindImage {
            name: name.to_owned(),
            image,
        });
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), ComputeError> {
        if self.fail_uniform.as_deref() == Some(name) {
            self.fail_uniform = None;
            return Err(ComputeError::Device(format!("injected failure writing {name}")));
        }
        if let Some(layout) = self.layout {
            match layout.uniform(name) {
                None => return Err(ComputeError::UnknownBinding(name.to_owned())),
                Some(field) if field.size != value.as_bytes().len() => {
                    return Err(ComputeError::ShapeMismatch(
                        "uniform value size does not match its declaration",
                    ));
                }
                Some(_) => {}
            }
        }
        self.uniforms.insert(name.to_owned(), value);
        self.commands.push(Command::SetUniform {
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    fn dispatch(&mut self, workgroups: [u32; 3]) -> Result<(), ComputeError> {
        if self.fail_dispatches > 0 {
            self.fail_dispatches -= 1;
            return Err(ComputeError::Device("injected dispatch failure".to_owned()));
        }
        if workgroups.contains(&0) {
            return Err(ComputeError::ShapeMismatch("workgroup count must be non-zero"));
        }
        if let Some(layout) = self.layout {
            for slot in layout.buffers {
                if !self.bound_buffers.contains_key(slot.name) {
                    return Err(ComputeError::Unbound(slot.name));
                }
            }
            for slot in layout.images {
                if !self.bound_images.contains_key(slot.name) {
                    return Err(ComputeError::Unbound(slot.name));
                }
            }
        }
        for image in self.bound_images.values() {
            if let Some(generation) = self.images.get_mut(image) {
                *generation += 1;
            }
        }
        self.commands.push(Command::Dispatch(workgroups));
        Ok(())
    }

    fn blit(&mut self, source: ImageId, destination: ImageId) -> Result<(), ComputeError> {
        self.check_image(source)?;
        self.check_image(destination)?;
        let generation = self.images[&source];
        self.images.insert(destination, generation);
        self.commands.push(Command::Blit {
            source,
            destination,
        });
        Ok(())
    }
}
