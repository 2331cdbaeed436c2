//! Kernel binding tables.
//!
//! A [`KernelLayout`] names every slot a kernel exposes so that backends can
//! translate `bind_buffer("Shapes", ..)` style calls into binding indices and
//! uniform offsets. Tables are `'static` and live next to the WGSL they mirror.

/// Side length, in pixels, of the square tile covered by one thread group.
pub const TILE_SIZE: u32 = 32;

/// A storage buffer or storage image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub name: &'static str,
    pub binding: u32,
}

/// A named uniform inside the kernel's single uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformField {
    pub name: &'static str,
    /// Byte offset inside the uniform block.
    pub offset: usize,
    /// Size in bytes of the value written at `offset`.
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelLayout {
    pub label: &'static str,
    pub entry_point: &'static str,
    /// Read-only structured buffers.
    pub buffers: &'static [Slot],
    /// Write-only storage images.
    pub images: &'static [Slot],
    /// Binding index of the uniform block.
    pub uniform_binding: u32,
    /// Total size of the uniform block in bytes.
    pub uniform_size: usize,
    pub uniforms: &'static [UniformField],
}

impl KernelLayout {
    #[must_use]
    pub fn buffer_slot(&self, name: &str) -> Option<Slot> {
        self.buffers.iter().copied().find(|s| s.name == name)
    }

    #[must_use]
    pub fn image_slot(&self, name: &str) -> Option<Slot> {
        self.images.iter().copied().find(|s| s.name == name)
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformField> {
        self.uniforms.iter().copied().find(|u| u.name == name)
    }
}

/// Thread-group counts covering a `width` x `height` image with square tiles
/// of `tile_size` pixels. Never returns zero along an axis.
#[must_use]
pub const fn workgroups_for(width: u32, height: u32, tile_size: u32) -> [u32; 3] {
    let x = width.div_ceil(tile_size);
    let y = height.div_ceil(tile_size);
    [if x == 0 { 1 } else { x }, if y == 0 { 1 } else { y }, 1]
}

const _: () = assert!(workgroups_for(33, 32, TILE_SIZE)[0] == 2);
