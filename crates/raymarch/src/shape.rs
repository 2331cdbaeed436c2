//! GPU-compatible shape record and helpers over flattened sequences.
//!
//! [`ShapeRecord`] is the element type of the `Shapes` structured buffer. Its
//! layout is a binary contract with `shaders/raymarch.wgsl`: 56 bytes, 4-byte
//! aligned, no padding. Records are stored in depth-first pre-order and every
//! record's `child_count` is the number of records in its subtree, so the
//! next sibling of record `i` lives at `i + child_count + 1`.

use bytemuck::{Pod, Zeroable};

/// How a shape combines with the accumulated result of its children.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    /// Plain union.
    #[default]
    None = 0,
    /// Subtract this shape from its children.
    Cut = 1,
    /// Keep only the intersection.
    Mask = 2,
    /// Smooth union using `blend_strength`.
    Blend = 3,
}

impl Operation {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Cut),
            2 => Some(Self::Mask),
            3 => Some(Self::Blend),
            _ => None,
        }
    }
}

/// Selects the distance function evaluated for a shape.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShapeType {
    #[default]
    Sphere = 0,
    Box = 1,
    Octahedron = 2,
    Plane = 3,
    Torus = 4,
}

impl ShapeType {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Sphere),
            1 => Some(Self::Box),
            2 => Some(Self::Octahedron),
            3 => Some(Self::Plane),
            4 => Some(Self::Torus),
            _ => None,
        }
    }
}

/// One flattened shape as seen by the ray marching kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShapeRecord {
    pub position: [f32; 3],
    /// Linear color, not clamped.
    pub color: [f32; 3],
    /// Extents for box, octahedron and torus variants.
    pub size: [f32; 3],
    pub radius: f32,
    /// [`Operation`] discriminant.
    pub operation: u32,
    /// [`ShapeType`] discriminant.
    pub shape_type: u32,
    /// Smoothing factor, only read when `operation` is [`Operation::Blend`].
    pub blend_strength: f32,
    /// Number of records following this one that belong to its subtree.
    pub child_count: u32,
}

const _: () = assert!(std::mem::size_of::<ShapeRecord>() == 56);
const _: () = assert!(std::mem::align_of::<ShapeRecord>() == 4);

impl ShapeRecord {
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        Operation::from_u32(self.operation)
    }

    #[must_use]
    pub fn shape_type(&self) -> Option<ShapeType> {
        ShapeType::from_u32(self.shape_type)
    }

    /// Index of the record after this one's subtree.
    #[must_use]
    pub fn skip(&self, index: usize) -> usize {
        index + self.child_count as usize + 1
    }
}

/// The records belonging to the subtree rooted at `index`, excluding the root.
///
/// Returns `None` if `index` is out of range or the subtree overruns the
/// slice.
#[must_use]
pub fn subtree(records: &[ShapeRecord], index: usize) -> Option<&[ShapeRecord]> {
    let root = records.get(index)?;
    records.get(index + 1..root.skip(index))
}

/// Iterates over the roots of a flattened sequence as `(index, record)` pairs,
/// jumping over each subtree the way the kernel does.
#[must_use]
pub fn top_level(records: &[ShapeRecord]) -> TopLevel<'_> {
    TopLevel { records, next: 0 }
}

#[derive(Debug, Clone)]
pub struct TopLevel<'a> {
    records: &'a [ShapeRecord],
    next: usize,
}

impl<'a> Iterator for TopLevel<'a> {
    type Item = (usize, &'a ShapeRecord);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let record = self.records.get(index)?;
        self.next = record.skip(index);
        Some((index, record))
    }
}

/// A nesting violation found by [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestingError {
    /// Index of the offending record.
    pub index: usize,
    /// End (exclusive) of the range the record had to fit into.
    pub limit: usize,
}

/// Checks that every subtree range lies inside its parent's range and that
/// roots tile the whole slice.
pub fn validate(records: &[ShapeRecord]) -> Result<(), NestingError> {
    // Stack of exclusive range ends for the open ancestors.
    let mut open: Vec<usize> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        while open.last().is_some_and(|&end| end <= index) {
            open.pop();
        }
        let limit = open.last().copied().unwrap_or(records.len());
        let end = record.skip(index);
        if end > limit {
            return Err(NestingError { index, limit });
        }
        open.push(end);
    }
    Ok(())
}
