//! Authored shape hierarchy.
//!
//! A [`ShapeNode`] owns its authoring fields and its children. Every mutation
//! entry point signals the node's [`ChangeSink`], which the
//! [`ShapeController`](crate::ShapeController) installs when it attaches the
//! tree. Signalling is a counter bump: nothing is flattened until the
//! controller pulls the count at its next `synchronize()`.

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec3;

use crate::shape::{Operation, ShapeRecord, ShapeType};

/// Shared edit counter between a controller and the nodes it observes.
///
/// Cloning shares the counter. The scene is single-threaded, hence `Rc`.
#[derive(Debug, Clone, Default)]
pub struct ChangeSink(Rc<Cell<u64>>);

impl ChangeSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.0.set(self.0.get().saturating_add(1));
    }

    /// Edits recorded since the last [`take`](Self::take).
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.0.get()
    }

    /// Returns the pending edit count and resets it.
    pub fn take(&self) -> u64 {
        self.0.replace(0)
    }

    #[must_use]
    pub fn is_shared_with(&self, other: &ChangeSink) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Geometric authoring fields of a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub position: Vec3,
    /// Extents for box, octahedron and torus variants.
    pub size: Vec3,
    /// Authoring range is `0.5..=3.0`; the node does not clamp.
    pub radius: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            size: Vec3::ONE,
            radius: 1.0,
        }
    }
}

/// The host environment's view of a node's transform.
///
/// The host raises `has_changed` when it moves the object; the node consumes
/// and resets it in [`ShapeNode::apply_host_transform`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostTransform {
    pub position: Vec3,
    pub has_changed: bool,
}

impl HostTransform {
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            has_changed: true,
        }
    }

    pub fn move_to(&mut self, position: Vec3) {
        self.position = position;
        self.has_changed = true;
    }
}

/// An authored shape and its children.
///
/// Cloning yields a detached copy: the clone has no id and signals no
/// controller until it is attached.
#[derive(Debug)]
pub struct ShapeNode {
    geometry: Geometry,
    color: Vec3,
    operation: Operation,
    blend_strength: f32,
    shape_type: ShapeType,
    children: Vec<ShapeNode>,
    /// Pre-order index assigned by the last flatten.
    id: Option<usize>,
    sink: Option<ChangeSink>,
}

impl Clone for ShapeNode {
    fn clone(&self) -> Self {
        Self {
            geometry: self.geometry,
            color: self.color,
            operation: self.operation,
            blend_strength: self.blend_strength,
            shape_type: self.shape_type,
            children: self.children.clone(),
            id: None,
            sink: None,
        }
    }
}

impl ShapeNode {
    #[must_use]
    pub fn new(shape_type: ShapeType) -> Self {
        Self {
            geometry: Geometry::default(),
            color: Vec3::ONE,
            operation: Operation::None,
            blend_strength: 0.0,
            shape_type,
            children: Vec::new(),
            id: None,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.geometry.position = position;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: Vec3) -> Self {
        self.geometry.size = size;
        self
    }

    #[must_use]
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.geometry.radius = radius;
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: Operation, blend_strength: f32) -> Self {
        self.operation = operation;
        self.blend_strength = blend_strength;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: ShapeNode) -> Self {
        self.add_child(child);
        self
    }

    /// Replaces every authored field at once. Always signals, even when the
    /// values are unchanged.
    pub fn set_fields(
        &mut self,
        geometry: Geometry,
        color: Vec3,
        operation: Operation,
        blend_strength: f32,
        shape_type: ShapeType,
    ) {
        self.geometry = geometry;
        self.color = color;
        self.operation = operation;
        self.blend_strength = blend_strength;
        self.shape_type = shape_type;
        self.notify();
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.geometry.position = position;
        self.notify();
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.notify();
    }

    pub fn set_size(&mut self, size: Vec3) {
        self.geometry.size = size;
        self.notify();
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.geometry.radius = radius;
        self.notify();
    }

    pub fn set_operation(&mut self, operation: Operation) {
        self.operation = operation;
        self.notify();
    }

    pub fn set_blend_strength(&mut self, blend_strength: f32) {
        self.blend_strength = blend_strength;
        self.notify();
    }

    pub fn set_shape_type(&mut self, shape_type: ShapeType) {
        self.shape_type = shape_type;
        self.notify();
    }

    /// Appends `child`, subscribing its whole subtree to this node's sink.
    pub fn add_child(&mut self, mut child: ShapeNode) {
        child.install_sink(self.sink.as_ref());
        self.children.push(child);
        self.notify();
    }

    /// Detaches and returns the child at `index`, or `None` if out of range.
    ///
    /// The returned subtree no longer reports to this node's sink.
    pub fn remove_child(&mut self, index: usize) -> Option<ShapeNode> {
        if index >= self.children.len() {
            return None;
        }
        let mut child = self.children.remove(index);
        child.install_sink(None);
        child.clear_ids();
        self.notify();
        Some(child)
    }

    /// Copies the host position if the host flagged a change, then resets the
    /// host flag. Returns whether a change was consumed.
    pub fn apply_host_transform(&mut self, host: &mut HostTransform) -> bool {
        if !host.has_changed {
            return false;
        }
        host.has_changed = false;
        self.set_position(host.position);
        true
    }

    #[must_use]
    pub fn children(&self) -> &[ShapeNode] {
        &self.children
    }

    /// Mutable access to the children. Field edits through the returned nodes
    /// signal. Structural edits must go through `add_child`/`remove_child`:
    /// swapping nodes through the slice is not observed.
    pub fn children_mut(&mut self) -> &mut [ShapeNode] {
        &mut self.children
    }

    /// Position in the last flattened sequence. Stale until the next
    /// `synchronize()` after a structural edit.
    #[must_use]
    pub fn id(&self) -> Option<usize> {
        self.id
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[must_use]
    pub fn color(&self) -> Vec3 {
        self.color
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn blend_strength(&self) -> f32 {
        self.blend_strength
    }

    #[must_use]
    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    /// Total number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ShapeNode::node_count).sum::<usize>()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.sink.is_some()
    }

    /// Snapshot of the authored fields with a caller-supplied subtree size.
    #[must_use]
    pub fn to_record(&self, child_count: u32) -> ShapeRecord {
        ShapeRecord {
            position: self.geometry.position.to_array(),
            color: self.color.to_array(),
            size: self.geometry.size.to_array(),
            radius: self.geometry.radius,
            operation: self.operation as u32,
            shape_type: self.shape_type as u32,
            blend_strength: self.blend_strength,
            child_count,
        }
    }

    fn notify(&self) {
        if let Some(sink) = &self.sink {
            sink.notify();
        }
    }

    pub(crate) fn install_sink(&mut self, sink: Option<&ChangeSink>) {
        self.sink = sink.cloned();
        for child in &mut self.children {
            child.install_sink(sink);
        }
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = Some(id);
    }

    pub(crate) fn clear_ids(&mut self) {
        self.id = None;
        for child in &mut self.children {
            child.clear_ids();
        }
    }
}
