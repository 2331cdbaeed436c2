//! Scene flattening.
//!
//! The [`ShapeController`] owns the root set of the authored tree and a
//! single dirty state: the pending edit count of its shared [`ChangeSink`]
//! plus a flag for root-level structural edits. Edits never flatten
//! synchronously; [`ShapeController::synchronize`] re-walks the tree at most
//! once per call, so a burst of N edits costs one flatten.

use tracing::{debug, trace};

use crate::node::{ChangeSink, ShapeNode};
use crate::shape::{self, ShapeRecord};

/// Pre-order position of a node in the last flattened sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Default)]
pub struct ShapeController {
    roots: Vec<ShapeNode>,
    sink: ChangeSink,
    structure_changed: bool,
    records: Vec<ShapeRecord>,
    flatten_count: u64,
}

impl ShapeController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `roots`, subscribes every node in them and performs
    /// the initial flatten. Previously attached roots are released.
    pub fn attach(&mut self, roots: impl IntoIterator<Item = ShapeNode>) {
        for old in &mut self.roots {
            old.install_sink(None);
        }
        self.roots = roots
            .into_iter()
            .map(|mut root| {
                root.install_sink(Some(&self.sink));
                root
            })
            .collect();
        self.structure_changed = true;
        let count = self.synchronize().len();
        debug!(records = count, "attached shape tree");
    }

    pub fn add_root(&mut self, mut root: ShapeNode) {
        root.install_sink(Some(&self.sink));
        self.roots.push(root);
        self.structure_changed = true;
    }

    pub fn remove_root(&mut self, index: usize) -> Option<ShapeNode> {
        if index >= self.roots.len() {
            return None;
        }
        let mut root = self.roots.remove(index);
        root.install_sink(None);
        root.clear_ids();
        self.structure_changed = true;
        Some(root)
    }

    #[must_use]
    pub fn roots(&self) -> &[ShapeNode] {
        &self.roots
    }

    /// Field edits through the returned nodes are observed; see
    /// [`ShapeNode::children_mut`] for the structural caveat.
    pub fn roots_mut(&mut self) -> &mut [ShapeNode] {
        &mut self.roots
    }

    /// Looks a node up by the id assigned in the last flatten.
    ///
    /// Ids are only meaningful after the frame's `synchronize()`: a structural
    /// edit since then may make this return a different node or `None`.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ShapeNode> {
        self.roots.iter_mut().find_map(|root| find_mut(root, id.0))
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.structure_changed || self.sink.pending() > 0
    }

    /// Node edits signalled since the last flatten.
    #[must_use]
    pub fn pending_edits(&self) -> u64 {
        self.sink.pending()
    }

    /// Returns the flattened sequence, re-walking the tree only if something
    /// changed since the previous call.
    ///
    /// Each node is assigned its pre-order index as id and emitted with
    /// `child_count` set to the number of records in its subtree.
    pub fn synchronize(&mut self) -> &[ShapeRecord] {
        if !self.is_dirty() {
            trace!("shape tree unchanged; reusing flattened records");
            return &self.records;
        }

        let edits = self.sink.take();
        self.structure_changed = false;
        self.records.clear();
        for root in &mut self.roots {
            flatten_into(root, &mut self.records);
        }
        self.flatten_count += 1;

        debug_assert!(
            shape::validate(&self.records).is_ok(),
            "flattened subtree ranges do not nest"
        );
        debug!(
            records = self.records.len(),
            edits,
            flatten = self.flatten_count,
            "flattened shape tree"
        );
        &self.records
    }

    /// The sequence produced by the last flatten, without synchronizing.
    #[must_use]
    pub fn records(&self) -> &[ShapeRecord] {
        &self.records
    }

    /// How many times the tree has been walked.
    #[must_use]
    pub fn flatten_count(&self) -> u64 {
        self.flatten_count
    }

    /// Unsubscribes every node and drops the cached records, handing the
    /// roots back to the caller.
    pub fn teardown(&mut self) -> Vec<ShapeNode> {
        let mut roots = std::mem::take(&mut self.roots);
        for root in &mut roots {
            root.install_sink(None);
        }
        self.records.clear();
        self.sink.take();
        self.structure_changed = false;
        debug!(roots = roots.len(), "shape controller torn down");
        roots
    }
}

/// Emits `node` and its subtree in pre-order. The node's record is pushed as
/// a placeholder and patched with the descendant count once the children are
/// written.
fn flatten_into(node: &mut ShapeNode, out: &mut Vec<ShapeRecord>) {
    let index = out.len();
    node.set_id(index);
    out.push(node.to_record(0));
    for child in node.children_mut() {
        flatten_into(child, out);
    }
    let descendants = out.len() - index - 1;
    out[index].child_count = u32::try_from(descendants).unwrap_or(u32::MAX);
}

fn find_mut(node: &mut ShapeNode, id: usize) -> Option<&mut ShapeNode> {
    if node.id() == Some(id) {
        return Some(node);
    }
    node.children_mut()
        .iter_mut()
        .find_map(|child| find_mut(child, id))
}
