//! Node heap: a compacting arena of chain nodes.
//!
//! Nodes live in one contiguous vector and are addressed by [`NodeId`].
//! Allocation pushes at the top. Freeing a node moves the top node into the
//! hole so the arena never has gaps; the caller repoints whatever referenced
//! the moved node before calling [`NodeHeap::free_and_compact`].

use crate::constants::NODES_PER_BLOCK;
use crate::types::{HashNode, HeapPurpose, NodeId};
use zyron_common::{Result, ZyronError};

pub(crate) struct NodeHeap {
    /// Node slots, densely packed.
    nodes: Vec<HashNode>,
    /// What the heap is used for; decides how allocation failure surfaces.
    purpose: HeapPurpose,
    /// Maximum number of live nodes (None = unbounded).
    budget: Option<usize>,
}

impl NodeHeap {
    pub(crate) fn new(purpose: HeapPurpose, budget: Option<usize>) -> Self {
        Self {
            nodes: Vec::new(),
            purpose,
            budget,
        }
    }

    /// Allocates a slot for `node`.
    ///
    /// Returns `Ok(None)` when a search heap is full. A page-hash heap that
    /// cannot grow reports `OutOfMemory`.
    pub(crate) fn alloc(&mut self, node: HashNode) -> Result<Option<NodeId>> {
        let at_budget = self.budget.is_some_and(|budget| self.nodes.len() >= budget);
        if at_budget || self.nodes.try_reserve(1).is_err() {
            return match self.purpose {
                HeapPurpose::BtrSearch => Ok(None),
                HeapPurpose::PageHash => Err(ZyronError::OutOfMemory(format!(
                    "page hash node heap exhausted at {} nodes",
                    self.nodes.len()
                ))),
            };
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        Ok(Some(id))
    }

    #[inline(always)]
    pub(crate) fn get(&self, id: NodeId) -> &HashNode {
        &self.nodes[id.index()]
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut HashNode {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    /// Returns the id of the most recently allocated slot.
    #[inline]
    pub(crate) fn top(&self) -> Option<NodeId> {
        self.nodes.len().checked_sub(1).map(|i| NodeId(i as u32))
    }

    /// Frees `hole` and moves the top node into it. Returns the freed node.
    ///
    /// The node must already be unlinked from its chain, and every reference
    /// to the top node must already point at `hole`.
    pub(crate) fn free_and_compact(&mut self, hole: NodeId) -> HashNode {
        self.nodes.swap_remove(hole.index())
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Approximate number of heap blocks backing the live nodes.
    pub(crate) fn n_blocks(&self) -> usize {
        self.nodes.len().div_ceil(NODES_PER_BLOCK)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &HashNode> {
        self.nodes.iter()
    }

    /// Drops every node and returns the memory.
    pub(crate) fn free_all(&mut self) {
        self.nodes = Vec::new();
    }
}
