//! One latch partition of a hash table: its cells and its node heap.
//!
//! A `Partition` is only reachable through the `RwLock` guarding it, so a
//! `&Partition` proves a shared latch is held and a `&mut Partition` proves
//! the exclusive latch is held. None of the methods here take latches.

use crate::cells::CellLayout;
use crate::constants::MAX_N_POINTERS;
use crate::heap::NodeHeap;
use crate::invariant::check_invariant;
use crate::switch::SearchSwitch;
use crate::types::{HashNode, HashTableStats, NodeId};
use log::{debug, error, trace};
use std::sync::Arc;
use zyron_buffer::{BufferBlock, PageResidency};
use zyron_common::page::{PageId, RecordRef};
use zyron_common::{InvariantPolicy, Result, ZyronError};

/// Where the pointer to a node lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// Head of the chain in the given local slot.
    Cell(usize),
    /// `next` field of the given node.
    Node(NodeId),
}

/// Cells and nodes covered by one latch.
pub struct Partition {
    index: usize,
    layout: CellLayout,
    policy: InvariantPolicy,
    /// Nodes keep their block and maintain its pointer counter.
    adaptive: bool,
    switch: Arc<SearchSwitch>,
    stats: Arc<HashTableStats>,
    /// Chain heads, indexed by local slot.
    cells: Box<[Option<NodeId>]>,
    heap: NodeHeap,
}

impl Partition {
    pub(crate) fn new(
        index: usize,
        layout: CellLayout,
        policy: InvariantPolicy,
        adaptive: bool,
        switch: Arc<SearchSwitch>,
        stats: Arc<HashTableStats>,
        heap: NodeHeap,
    ) -> Self {
        let n_slots = layout.cells_in_partition(index);
        Self {
            index,
            layout,
            policy,
            adaptive,
            switch,
            stats,
            cells: vec![None; n_slots].into_boxed_slice(),
            heap,
        }
    }

    /// Returns the partition number.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns true if this partition's latch covers `fold`.
    #[inline]
    pub fn owns(&self, fold: u64) -> bool {
        self.layout.partition_of(fold) == self.index
    }

    #[inline(always)]
    fn slot_of(&self, fold: u64) -> usize {
        self.layout.local_slot(self.layout.cell_of(fold))
    }

    // =========================================================================
    // Read operations
    // =========================================================================

    /// Returns the first node in the chain of `fold`'s cell.
    ///
    /// The chain holds every node of the cell, not only those with `fold`.
    /// Returns None if this partition does not cover `fold`.
    pub fn chain_first(&self, fold: u64) -> Option<NodeId> {
        if !self.owns(fold) {
            return None;
        }
        self.cells.get(self.slot_of(fold)).copied().flatten()
    }

    /// Returns the node following `id` in its chain.
    #[inline]
    pub fn chain_next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(HashNode::next)
    }

    /// Returns the node stored at `id`.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&HashNode> {
        self.heap.contains(id).then(|| self.heap.get(id))
    }

    /// Iterates the chain of `fold`'s cell.
    pub fn chain(&self, fold: u64) -> Chain<'_> {
        Chain {
            partition: self,
            next: self.chain_first(fold),
        }
    }

    /// Returns the data of the node with `fold`, if any.
    pub fn search_and_get_data(&self, fold: u64) -> Option<RecordRef> {
        self.search_node(fold).map(|id| self.heap.get(id).data)
    }

    /// Returns the node with `fold` whose data is `data`.
    pub fn search_with_data(&self, fold: u64, data: RecordRef) -> Option<NodeId> {
        self.chain(fold)
            .find(|(_, node)| node.fold == fold && node.data == data)
            .map(|(id, _)| id)
    }

    fn search_node(&self, fold: u64) -> Option<NodeId> {
        self.chain(fold)
            .find(|(_, node)| node.fold == fold)
            .map(|(id, _)| id)
    }

    /// Returns the number of nodes stored in this partition.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.heap.len()
    }

    /// Returns the number of non-empty cells.
    pub fn used_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Returns the number of nodes whose data lies on `page_id`.
    pub fn count_pointers_to(&self, page_id: PageId) -> usize {
        self.heap
            .iter()
            .filter(|node| node.data.page_id == page_id)
            .count()
    }

    pub(crate) fn heap_blocks(&self) -> usize {
        self.heap.n_blocks()
    }

    /// Checks that every node in the cells `start..=end` hashes to the cell
    /// it is chained from. Returns the number of problems found.
    ///
    /// Each mismatch is logged and the scan moves on. A chain that leaves the
    /// heap or loops is reported once and abandoned.
    pub(crate) fn validate_range(&self, start: usize, end: usize) -> usize {
        let mut problems = 0;

        for (slot, head) in self.cells.iter().enumerate() {
            let cell = self.layout.global_cell(self.index, slot);
            if cell < start || cell > end {
                continue;
            }

            let mut cur = *head;
            let mut steps = 0usize;
            while let Some(id) = cur {
                if !self.heap.contains(id) || steps >= self.heap.len() {
                    error!(
                        "Hash table cell {} has a broken chain at {} (partition {})",
                        cell, id, self.index
                    );
                    problems += 1;
                    break;
                }
                let node = self.heap.get(id);
                let expected = self.layout.cell_of(node.fold);
                if expected != cell {
                    error!(
                        "Hash table node fold {}, cell {} should be in cell {} (data {})",
                        node.fold, cell, expected, node.data
                    );
                    problems += 1;
                }
                steps += 1;
                cur = node.next;
            }
        }

        problems
    }

    // =========================================================================
    // Mutating operations
    // =========================================================================

    /// Inserts `fold -> data`, or repoints the existing node for `fold`.
    ///
    /// Returns `Ok(false)` if a search heap has no room for a new node or a
    /// checked invariant fails under the log policy. `data` must be a record
    /// position on `block`'s page.
    pub fn insert_for_fold(
        &mut self,
        fold: u64,
        block: &Arc<BufferBlock>,
        data: RecordRef,
    ) -> Result<bool> {
        if !data.is_record_position() {
            return Err(ZyronError::InvalidRecord {
                page_id: data.page_id.as_u64(),
                offset: data.offset,
            });
        }
        if !check_invariant(self.policy, block.holds(data.page_id), || {
            format!("record {} is not on the page of {:?}", data, block)
        }) {
            return Ok(false);
        }
        if !self.check_can_modify(fold) || !self.check_enabled("insert") {
            return Ok(false);
        }

        let mut last = None;
        let mut cur = self.chain_first(fold);
        while let Some(id) = cur {
            if self.heap.get(id).fold == fold {
                self.repoint(id, block, data);
                return Ok(true);
            }
            last = Some(id);
            cur = self.heap.get(id).next;
        }

        let node = HashNode {
            fold,
            data,
            block: self.adaptive.then(|| Arc::clone(block)),
            next: None,
        };
        let Some(id) = self.heap.alloc(node)? else {
            self.stats.insert_failed();
            trace!("Hash node heap full, fold {} not cached", fold);
            return Ok(false);
        };

        match last {
            Some(tail) => self.heap.get_mut(tail).next = Some(id),
            None => {
                let slot = self.slot_of(fold);
                self.cells[slot] = Some(id);
            }
        }

        if self.adaptive {
            self.pointer_added(block);
        }
        self.stats.row_added();
        Ok(true)
    }

    /// Repoints the node with `fold` and `data` to `new_data` on `new_block`.
    ///
    /// Returns false if no such node exists or the index is disabled.
    pub fn search_and_update_if_found(
        &mut self,
        fold: u64,
        data: RecordRef,
        new_block: &Arc<BufferBlock>,
        new_data: RecordRef,
    ) -> bool {
        if !self.check_can_modify(fold) {
            return false;
        }
        if !check_invariant(
            self.policy,
            new_data.is_record_position() && new_block.holds(new_data.page_id),
            || format!("record {} is not on the page of {:?}", new_data, new_block),
        ) {
            return false;
        }
        if !self.switch.is_enabled() {
            return false;
        }

        match self.search_with_data(fold, data) {
            Some(id) => {
                self.repoint(id, new_block, new_data);
                true
            }
            None => false,
        }
    }

    /// Deletes the node with `fold` and `data`, if present.
    pub fn search_and_delete_if_found(&mut self, fold: u64, data: RecordRef) -> bool {
        if !self.check_can_modify(fold) || !self.check_enabled("delete") {
            return false;
        }
        match self.search_with_data(fold, data) {
            Some(id) => self.remove_node(id),
            None => false,
        }
    }

    /// Deletes the node `id`.
    ///
    /// The heap is compacted, so every `NodeId` of this partition obtained
    /// before the call may be invalid afterwards.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        if !self.check_enabled("delete") {
            return false;
        }
        let owned = self.node(id).is_some_and(|node| self.owns(node.fold));
        if !check_invariant(self.policy, owned, || {
            format!("{} is not a node of partition {}", id, self.index)
        }) {
            return false;
        }
        self.remove_node(id)
    }

    /// Removes every node in `fold`'s chain whose data lies on `page_id`.
    pub fn remove_all_nodes_to_page(&mut self, fold: u64, page_id: PageId) {
        if !self.check_can_modify(fold) || !self.check_enabled("remove") {
            return;
        }

        let mut cur = self.chain_first(fold);
        while let Some(id) = cur {
            if self.heap.get(id).data.page_id == page_id {
                if !self.remove_node(id) {
                    break;
                }
                // Deletion compacts the heap; restart from the chain head.
                cur = self.chain_first(fold);
            } else {
                cur = self.heap.get(id).next;
            }
        }

        if cfg!(debug_assertions) {
            let leftover = self.chain(fold).any(|(_, node)| node.data.page_id == page_id);
            check_invariant(self.policy, !leftover, || {
                format!("chain of fold {} still points to page {}", fold, page_id)
            });
        }
    }

    /// Returns the data for `fold` if its page is still resident.
    ///
    /// An entry whose page has left the buffer pool is deleted and None is
    /// returned, so the caller falls back to a regular index search.
    pub fn search_live(&mut self, fold: u64, residency: &dyn PageResidency) -> Option<RecordRef> {
        let id = self.search_node(fold)?;
        let data = self.heap.get(id).data;
        if residency.is_resident(data.page_id) {
            return Some(data);
        }

        if self.switch.is_enabled() {
            debug!("Dropping stale hash entry fold {} -> {}", fold, data);
            self.remove_node(id);
        }
        None
    }

    /// Drops every node and resets the cells.
    pub(crate) fn empty(&mut self) {
        if self.adaptive {
            for node in self.heap.iter() {
                if let Some(block) = &node.block {
                    self.pointer_removed(block, node.data);
                }
            }
        }
        self.heap.free_all();
        self.cells.fill(None);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_can_modify(&self, fold: u64) -> bool {
        check_invariant(self.policy, self.owns(fold), || {
            format!(
                "fold {} belongs to partition {}, latched partition is {}",
                fold,
                self.layout.partition_of(fold),
                self.index
            )
        })
    }

    fn check_enabled(&self, op: &str) -> bool {
        check_invariant(self.policy, self.switch.is_enabled(), || {
            format!("{} on disabled adaptive hash index", op)
        })
    }

    /// Points node `id` at `data` on `block`, moving the pointer count.
    fn repoint(&mut self, id: NodeId, block: &Arc<BufferBlock>, data: RecordRef) {
        if self.adaptive {
            let prev = self.heap.get_mut(id).block.replace(Arc::clone(block));
            let prev_data = self.heap.get(id).data;
            if let Some(prev) = prev {
                self.pointer_removed(&prev, prev_data);
            }
            self.pointer_added(block);
        }
        self.heap.get_mut(id).data = data;
        self.stats.row_updated();
    }

    fn pointer_added(&self, block: &BufferBlock) {
        let count = block.inc_ahi_pointers();
        check_invariant(self.policy, count < MAX_N_POINTERS, || {
            format!("{:?} has {} hash pointers", block, count)
        });
    }

    fn pointer_removed(&self, block: &BufferBlock, data: RecordRef) {
        check_invariant(self.policy, block.holds(data.page_id), || {
            format!("record {} is not on the page of {:?}", data, block)
        });
        let count = block.dec_ahi_pointers();
        check_invariant(
            self.policy,
            count.is_some_and(|c| c < MAX_N_POINTERS),
            || format!("{:?} hash pointer count underflow", block),
        );
    }

    /// Finds whatever points at `id`.
    fn find_link(&self, id: NodeId) -> Option<Link> {
        let slot = self.slot_of(self.heap.get(id).fold);
        let mut cur = self.cells[slot];
        if cur == Some(id) {
            return Some(Link::Cell(slot));
        }
        while let Some(prev) = cur {
            let next = self.heap.get(prev).next;
            if next == Some(id) {
                return Some(Link::Node(prev));
            }
            cur = next;
        }
        None
    }

    fn set_link(&mut self, link: Link, target: Option<NodeId>) {
        match link {
            Link::Cell(slot) => self.cells[slot] = target,
            Link::Node(prev) => self.heap.get_mut(prev).next = target,
        }
    }

    /// Unlinks `id`, compacts the heap and updates counters.
    ///
    /// Does not consult the switch: bulk removal and stale-entry drops must
    /// make progress once started.
    fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(link) = self.find_link(id) else {
            check_invariant(self.policy, false, || {
                format!("{} is not reachable from its cell", id)
            });
            return false;
        };
        let next = self.heap.get(id).next;
        self.set_link(link, next);

        // Relocate the top node into the hole.
        if let Some(top) = self.heap.top().filter(|&top| top != id) {
            match self.find_link(top) {
                Some(top_link) => self.set_link(top_link, Some(id)),
                None => {
                    check_invariant(self.policy, false, || {
                        format!("{} is not reachable from its cell", top)
                    });
                }
            }
        }

        let removed = self.heap.free_and_compact(id);
        if self.adaptive {
            if let Some(block) = &removed.block {
                self.pointer_removed(block, removed.data);
            }
        }
        self.stats.row_removed();
        true
    }
}

/// Iterator over the nodes of one chain.
pub struct Chain<'a> {
    partition: &'a Partition,
    next: Option<NodeId>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = (NodeId, &'a HashNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.partition.node(id)?;
        self.next = node.next;
        Some((id, node))
    }
}
