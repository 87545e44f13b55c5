//! Hash table with external chaining and partitioned latches.

use crate::cells::{CellLayout, find_prime};
use crate::heap::NodeHeap;
use crate::partition::Partition;
use crate::switch::SearchSwitch;
use crate::types::{
    HashTableInfo, HashTableStats, HashTableStatsSnapshot, HeapPurpose, LatchId, SyncMode,
};
use log::{debug, error};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::io::Write;
use std::sync::Arc;
use zyron_common::page::{PageId, RecordRef};
use zyron_common::{InvariantPolicy, Result, ZyronError};

/// Shared latch on one partition.
pub type PartitionReadGuard<'a> = RwLockReadGuard<'a, Partition>;

/// Exclusive latch on one partition.
pub type PartitionWriteGuard<'a> = RwLockWriteGuard<'a, Partition>;

/// Creation parameters of a [`HashTable`].
#[derive(Debug, Clone)]
pub struct HashTableOptions {
    /// Requested number of cells, rounded up to a prime.
    pub n_cells: usize,
    /// Instrumentation tag of the latches.
    pub latch_id: LatchId,
    /// Number of latch partitions; 0 for a table protected by one outside latch.
    pub n_sync_obj: usize,
    /// Heap purpose.
    pub purpose: HeapPurpose,
    /// Node budget of the heap of a non-partitioned table.
    pub node_budget: Option<usize>,
    /// Keep block references and pointer counters on nodes.
    pub adaptive: bool,
    /// What to do when an invariant check fails.
    pub policy: InvariantPolicy,
}

impl Default for HashTableOptions {
    fn default() -> Self {
        Self {
            n_cells: 1,
            latch_id: LatchId::AhiSearch,
            n_sync_obj: 0,
            purpose: HeapPurpose::BtrSearch,
            node_budget: None,
            adaptive: false,
            policy: InvariantPolicy::default(),
        }
    }
}

/// Hash table mapping folds to record references.
///
/// Operations are methods of the partition guards returned by [`s_lock`],
/// [`x_lock`], [`s_lock_all`] and [`x_lock_all`]. Several operations can run
/// under one latch hold.
///
/// [`s_lock`]: HashTable::s_lock
/// [`x_lock`]: HashTable::x_lock
/// [`s_lock_all`]: HashTable::s_lock_all
/// [`x_lock_all`]: HashTable::x_lock_all
pub struct HashTable {
    layout: CellLayout,
    latch_id: LatchId,
    sync_mode: SyncMode,
    purpose: HeapPurpose,
    adaptive: bool,
    policy: InvariantPolicy,
    /// A single heap is attached to the table itself (non-partitioned tables).
    has_heap: bool,
    /// Node budget of that heap.
    node_budget: Option<usize>,
    switch: Arc<SearchSwitch>,
    stats: Arc<HashTableStats>,
    partitions: Box<[RwLock<Partition>]>,
}

impl HashTable {
    /// Creates a table of at least `n_cells` cells.
    ///
    /// `n_sync_obj` is 0 for a table protected by a latch the caller owns, or
    /// a power of two for a page hash table with its own partition latches.
    pub fn create(
        n_cells: usize,
        latch_id: LatchId,
        n_sync_obj: usize,
        purpose: HeapPurpose,
        switch: Arc<SearchSwitch>,
    ) -> Result<Self> {
        Self::with_options(
            HashTableOptions {
                n_cells,
                latch_id,
                n_sync_obj,
                purpose,
                ..HashTableOptions::default()
            },
            switch,
        )
    }

    /// Creates a table from explicit options.
    pub fn with_options(options: HashTableOptions, switch: Arc<SearchSwitch>) -> Result<Self> {
        let n_sync_obj = options.n_sync_obj;
        if n_sync_obj != 0 && !n_sync_obj.is_power_of_two() {
            return Err(ZyronError::invalid_parameter("n_sync_obj", n_sync_obj));
        }
        if n_sync_obj > 0 && options.purpose != HeapPurpose::PageHash {
            return Err(ZyronError::invalid_parameter(
                "purpose",
                format!("{:?} with {} partitions", options.purpose, n_sync_obj),
            ));
        }

        let n_cells = find_prime(options.n_cells.max(1));
        if n_sync_obj > n_cells {
            return Err(ZyronError::invalid_parameter("n_sync_obj", n_sync_obj));
        }

        let (sync_mode, n_parts, budget) = if n_sync_obj == 0 {
            (SyncMode::None, 1, options.node_budget)
        } else {
            (SyncMode::RwLock, n_sync_obj, None)
        };

        let layout = CellLayout::new(n_cells, n_parts);
        let stats = Arc::new(HashTableStats::default());
        let partitions = (0..n_parts)
            .map(|i| {
                RwLock::new(Partition::new(
                    i,
                    layout,
                    options.policy,
                    options.adaptive,
                    Arc::clone(&switch),
                    Arc::clone(&stats),
                    NodeHeap::new(options.purpose, budget),
                ))
            })
            .collect();

        debug!(
            "Created hash table: {} cells, {} partition(s), latch {}, {:?}",
            n_cells, n_parts, options.latch_id, options.purpose
        );

        Ok(Self {
            layout,
            latch_id: options.latch_id,
            sync_mode,
            purpose: options.purpose,
            adaptive: options.adaptive,
            policy: options.policy,
            has_heap: n_sync_obj == 0,
            node_budget: budget,
            switch,
            stats,
            partitions,
        })
    }

    /// Returns the number of cells.
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.layout.n_cells()
    }

    /// Returns the number of latch partitions, 0 when unpartitioned.
    #[inline]
    pub fn n_sync_obj(&self) -> usize {
        match self.sync_mode {
            SyncMode::None => 0,
            SyncMode::RwLock => self.layout.n_parts(),
        }
    }

    #[inline]
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    #[inline]
    pub fn latch_id(&self) -> LatchId {
        self.latch_id
    }

    #[inline]
    pub fn purpose(&self) -> HeapPurpose {
        self.purpose
    }

    /// Returns true if nodes track their buffer block.
    #[inline]
    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    #[inline]
    pub fn has_heap(&self) -> bool {
        self.has_heap
    }

    #[inline]
    pub fn policy(&self) -> InvariantPolicy {
        self.policy
    }

    #[inline]
    pub fn switch(&self) -> &Arc<SearchSwitch> {
        &self.switch
    }

    /// Returns the cell index of `fold`.
    #[inline]
    pub fn cell_of(&self, fold: u64) -> usize {
        self.layout.cell_of(fold)
    }

    /// Returns the partition whose latch covers `fold`.
    #[inline]
    pub fn partition_of(&self, fold: u64) -> usize {
        self.layout.partition_of(fold)
    }

    /// Takes the shared latch covering `fold`.
    pub fn s_lock(&self, fold: u64) -> PartitionReadGuard<'_> {
        self.partitions[self.partition_of(fold)].read()
    }

    /// Takes the exclusive latch covering `fold`.
    pub fn x_lock(&self, fold: u64) -> PartitionWriteGuard<'_> {
        self.partitions[self.partition_of(fold)].write()
    }

    /// Takes every shared latch, in partition order.
    pub fn s_lock_all(&self) -> TableReadGuard<'_> {
        TableReadGuard {
            table: self,
            parts: self.partitions.iter().map(|p| p.read()).collect(),
        }
    }

    /// Takes every exclusive latch, in partition order.
    pub fn x_lock_all(&self) -> TableWriteGuard<'_> {
        TableWriteGuard {
            table: self,
            parts: self.partitions.iter().map(|p| p.write()).collect(),
        }
    }

    /// Empties the table and drops its partition latches.
    ///
    /// Afterwards the table has a single partition and sync mode `None`.
    pub fn clear(&mut self) {
        for part in self.partitions.iter_mut() {
            part.get_mut().empty();
        }

        let layout = CellLayout::new(self.layout.n_cells(), 1);
        let part = Partition::new(
            0,
            layout,
            self.policy,
            self.adaptive,
            Arc::clone(&self.switch),
            Arc::clone(&self.stats),
            NodeHeap::new(self.purpose, self.node_budget),
        );

        debug!(
            "Cleared hash table: {} cells, {} partition(s) released",
            layout.n_cells(),
            self.partitions.len()
        );

        self.layout = layout;
        self.sync_mode = SyncMode::None;
        self.partitions = vec![RwLock::new(part)].into_boxed_slice();
    }

    /// Returns the table's row counters.
    pub fn stats(&self) -> HashTableStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for HashTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashTable")
            .field("n_cells", &self.n_cells())
            .field("n_sync_obj", &self.n_sync_obj())
            .field("latch_id", &self.latch_id)
            .field("purpose", &self.purpose)
            .field("adaptive", &self.adaptive)
            .finish()
    }
}

/// Shared latches on every partition of a table.
pub struct TableReadGuard<'a> {
    table: &'a HashTable,
    parts: Vec<PartitionReadGuard<'a>>,
}

impl<'a> TableReadGuard<'a> {
    /// Returns the partition covering `fold`.
    pub fn partition(&self, fold: u64) -> &Partition {
        &self.parts[self.table.partition_of(fold)]
    }

    /// Returns the data of the node with `fold`, if any.
    pub fn search_and_get_data(&self, fold: u64) -> Option<RecordRef> {
        self.partition(fold).search_and_get_data(fold)
    }

    /// Checks that every node of cells `start..=end` is chained from the
    /// cell its fold hashes to.
    ///
    /// Every mismatch is logged; the scan does not stop at the first one.
    pub fn validate(&self, start: usize, end: usize) -> Result<bool> {
        Ok(self.scan(start, end)? == 0)
    }

    /// Like [`validate`](Self::validate), but reports a failed scan as
    /// `HashTableCorrupted`.
    pub fn check(&self, start: usize, end: usize) -> Result<()> {
        match self.scan(start, end)? {
            0 => Ok(()),
            problems => Err(ZyronError::HashTableCorrupted(format!(
                "{} problem(s) in cells {}..={}",
                problems, start, end
            ))),
        }
    }

    fn scan(&self, start: usize, end: usize) -> Result<usize> {
        let n_cells = self.table.n_cells();
        if start > end || end >= n_cells {
            return Err(ZyronError::invalid_parameter(
                "cell range",
                format!("{}..={} of {} cells", start, end, n_cells),
            ));
        }

        let problems: usize = self
            .parts
            .iter()
            .map(|part| part.validate_range(start, end))
            .sum();
        if problems > 0 {
            error!(
                "Hash table validation failed for cells {}..={}: {} problem(s)",
                start, end, problems
            );
        }
        Ok(problems)
    }

    /// Returns the table's size and occupancy.
    pub fn info(&self) -> HashTableInfo {
        HashTableInfo {
            n_cells: self.table.n_cells(),
            used_cells: self.parts.iter().map(|p| p.used_cells()).sum(),
            heap_blocks: self
                .table
                .has_heap()
                .then(|| self.parts.iter().map(|p| p.heap_blocks()).sum()),
        }
    }

    /// Writes the table's size and occupancy line.
    pub fn print_info(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "{}", self.info())?;
        Ok(())
    }

    /// Returns the number of nodes whose data lies on `page_id`.
    pub fn count_pointers_to(&self, page_id: PageId) -> usize {
        self.parts.iter().map(|p| p.count_pointers_to(page_id)).sum()
    }

    /// Returns the number of nodes in the table.
    pub fn node_count(&self) -> usize {
        self.parts.iter().map(|p| p.node_count()).sum()
    }
}

/// Exclusive latches on every partition of a table.
pub struct TableWriteGuard<'a> {
    table: &'a HashTable,
    parts: Vec<PartitionWriteGuard<'a>>,
}

impl<'a> TableWriteGuard<'a> {
    /// Returns the partition covering `fold`.
    pub fn partition(&self, fold: u64) -> &Partition {
        &self.parts[self.table.partition_of(fold)]
    }

    /// Returns the partition covering `fold` for modification.
    pub fn partition_mut(&mut self, fold: u64) -> &mut Partition {
        let i = self.table.partition_of(fold);
        &mut self.parts[i]
    }

    /// Drops every node of every partition.
    pub fn empty(&mut self) {
        for part in self.parts.iter_mut() {
            part.empty();
        }
    }

    /// Returns the number of nodes in the table.
    pub fn node_count(&self) -> usize {
        self.parts.iter().map(|p| p.node_count()).sum()
    }
}
