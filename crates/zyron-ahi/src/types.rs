//! Adaptive hash index types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use zyron_buffer::BufferBlock;
use zyron_common::page::RecordRef;
use zyron_common::{Result, ZyronError};

/// What a hash table's node heap is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeapPurpose {
    /// Adaptive search cache. Allocation may fail softly when the heap is full.
    BtrSearch,
    /// Page container map. Allocation failure is a real out-of-memory.
    PageHash,
}

impl FromStr for HeapPurpose {
    type Err = ZyronError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "btr_search" => Ok(HeapPurpose::BtrSearch),
            "page_hash" => Ok(HeapPurpose::PageHash),
            other => Err(ZyronError::ConfigError(format!(
                "unknown heap purpose: {}",
                other
            ))),
        }
    }
}

/// Instrumentation tag for the latches of a hash table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatchId {
    /// Latch of an adaptive hash index part.
    AhiSearch,
    /// Latch protecting a buffer pool page hash partition.
    BufPageHash,
}

impl std::fmt::Display for LatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LatchId::AhiSearch => write!(f, "ahi_search"),
            LatchId::BufPageHash => write!(f, "buf_page_hash"),
        }
    }
}

/// How a hash table is synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// One latch for the whole table, supplied by the caller's protocol.
    None,
    /// An array of reader/writer latches over disjoint cell partitions.
    RwLock,
}

/// Index of a node slot in a partition's node heap.
///
/// Deleting any node of the partition may relocate another node, so ids are
/// only valid until the next delete under the same latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the slot index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// One cached association `fold -> record`.
#[derive(Debug, Clone)]
pub struct HashNode {
    pub(crate) fold: u64,
    pub(crate) data: RecordRef,
    /// Block holding the record page. Only kept by adaptive tables.
    pub(crate) block: Option<Arc<BufferBlock>>,
    pub(crate) next: Option<NodeId>,
}

impl HashNode {
    /// Returns the fold value.
    #[inline]
    pub fn fold(&self) -> u64 {
        self.fold
    }

    /// Returns the record this node points to.
    #[inline]
    pub fn data(&self) -> RecordRef {
        self.data
    }

    /// Returns the block bookkept for this node, if any.
    #[inline]
    pub fn block(&self) -> Option<&Arc<BufferBlock>> {
        self.block.as_ref()
    }

    /// Returns the next node in the chain.
    #[inline]
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

/// Aggregate shape of a hash table, as reported by `print_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTableInfo {
    /// Number of cells.
    pub n_cells: usize,
    /// Number of non-empty cells.
    pub used_cells: usize,
    /// Heap blocks in use, if the table owns a node heap.
    pub heap_blocks: Option<usize>,
}

impl std::fmt::Display for HashTableInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Hash table size {}, used cells {}",
            self.n_cells, self.used_cells
        )?;
        if let Some(blocks) = self.heap_blocks {
            write!(f, ", node heap has {} buffer(s)", blocks)?;
        }
        Ok(())
    }
}

/// Row counters of one hash table.
#[derive(Debug, Default)]
pub struct HashTableStats {
    rows_added: AtomicU64,
    rows_updated: AtomicU64,
    rows_removed: AtomicU64,
    insert_failures: AtomicU64,
}

impl HashTableStats {
    #[inline]
    pub(crate) fn row_added(&self) {
        self.rows_added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn row_updated(&self) {
        self.rows_updated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn row_removed(&self) {
        self.rows_removed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn insert_failed(&self) {
        self.insert_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> HashTableStatsSnapshot {
        HashTableStatsSnapshot {
            rows_added: self.rows_added.load(Ordering::Relaxed),
            rows_updated: self.rows_updated.load(Ordering::Relaxed),
            rows_removed: self.rows_removed.load(Ordering::Relaxed),
            insert_failures: self.insert_failures.load(Ordering::Relaxed),
        }
    }
}

/// Copy of a table's row counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashTableStatsSnapshot {
    /// Nodes created by inserts.
    pub rows_added: u64,
    /// Nodes repointed by inserts or updates.
    pub rows_updated: u64,
    /// Nodes deleted.
    pub rows_removed: u64,
    /// Inserts refused because the heap was full.
    pub insert_failures: u64,
}

impl std::ops::Add for HashTableStatsSnapshot {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            rows_added: self.rows_added + other.rows_added,
            rows_updated: self.rows_updated + other.rows_updated,
            rows_removed: self.rows_removed + other.rows_removed,
            insert_failures: self.insert_failures + other.insert_failures,
        }
    }
}
