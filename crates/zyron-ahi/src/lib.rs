//! Adaptive hash index for ZyronDB.
//!
//! A hash table with external chaining that maps a fold (hash of an index
//! key prefix) to a record inside a buffered page. It provides:
//! - Prime-sized cell arrays with chains stored in a compacting node heap
//! - Optional partitioned reader/writer latches over disjoint cell sets
//! - Guard-based access: every operation runs under a latch the caller holds
//! - A global enable switch and an adaptive search system of several parts
//!
//! Entries are weak references. The buffer pool owns pages, and the index
//! must be told (via `remove_all_nodes_to_page` or `drop_page`) before a page
//! leaves memory, or callers must use `search_live`.

mod cells;
mod constants;
mod heap;
mod invariant;
mod partition;
mod search_sys;
mod switch;
mod table;
mod types;

pub use cells::find_prime;
pub use constants::MAX_N_POINTERS;
pub use partition::{Chain, Partition};
pub use search_sys::AdaptiveHashIndex;
pub use switch::SearchSwitch;
pub use table::{
    HashTable, HashTableOptions, PartitionReadGuard, PartitionWriteGuard, TableReadGuard,
    TableWriteGuard,
};
pub use types::{
    HashNode, HashTableInfo, HashTableStats, HashTableStatsSnapshot, HeapPurpose, LatchId,
    NodeId, SyncMode,
};
