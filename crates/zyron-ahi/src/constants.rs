//! Adaptive hash index constants.

use zyron_common::page::{MAX_RECORDS_PER_PAGE, PAGE_SIZE};

/// Ceiling for the hash pointer count of one block. Reaching it means a
/// pointer was counted twice.
pub const MAX_N_POINTERS: u32 = MAX_RECORDS_PER_PAGE as u32;

// Node heap sizing

/// Largest allocation a heap may carve out of one buffer page.
pub(crate) const MEM_MAX_ALLOC_IN_BUF: usize = PAGE_SIZE - 200;

/// Bookkeeping bytes at the start of every heap block.
pub(crate) const MEM_BLOCK_HEADER_SIZE: usize = 64;

/// Upper bound on the heap block size for search-index heaps.
pub(crate) const HEAP_BLOCK_CAP: usize = 4096;

/// Heap block size: min(4096, 16184 / 2 - 64) = 4096 bytes.
pub(crate) const HEAP_BLOCK_SIZE: usize = {
    let fit = MEM_MAX_ALLOC_IN_BUF / 2 - MEM_BLOCK_HEADER_SIZE;
    if HEAP_BLOCK_CAP < fit { HEAP_BLOCK_CAP } else { fit }
};

/// Accounted size of one chain node: fold, next, block, data (4 x 8 bytes).
pub(crate) const HEAP_NODE_SIZE: usize = 32;

/// Nodes per heap block: 4096 / 32 = 128.
pub(crate) const NODES_PER_BLOCK: usize = HEAP_BLOCK_SIZE / HEAP_NODE_SIZE;
