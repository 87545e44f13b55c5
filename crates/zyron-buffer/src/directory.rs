//! Directory of resident buffer blocks.

use crate::block::{BufferBlock, FrameId};
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use zyron_common::page::PageId;
use zyron_common::{Result, ZyronError};

/// Answers whether a page is currently resident in the buffer pool.
///
/// Hash index entries are weak references into pages; a reader that wants
/// to follow one checks residency first.
pub trait PageResidency: Send + Sync {
    /// Returns true if `page_id` is loaded.
    fn is_resident(&self, page_id: PageId) -> bool;
}

/// Maps resident pages to their blocks.
///
/// Evicting a page detaches its block from the directory. Hash index nodes
/// that still hold the old `Arc<BufferBlock>` keep seeing the old page id,
/// while a later load of any page into the same frame gets a fresh block.
pub struct BlockDirectory {
    /// Page ID to block mapping.
    blocks: RwLock<HashMap<PageId, Arc<BufferBlock>>>,
    /// List of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,
    /// Total number of frames.
    num_frames: usize,
}

impl BlockDirectory {
    /// Creates a directory with `num_frames` free frames.
    pub fn new(num_frames: usize) -> Self {
        // Pop order hands out frame 0 first
        let free_list: Vec<_> = (0..num_frames).rev().map(|i| FrameId(i as u32)).collect();

        Self {
            blocks: RwLock::new(HashMap::with_capacity(num_frames)),
            free_list: Mutex::new(free_list),
            num_frames,
        }
    }

    /// Returns the number of frames.
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Returns the number of resident pages.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    /// Returns true if no page is resident.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Loads a page into a free frame.
    ///
    /// If the page is already resident, returns its existing block.
    pub fn load(&self, page_id: PageId) -> Result<Arc<BufferBlock>> {
        let mut blocks = self.blocks.write();
        if let Some(block) = blocks.get(&page_id) {
            return Ok(Arc::clone(block));
        }

        let frame_id = self
            .free_list
            .lock()
            .pop()
            .ok_or(ZyronError::BufferPoolFull)?;

        let block = Arc::new(BufferBlock::with_page(frame_id, page_id));
        blocks.insert(page_id, Arc::clone(&block));
        debug!("Loaded page {} into {}", page_id, frame_id);
        Ok(block)
    }

    /// Returns the block holding `page_id`, if resident.
    pub fn get(&self, page_id: PageId) -> Option<Arc<BufferBlock>> {
        self.blocks.read().get(&page_id).cloned()
    }

    /// Removes a page from the directory and frees its frame.
    ///
    /// Hash index entries pointing into the page must be dropped before this
    /// call; entries left behind become stale and are only caught by a
    /// residency check.
    pub fn evict(&self, page_id: PageId) -> Option<Arc<BufferBlock>> {
        let block = self.blocks.write().remove(&page_id)?;
        self.free_list.lock().push(block.frame_id());
        debug!(
            "Evicted page {} from {} with {} hash pointer(s) left",
            page_id,
            block.frame_id(),
            block.ahi_pointers()
        );
        Some(block)
    }
}

impl PageResidency for BlockDirectory {
    fn is_resident(&self, page_id: PageId) -> bool {
        self.blocks.read().contains_key(&page_id)
    }
}
