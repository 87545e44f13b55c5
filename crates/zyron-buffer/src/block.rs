//! Buffer block bookkeeping shared with the adaptive hash index.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use zyron_common::page::PageId;

/// Sentinel value indicating no page is loaded in the block.
const NO_PAGE: u64 = u64::MAX;

/// Sentinel value indicating no index has hash entries on the block.
const NO_INDEX: u64 = u64::MAX;

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: FrameId = FrameId(u32::MAX);

    /// Returns true if this is a valid frame ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// Control block of one buffered page, as seen by the adaptive hash index.
///
/// The hash index never owns pages. It only keeps an `Arc<BufferBlock>` next
/// to each chain node so it can count how many nodes point into the page and
/// check that a record really lies on the block's page.
pub struct BufferBlock {
    /// Frame identifier.
    frame_id: FrameId,
    /// The page currently stored in this block (packed as u64, NO_PAGE = none).
    page_id: AtomicU64,
    /// Number of hash index nodes pointing into this page.
    ahi_pointers: AtomicU32,
    /// Index whose hash entries point into this page (NO_INDEX = none).
    ahi_index: AtomicU64,
}

impl BufferBlock {
    /// Creates a new empty block.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU64::new(NO_PAGE),
            ahi_pointers: AtomicU32::new(0),
            ahi_index: AtomicU64::new(NO_INDEX),
        }
    }

    /// Creates a block that already holds `page_id`.
    pub fn with_page(frame_id: FrameId, page_id: PageId) -> Self {
        let block = Self::new(frame_id);
        block.set_page_id(Some(page_id));
        block
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page ID currently stored in this block.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        let packed = self.page_id.load(Ordering::Acquire);
        if packed == NO_PAGE {
            None
        } else {
            Some(PageId::from_u64(packed))
        }
    }

    /// Sets the page ID for this block.
    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        let packed = match page_id {
            Some(pid) => pid.as_u64(),
            None => NO_PAGE,
        };
        self.page_id.store(packed, Ordering::Release);
    }

    /// Returns true if the record page `page_id` is the page held by this block.
    #[inline]
    pub fn holds(&self, page_id: PageId) -> bool {
        self.page_id.load(Ordering::Acquire) == page_id.as_u64()
    }

    /// Returns true if this block is empty (no page loaded).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id.load(Ordering::Acquire) == NO_PAGE
    }

    /// Returns the number of hash index nodes pointing into this page.
    #[inline]
    pub fn ahi_pointers(&self) -> u32 {
        self.ahi_pointers.load(Ordering::Acquire)
    }

    /// Increments the hash pointer count and returns the new count.
    #[inline]
    pub fn inc_ahi_pointers(&self) -> u32 {
        self.ahi_pointers.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Decrements the hash pointer count and returns the new count.
    ///
    /// Returns None if the count was already zero; the count stays at zero.
    #[inline]
    pub fn dec_ahi_pointers(&self) -> Option<u32> {
        let prev = self.ahi_pointers.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            self.ahi_pointers.store(0, Ordering::Release);
            return None;
        }
        Some(prev - 1)
    }

    /// Returns the index whose hash entries point into this page.
    #[inline]
    pub fn ahi_index(&self) -> Option<u64> {
        let id = self.ahi_index.load(Ordering::Acquire);
        (id != NO_INDEX).then_some(id)
    }

    /// Records which index has hash entries on this page.
    #[inline]
    pub fn set_ahi_index(&self, index_id: Option<u64>) {
        self.ahi_index
            .store(index_id.unwrap_or(NO_INDEX), Ordering::Release);
    }

    /// Resets the block to empty state.
    #[inline]
    pub fn reset(&self) {
        self.page_id.store(NO_PAGE, Ordering::Release);
        self.ahi_pointers.store(0, Ordering::Release);
        self.ahi_index.store(NO_INDEX, Ordering::Release);
    }
}

impl std::fmt::Debug for BufferBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferBlock")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id())
            .field("ahi_pointers", &self.ahi_pointers())
            .field("ahi_index", &self.ahi_index())
            .finish()
    }
}
