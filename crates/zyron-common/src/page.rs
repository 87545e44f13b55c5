//! Page and record addressing for ZyronDB storage.

use serde::{Deserialize, Serialize};

/// Default page size in bytes (16 KB).
pub const PAGE_SIZE: usize = 16 * 1024;

/// Size of the header at the start of every page. No record starts inside it.
pub const PAGE_HEADER_SIZE: usize = 32;

/// Minimum per-record overhead (extra bytes of a compact record header).
pub const REC_N_NEW_EXTRA_BYTES: usize = 5;

/// Upper bound on the number of records a single page can hold, and therefore
/// on the number of hash index pointers into one page.
pub const MAX_RECORDS_PER_PAGE: usize = PAGE_SIZE / REC_N_NEW_EXTRA_BYTES;

/// Unique identifier for a page within a file.
///
/// PageId consists of a file ID and page number within that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    /// File identifier (0 = data file, 1+ = index files).
    pub file_id: u32,
    /// Page number within the file (0-indexed).
    pub page_num: u32,
}

impl PageId {
    /// Creates a new PageId.
    pub fn new(file_id: u32, page_num: u32) -> Self {
        Self { file_id, page_num }
    }

    /// Returns the PageId as a single u64 for compact storage.
    pub fn as_u64(&self) -> u64 {
        ((self.file_id as u64) << 32) | (self.page_num as u64)
    }

    /// Creates a PageId from a u64 representation.
    pub fn from_u64(value: u64) -> Self {
        Self {
            file_id: (value >> 32) as u32,
            page_num: value as u32,
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_num)
    }
}

/// Non-owning reference to a record inside a buffered page.
///
/// The page's lifetime belongs to the buffer pool. Holding a `RecordRef` does
/// not keep the page resident; check residency before reading through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    /// Page that contains the record.
    pub page_id: PageId,
    /// Byte offset of the record origin within the page.
    pub offset: u16,
}

impl RecordRef {
    /// Creates a new record reference. No validation is performed.
    pub fn new(page_id: PageId, offset: u16) -> Self {
        Self { page_id, offset }
    }

    /// Returns true if the offset can be a record origin, i.e. it lies past the
    /// page header and inside the page. Anything else plays the role of a
    /// null record pointer.
    #[inline]
    pub fn is_record_position(&self) -> bool {
        let offset = self.offset as usize;
        offset >= PAGE_HEADER_SIZE && offset < PAGE_SIZE
    }

    /// Returns the page this record belongs to.
    #[inline]
    pub fn page_align(&self) -> PageId {
        self.page_id
    }
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.page_id, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_constant() {
        assert_eq!(PAGE_SIZE, 16 * 1024);
        assert_eq!(PAGE_SIZE, 16384);
    }

    #[test]
    fn test_max_records_per_page() {
        assert_eq!(MAX_RECORDS_PER_PAGE, 3276);
    }

    #[test]
    fn test_page_id_roundtrip() {
        let page_id = PageId::new(42, 1000);
        let recovered = PageId::from_u64(page_id.as_u64());
        assert_eq!(page_id, recovered);
    }

    #[test]
    fn test_page_id_roundtrip_edge_cases() {
        let page_id = PageId::new(0, 0);
        assert_eq!(page_id, PageId::from_u64(page_id.as_u64()));

        let page_id = PageId::new(u32::MAX, u32::MAX);
        assert_eq!(page_id, PageId::from_u64(page_id.as_u64()));

        let page_id = PageId::new(u32::MAX, 0);
        assert_eq!(page_id, PageId::from_u64(page_id.as_u64()));
    }

    #[test]
    fn test_page_id_as_u64_bit_layout() {
        let page_id = PageId::new(1, 2);
        assert_eq!(page_id.as_u64(), (1u64 << 32) | 2);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId::new(5, 123).to_string(), "5:123");
    }

    #[test]
    fn test_record_position_bounds() {
        let page_id = PageId::new(0, 1);

        assert!(!RecordRef::new(page_id, 0).is_record_position());
        assert!(!RecordRef::new(page_id, (PAGE_HEADER_SIZE - 1) as u16).is_record_position());
        assert!(RecordRef::new(page_id, PAGE_HEADER_SIZE as u16).is_record_position());
        assert!(RecordRef::new(page_id, (PAGE_SIZE - 1) as u16).is_record_position());
    }

    #[test]
    fn test_record_page_align() {
        let page_id = PageId::new(3, 9);
        let rec = RecordRef::new(page_id, 120);
        assert_eq!(rec.page_align(), page_id);
        assert_eq!(rec.to_string(), "3:9+120");
    }

    #[test]
    fn test_record_ref_serde_roundtrip() {
        let original = RecordRef::new(PageId::new(10, 500), 77);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: RecordRef = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
