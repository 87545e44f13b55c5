//! Configuration structures for ZyronDB.

use crate::error::{Result, ZyronError};
use crate::page::PAGE_SIZE;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Maximum number of adaptive hash index parts.
pub const MAX_AHI_PARTS: usize = 512;

/// What to do when a hash index invariant check fails.
///
/// Defaults to `Panic` in debug builds and `Log` in release builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantPolicy {
    /// Panic on the first violation.
    Panic,
    /// Log the violation at error level and continue.
    Log,
}

impl Default for InvariantPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            InvariantPolicy::Panic
        } else {
            InvariantPolicy::Log
        }
    }
}

/// Adaptive hash index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AhiConfig {
    /// Whether the adaptive hash index starts enabled.
    pub enabled: bool,
    /// Number of independently latched hash table parts.
    pub parts: usize,
    /// Buffer pool size in pages. The hash table is sized from it.
    pub buffer_pool_pages: usize,
    /// Page size in bytes.
    pub page_size: usize,
    /// Maximum number of chain nodes per part (None = unbounded).
    pub node_budget: Option<usize>,
    /// Reaction to failed invariant checks.
    pub invariant_policy: InvariantPolicy,
}

impl Default for AhiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parts: 8,
            buffer_pool_pages: 8192, // 128 MB with 16 KB pages
            page_size: PAGE_SIZE,
            node_budget: None,
            invariant_policy: InvariantPolicy::default(),
        }
    }
}

impl AhiConfig {
    /// Creates a configuration sized for a buffer pool of 25% of available RAM.
    ///
    /// Minimum 1,000 pages, matching the buffer pool's own auto sizing.
    pub fn auto_sized() -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let buffer_pool_pages = (target_bytes / PAGE_SIZE).max(1_000);

        Self {
            buffer_pool_pages,
            ..Default::default()
        }
    }

    /// Returns the total buffer pool size in bytes.
    pub fn buffer_pool_size_bytes(&self) -> usize {
        self.buffer_pool_pages * self.page_size
    }

    /// Returns the requested cell count of each part.
    ///
    /// One cell per 64 pointer-sized words of buffer pool memory, split evenly
    /// across parts.
    pub fn cells_per_part(&self) -> usize {
        let total = self.buffer_pool_size_bytes() / std::mem::size_of::<usize>() / 64;
        (total / self.parts.max(1)).max(1)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.parts == 0 || self.parts > MAX_AHI_PARTS {
            return Err(ZyronError::invalid_parameter("parts", self.parts));
        }
        if self.page_size == 0 {
            return Err(ZyronError::invalid_parameter("page_size", self.page_size));
        }
        if self.buffer_pool_pages == 0 {
            return Err(ZyronError::invalid_parameter(
                "buffer_pool_pages",
                self.buffer_pool_pages,
            ));
        }
        if self.node_budget == Some(0) {
            return Err(ZyronError::ConfigError(
                "node_budget must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
