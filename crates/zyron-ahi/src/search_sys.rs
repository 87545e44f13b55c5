//! Adaptive hash index: a set of independently latched hash table parts.
//!
//! Each B+Tree index is served by the part `index_id % parts`. All parts
//! share one [`SearchSwitch`]; disabling the index empties every part while
//! holding all of their exclusive latches.

use crate::invariant::check_invariant;
use crate::partition::Partition;
use crate::switch::SearchSwitch;
use crate::table::{HashTable, HashTableOptions, TableWriteGuard};
use crate::types::{HashTableStatsSnapshot, HeapPurpose, LatchId};
use log::{debug, info};
use std::io::Write;
use std::sync::Arc;
use zyron_buffer::{BufferBlock, PageResidency};
use zyron_common::page::{PageId, RecordRef};
use zyron_common::{AhiConfig, Result};

pub struct AdaptiveHashIndex {
    config: AhiConfig,
    switch: Arc<SearchSwitch>,
    parts: Box<[HashTable]>,
}

impl AdaptiveHashIndex {
    /// Creates the index with its own switch, enabled per `config.enabled`.
    pub fn new(config: AhiConfig) -> Result<Self> {
        let switch = Arc::new(SearchSwitch::new(config.enabled));
        Self::with_switch(config, switch)
    }

    /// Creates the index on an existing switch, e.g. [`SearchSwitch::global`].
    pub fn with_switch(config: AhiConfig, switch: Arc<SearchSwitch>) -> Result<Self> {
        config.validate()?;

        let n_cells = config.cells_per_part();
        let parts = (0..config.parts)
            .map(|_| {
                HashTable::with_options(
                    HashTableOptions {
                        n_cells,
                        latch_id: LatchId::AhiSearch,
                        n_sync_obj: 0,
                        purpose: HeapPurpose::BtrSearch,
                        node_budget: config.node_budget,
                        adaptive: true,
                        policy: config.invariant_policy,
                    },
                    Arc::clone(&switch),
                )
            })
            .collect::<Result<Box<[_]>>>()?;

        info!(
            "Adaptive hash index: {} part(s) of {} cells, {}",
            parts.len(),
            parts.first().map_or(0, HashTable::n_cells),
            if switch.is_enabled() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            config,
            switch,
            parts,
        })
    }

    pub fn config(&self) -> &AhiConfig {
        &self.config
    }

    #[inline]
    pub fn n_parts(&self) -> usize {
        self.parts.len()
    }

    /// Returns the part number serving `index_id`.
    #[inline]
    pub fn part_index(&self, index_id: u64) -> usize {
        (index_id % self.parts.len() as u64) as usize
    }

    /// Returns the part serving `index_id`.
    #[inline]
    pub fn part(&self, index_id: u64) -> &HashTable {
        &self.parts[self.part_index(index_id)]
    }

    pub fn parts(&self) -> &[HashTable] {
        &self.parts
    }

    pub fn switch(&self) -> &Arc<SearchSwitch> {
        &self.switch
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.switch.is_enabled()
    }

    fn x_lock_all_parts(&self) -> Vec<TableWriteGuard<'_>> {
        self.parts.iter().map(HashTable::x_lock_all).collect()
    }

    /// Turns the index on. Parts start out empty.
    pub fn enable(&self) {
        let _guards = self.x_lock_all_parts();
        if !self.switch.set_enabled(true) {
            info!("Adaptive hash index enabled");
        }
    }

    /// Turns the index off and drops every entry.
    pub fn disable(&self) {
        let mut guards = self.x_lock_all_parts();
        if !self.switch.set_enabled(false) {
            return;
        }

        let mut dropped = 0;
        for guard in guards.iter_mut() {
            dropped += guard.node_count();
            guard.empty();
        }
        info!("Adaptive hash index disabled, {} entries dropped", dropped);
    }

    /// Caches `fold -> data` for `index_id`.
    ///
    /// Returns false while the index is disabled or when the part is full.
    /// A block holds entries of one index at a time; inserting for another
    /// index while the block still has entries is an invariant violation.
    pub fn insert(
        &self,
        index_id: u64,
        fold: u64,
        block: &Arc<BufferBlock>,
        data: RecordRef,
    ) -> Result<bool> {
        let mut part = self.part(index_id).x_lock(fold);
        if !self.is_enabled() {
            return Ok(false);
        }
        let owner = block.ahi_index();
        if !check_invariant(
            self.config.invariant_policy,
            owner.is_none_or(|id| id == index_id) || block.ahi_pointers() == 0,
            || {
                format!(
                    "{:?} holds entries of index {:?}, cannot cache index {}",
                    block, owner, index_id
                )
            },
        ) {
            return Ok(false);
        }
        let inserted = part.insert_for_fold(fold, block, data)?;
        if inserted {
            block.set_ahi_index(Some(index_id));
        }
        Ok(inserted)
    }

    /// Looks up `fold` for `index_id`.
    pub fn search(&self, index_id: u64, fold: u64) -> Option<RecordRef> {
        self.part(index_id).s_lock(fold).search_and_get_data(fold)
    }

    /// Looks up `fold` and drops the entry if its page is no longer resident.
    pub fn search_live(
        &self,
        index_id: u64,
        fold: u64,
        residency: &dyn PageResidency,
    ) -> Option<RecordRef> {
        self.part(index_id).x_lock(fold).search_live(fold, residency)
    }

    /// Removes every entry of `index_id` that points into `page_id`.
    ///
    /// `folds` are the folds of the records on the page; duplicates are
    /// ignored. Returns the number of entries removed.
    pub fn drop_page(&self, index_id: u64, page_id: PageId, folds: &[u64]) -> usize {
        let mut folds = folds.to_vec();
        folds.sort_unstable();
        folds.dedup();

        let mut part = self.part(index_id).x_lock_all();
        if !self.is_enabled() {
            return 0;
        }

        let before = part.node_count();
        for &fold in &folds {
            let partition: &mut Partition = part.partition_mut(fold);
            partition.remove_all_nodes_to_page(fold, page_id);
        }
        let removed = before - part.node_count();

        debug!(
            "Dropped {} hash entries of index {} on page {} ({} folds)",
            removed,
            index_id,
            page_id,
            folds.len()
        );
        removed
    }

    /// Removes the entries pointing into `block`'s page.
    ///
    /// Uses the index recorded on the block by [`insert`](Self::insert).
    pub fn drop_block(&self, block: &BufferBlock, folds: &[u64]) -> usize {
        let (Some(index_id), Some(page_id)) = (block.ahi_index(), block.page_id()) else {
            return 0;
        };
        let removed = self.drop_page(index_id, page_id, folds);
        if block.ahi_pointers() == 0 {
            block.set_ahi_index(None);
        }
        removed
    }

    /// Validates every part.
    pub fn validate(&self) -> Result<bool> {
        let mut ok = true;
        for part in self.parts.iter() {
            let guard = part.s_lock_all();
            ok &= guard.validate(0, part.n_cells() - 1)?;
        }
        Ok(ok)
    }

    /// Writes one info line per part.
    pub fn print_info(&self, out: &mut impl Write) -> Result<()> {
        for part in self.parts.iter() {
            part.s_lock_all().print_info(out)?;
        }
        Ok(())
    }

    /// Returns the row counters summed over all parts.
    pub fn stats(&self) -> HashTableStatsSnapshot {
        self.parts
            .iter()
            .map(HashTable::stats)
            .fold(HashTableStatsSnapshot::default(), |acc, s| acc + s)
    }

    /// Returns the number of cached entries.
    pub fn node_count(&self) -> usize {
        self.parts.iter().map(|p| p.s_lock_all().node_count()).sum()
    }
}

impl std::fmt::Debug for AdaptiveHashIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveHashIndex")
            .field("parts", &self.parts.len())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
