//! Adaptive Hash Index Validation Tests
//!
//! Integration tests for the zyron-ahi hash table and search system:
//! - Chained insert, overwrite and search
//! - Deletion with heap compaction and bulk removal by page
//! - Enable switch behavior
//! - Bounded node heaps
//! - Partitioned latches under concurrent writers
//! - Block pointer bookkeeping and stale entry invalidation

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use zyron_ahi::{
    AdaptiveHashIndex, HashTable, HashTableOptions, HeapPurpose, LatchId, SearchSwitch,
};
use zyron_buffer::{BlockDirectory, BufferBlock, FrameId};
use zyron_common::page::{PageId, RecordRef};
use zyron_common::{AhiConfig, InvariantPolicy};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn block(page_num: u32) -> Arc<BufferBlock> {
    Arc::new(BufferBlock::with_page(
        FrameId(page_num),
        PageId::new(0, page_num),
    ))
}

fn rec(block: &BufferBlock, offset: u16) -> RecordRef {
    RecordRef::new(block.page_id().unwrap(), offset)
}

fn search_table(n_cells: usize) -> HashTable {
    HashTable::create(
        n_cells,
        LatchId::AhiSearch,
        0,
        HeapPurpose::BtrSearch,
        Arc::new(SearchSwitch::new(true)),
    )
    .unwrap()
}

fn adaptive_table(n_cells: usize, policy: InvariantPolicy) -> HashTable {
    HashTable::with_options(
        HashTableOptions {
            n_cells,
            adaptive: true,
            policy,
            ..HashTableOptions::default()
        },
        Arc::new(SearchSwitch::new(true)),
    )
    .unwrap()
}

/// Counts nodes with `fold` in the fold's chain.
fn nodes_with_fold(table: &HashTable, fold: u64) -> usize {
    table
        .s_lock(fold)
        .chain(fold)
        .filter(|(_, node)| node.fold() == fold)
        .count()
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_fold_placement_after_random_workload() {
    init_test_logger();
    let table = search_table(97);
    let blocks: Vec<_> = (0..8).map(block).collect();
    let mut rng = rand::rng();

    for _ in 0..2_000 {
        let fold = rng.random_range(0..500u64);
        let b = &blocks[rng.random_range(0..blocks.len())];
        let offset = rng.random_range(32..16_000u16);
        let mut guard = table.x_lock(fold);

        if rng.random_bool(0.7) {
            guard.insert_for_fold(fold, b, rec(b, offset)).unwrap();
        } else if let Some(data) = guard.search_and_get_data(fold) {
            assert!(guard.search_and_delete_if_found(fold, data));
        }
    }

    let all = table.s_lock_all();
    assert!(all.validate(0, table.n_cells() - 1).unwrap());
    println!("Fold Placement: PASSED - {} nodes after random workload", all.node_count());
}

#[test]
fn test_uniqueness_keeps_latest_data() {
    let table = search_table(31);
    let b = block(1);

    for offset in [64u16, 96, 128, 160] {
        table.x_lock(77).insert_for_fold(77, &b, rec(&b, offset)).unwrap();
    }

    assert_eq!(nodes_with_fold(&table, 77), 1);
    assert_eq!(table.s_lock(77).search_and_get_data(77), Some(rec(&b, 160)));
}

#[test]
fn test_bulk_remove_completeness() {
    let table = search_table(7);
    let on_page = block(1);
    let other = block(2);

    // All folds share cell 3
    {
        let mut guard = table.x_lock(3);
        for (i, fold) in [3u64, 10, 17, 24, 31, 38].into_iter().enumerate() {
            let b = if i % 2 == 0 { &on_page } else { &other };
            guard.insert_for_fold(fold, b, rec(b, 64 + i as u16)).unwrap();
        }
        guard.remove_all_nodes_to_page(3, on_page.page_id().unwrap());
    }

    let guard = table.s_lock(3);
    let on_page_left = guard
        .chain(3)
        .filter(|(_, node)| node.data().page_id == on_page.page_id().unwrap())
        .count();
    assert_eq!(on_page_left, 0);
    assert_eq!(guard.chain(3).count(), 3);
}

#[test]
fn test_search_after_insert() {
    let table = search_table(1_000);
    let b = block(5);
    let mut expected = HashMap::new();

    for fold in (0..5_000u64).step_by(7) {
        let data = rec(&b, 32 + (fold % 10_000) as u16);
        table.x_lock(fold).insert_for_fold(fold, &b, data).unwrap();
        expected.insert(fold, data);
    }

    let all = table.s_lock_all();
    for (fold, data) in &expected {
        assert_eq!(all.search_and_get_data(*fold), Some(*data));
    }
    assert_eq!(all.node_count(), expected.len());
}

#[test]
fn test_disabled_switch_short_circuits_update() {
    let table = search_table(17);
    let b = block(1);
    table.x_lock(9).insert_for_fold(9, &b, rec(&b, 64)).unwrap();

    table.switch().set_enabled(false);
    for _ in 0..3 {
        assert!(!table.x_lock(9).search_and_update_if_found(9, rec(&b, 64), &b, rec(&b, 80)));
    }
    // Lookups still work while disabled
    assert_eq!(table.s_lock(9).search_and_get_data(9), Some(rec(&b, 64)));
}

#[test]
fn test_idempotent_overwrite() {
    let table = search_table(17);
    let b = block(1);

    table.x_lock(4).insert_for_fold(4, &b, rec(&b, 200)).unwrap();
    let once = table.s_lock_all().info();

    table.x_lock(4).insert_for_fold(4, &b, rec(&b, 200)).unwrap();
    let twice = table.s_lock_all().info();

    assert_eq!(once, twice);
    assert_eq!(nodes_with_fold(&table, 4), 1);
    assert_eq!(table.s_lock(4).search_and_get_data(4), Some(rec(&b, 200)));
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_scenario_chained_collisions() {
    let table = search_table(17);
    assert_eq!(table.n_cells(), 17);
    let b = block(1);

    {
        let mut guard = table.x_lock(5);
        assert!(guard.insert_for_fold(5, &b, rec(&b, 100)).unwrap());
        assert!(guard.insert_for_fold(22, &b, rec(&b, 200)).unwrap());
        assert!(guard.insert_for_fold(39, &b, rec(&b, 300)).unwrap());
    }

    let all = table.s_lock_all();
    assert_eq!(all.search_and_get_data(5), Some(rec(&b, 100)));
    assert_eq!(all.search_and_get_data(22), Some(rec(&b, 200)));
    assert_eq!(all.search_and_get_data(39), Some(rec(&b, 300)));
    assert_eq!(all.info().used_cells, 1);
    assert!(all.validate(0, 16).unwrap());
}

#[test]
fn test_scenario_overwrite_same_fold() {
    let table = search_table(17);
    let b = block(1);

    table.x_lock(100).insert_for_fold(100, &b, rec(&b, 64)).unwrap();
    table.x_lock(100).insert_for_fold(100, &b, rec(&b, 128)).unwrap();

    assert_eq!(nodes_with_fold(&table, 100), 1);
    assert_eq!(table.s_lock(100).search_and_get_data(100), Some(rec(&b, 128)));
}

#[test]
fn test_scenario_remove_page_entries() {
    let table = search_table(17);
    let page = block(4);
    let folds = [11u64, 45, 300];

    for (i, &fold) in folds.iter().enumerate() {
        table
            .x_lock(fold)
            .insert_for_fold(fold, &page, rec(&page, 0x100 + i as u16 * 0x10))
            .unwrap();
    }

    for &fold in &folds {
        table
            .x_lock(fold)
            .remove_all_nodes_to_page(fold, page.page_id().unwrap());
    }

    for &fold in &folds {
        assert_eq!(table.s_lock(fold).search_and_get_data(fold), None);
    }
    assert_eq!(table.s_lock_all().node_count(), 0);
}

#[test]
fn test_scenario_switch_gates_update() {
    let table = search_table(17);
    let b = block(1);
    table.x_lock(8).insert_for_fold(8, &b, rec(&b, 64)).unwrap();

    table.switch().set_enabled(false);
    assert!(!table.x_lock(8).search_and_update_if_found(8, rec(&b, 64), &b, rec(&b, 72)));

    table.switch().set_enabled(true);
    assert!(table.x_lock(8).search_and_update_if_found(8, rec(&b, 64), &b, rec(&b, 72)));
    assert_eq!(table.s_lock(8).search_and_get_data(8), Some(rec(&b, 72)));
}

#[test]
fn test_scenario_bounded_heap() {
    let table = HashTable::with_options(
        HashTableOptions {
            n_cells: 64,
            node_budget: Some(8),
            ..HashTableOptions::default()
        },
        Arc::new(SearchSwitch::new(true)),
    )
    .unwrap();
    let b = block(1);

    let mut guard = table.x_lock(0);
    for fold in 0..8u64 {
        assert!(guard.insert_for_fold(fold, &b, rec(&b, 64)).unwrap());
    }
    assert!(!guard.insert_for_fold(8, &b, rec(&b, 64)).unwrap());
    assert_eq!(guard.node_count(), 8);
    drop(guard);

    assert_eq!(table.stats().insert_failures, 1);
}

#[test]
fn test_scenario_bounded_page_hash_is_oom() {
    let table = HashTable::with_options(
        HashTableOptions {
            n_cells: 64,
            purpose: HeapPurpose::PageHash,
            node_budget: Some(2),
            ..HashTableOptions::default()
        },
        Arc::new(SearchSwitch::new(true)),
    )
    .unwrap();
    let b = block(1);

    let mut guard = table.x_lock(0);
    guard.insert_for_fold(0, &b, rec(&b, 64)).unwrap();
    guard.insert_for_fold(1, &b, rec(&b, 64)).unwrap();
    let result = guard.insert_for_fold(2, &b, rec(&b, 64));
    assert!(matches!(result, Err(zyron_common::ZyronError::OutOfMemory(_))));
}

#[test]
fn test_scenario_concurrent_partitioned_inserts() {
    init_test_logger();
    const FOLDS_PER_THREAD: u64 = 5_000;

    let table = Arc::new(
        HashTable::create(
            4_096,
            LatchId::BufPageHash,
            8,
            HeapPurpose::PageHash,
            Arc::new(SearchSwitch::new(true)),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..2u64)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let b = block(t as u32 + 1);
                for i in 0..FOLDS_PER_THREAD {
                    let fold = i * 2 + t;
                    let mut guard = table.x_lock(fold);
                    assert!(guard.insert_for_fold(fold, &b, rec(&b, 64)).unwrap());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let all = table.s_lock_all();
    for fold in 0..FOLDS_PER_THREAD * 2 {
        let data = all.search_and_get_data(fold).unwrap();
        assert_eq!(data.page_id, PageId::new(0, (fold % 2) as u32 + 1));
    }
    assert!(all.validate(0, table.n_cells() - 1).unwrap());
    println!(
        "Concurrent Inserts: PASSED - {} nodes across {} partitions",
        all.node_count(),
        table.n_sync_obj()
    );
}

#[test]
fn test_scenario_disable_empties_parts() {
    init_test_logger();
    let ahi = AdaptiveHashIndex::new(AhiConfig {
        parts: 4,
        buffer_pool_pages: 128,
        ..AhiConfig::default()
    })
    .unwrap();
    let blocks: Vec<_> = (0..4).map(block).collect();

    for (index_id, b) in blocks.iter().enumerate() {
        for fold in 0..16u64 {
            assert!(ahi.insert(index_id as u64, fold, b, rec(b, 64 + fold as u16)).unwrap());
        }
    }
    assert_eq!(ahi.node_count(), 64);

    ahi.disable();
    assert!(!ahi.is_enabled());
    assert_eq!(ahi.node_count(), 0);
    for b in &blocks {
        assert_eq!(b.ahi_pointers(), 0);
    }
    assert_eq!(ahi.search(0, 3), None);

    ahi.enable();
    assert!(ahi.insert(0, 3, &blocks[0], rec(&blocks[0], 64)).unwrap());
    assert_eq!(ahi.search(0, 3), Some(rec(&blocks[0], 64)));
}

#[test]
fn test_scenario_stale_entry_dropped() {
    let dir = BlockDirectory::new(8);
    let ahi = AdaptiveHashIndex::new(AhiConfig {
        parts: 2,
        buffer_pool_pages: 64,
        ..AhiConfig::default()
    })
    .unwrap();

    let page = PageId::new(0, 12);
    let b = dir.load(page).unwrap();
    ahi.insert(1, 500, &b, RecordRef::new(page, 64)).unwrap();
    assert_eq!(ahi.search_live(1, 500, &dir), Some(RecordRef::new(page, 64)));

    // Page leaves the pool without the index being told
    dir.evict(page);
    assert_eq!(ahi.search(1, 500), Some(RecordRef::new(page, 64)));
    assert_eq!(ahi.search_live(1, 500, &dir), None);
    assert_eq!(ahi.search(1, 500), None);
    assert_eq!(b.ahi_pointers(), 0);
}

#[test]
fn test_scenario_block_pointer_counters() {
    let ahi = AdaptiveHashIndex::new(AhiConfig {
        parts: 1,
        buffer_pool_pages: 64,
        ..AhiConfig::default()
    })
    .unwrap();
    let b = block(1);
    let c = block(2);

    ahi.insert(0, 10, &b, rec(&b, 64)).unwrap();
    ahi.insert(0, 20, &b, rec(&b, 96)).unwrap();
    assert_eq!(b.ahi_pointers(), 2);

    ahi.insert(0, 20, &c, rec(&c, 64)).unwrap();
    assert_eq!(b.ahi_pointers(), 1);
    assert_eq!(c.ahi_pointers(), 1);

    ahi.drop_page(0, b.page_id().unwrap(), &[10, 20]);
    assert_eq!(b.ahi_pointers(), 0);
    assert_eq!(c.ahi_pointers(), 1);

    let all = ahi.part(0).s_lock_all();
    assert_eq!(all.count_pointers_to(c.page_id().unwrap()), 1);
    assert_eq!(all.count_pointers_to(b.page_id().unwrap()), 0);
}

// =============================================================================
// Invariant Policy
// =============================================================================

#[test]
#[should_panic(expected = "hash index invariant violated")]
fn test_panic_policy_on_disabled_insert() {
    let table = adaptive_table(17, InvariantPolicy::Panic);
    let b = block(1);
    table.switch().set_enabled(false);
    let _ = table.x_lock(1).insert_for_fold(1, &b, rec(&b, 64));
}

#[test]
fn test_log_policy_refuses_disabled_mutations() {
    init_test_logger();
    let table = adaptive_table(17, InvariantPolicy::Log);
    let b = block(1);
    table.x_lock(1).insert_for_fold(1, &b, rec(&b, 64)).unwrap();

    table.switch().set_enabled(false);
    let mut guard = table.x_lock(1);
    assert!(!guard.insert_for_fold(2, &b, rec(&b, 64)).unwrap());
    assert!(!guard.search_and_delete_if_found(1, rec(&b, 64)));
    guard.remove_all_nodes_to_page(1, b.page_id().unwrap());

    assert_eq!(guard.node_count(), 1);
    assert_eq!(b.ahi_pointers(), 1);
}

#[test]
fn test_log_policy_tolerates_counter_drift() {
    init_test_logger();
    let table = adaptive_table(17, InvariantPolicy::Log);
    let b = block(1);
    table.x_lock(1).insert_for_fold(1, &b, rec(&b, 64)).unwrap();

    // Someone else reset the block's counter
    b.reset();
    b.set_page_id(Some(PageId::new(0, 1)));

    let mut guard = table.x_lock(1);
    assert!(guard.search_and_delete_if_found(1, rec(&b, 64)));
    assert_eq!(b.ahi_pointers(), 0);
    assert_eq!(guard.node_count(), 0);
}

#[test]
fn test_null_record_rejected() {
    let table = search_table(17);
    let b = block(1);

    let result = table.x_lock(1).insert_for_fold(1, &b, rec(&b, 8));
    assert!(matches!(
        result,
        Err(zyron_common::ZyronError::InvalidRecord { offset: 8, .. })
    ));
    assert_eq!(table.s_lock_all().node_count(), 0);
}
