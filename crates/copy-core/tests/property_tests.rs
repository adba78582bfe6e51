//! Property-based tests using proptest.
//!
//! Invariants of the pure building blocks: chunking, the delta plan and the
//! row-count guard.

use std::collections::HashSet;

use copy_core::consistency::{shortfall_pct, within_threshold};
use copy_core::incremental::DeltaPlan;
use copy_core::{BatchExecutor, RowHashSet, SchemaDescriptor};
use proptest::prelude::*;

fn hash_set(max: usize) -> impl Strategy<Value = RowHashSet> {
    prop::collection::hash_set("[0-9a-f]{4}", 0..max)
}

// =============================================================================
// Chunking
// =============================================================================

proptest! {
    /// Chunks partition the input: every item exactly once, none oversized,
    /// ceil(M / C) of them.
    #[test]
    fn chunks_partition_input(items in prop::collection::hash_set(any::<u32>(), 0..500), size in 1usize..64) {
        let executor = BatchExecutor::new(size);
        let expected_chunks = executor.chunk_count(items.len());
        let chunks: Vec<Vec<u32>> = executor.chunks(items.clone()).collect();

        prop_assert_eq!(chunks.len(), expected_chunks);
        prop_assert_eq!(chunks.len(), items.len().div_ceil(size));
        prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= size));

        let flattened: Vec<u32> = chunks.into_iter().flatten().collect();
        prop_assert_eq!(flattened.len(), items.len());
        let rebuilt: HashSet<u32> = flattened.into_iter().collect();
        prop_assert_eq!(rebuilt, items);
    }
}

// =============================================================================
// Delta plan
// =============================================================================

proptest! {
    /// Applying the plan to the target yields the source.
    #[test]
    fn plan_converges_target_to_source(source in hash_set(200), target in hash_set(200)) {
        let plan = DeltaPlan::compute(&source, &target);
        let mut applied: RowHashSet = target.difference(&plan.to_delete).cloned().collect();
        applied.extend(plan.to_add.iter().cloned());
        prop_assert_eq!(applied, source);
    }

    /// Deletes and adds never overlap, and the plan is empty iff the sets
    /// are equal.
    #[test]
    fn plan_is_minimal(source in hash_set(100), target in hash_set(100)) {
        let plan = DeltaPlan::compute(&source, &target);
        prop_assert!(plan.to_delete.is_disjoint(&plan.to_add));
        prop_assert!(plan.to_delete.is_subset(&target));
        prop_assert!(plan.to_add.is_subset(&source));
        prop_assert_eq!(plan.is_empty(), source == target);
    }

    /// The ratio counts changed rows against the target size.
    #[test]
    fn plan_ratio(source in hash_set(100), target in hash_set(100)) {
        let plan = DeltaPlan::compute(&source, &target);
        let changed = (plan.to_delete.len() + plan.to_add.len()) as f64;
        let expected = changed / target.len().max(1) as f64;
        prop_assert!((plan.ratio - expected).abs() < 1e-12);
        prop_assert!(plan.ratio >= 0.0);
    }
}

// =============================================================================
// Row-count guard
// =============================================================================

proptest! {
    /// A source at least as large as the target always passes.
    #[test]
    fn growing_source_always_passes(target in 0u64..1_000_000, extra in 0u64..1_000, threshold in 1u32..100) {
        prop_assert!(within_threshold(target + extra, target, threshold));
    }

    /// Raising the threshold never turns a pass into a failure.
    #[test]
    fn threshold_is_monotonic(source in 0u64..10_000, target in 1u64..10_000, threshold in 1u32..99) {
        if within_threshold(source, target, threshold) {
            prop_assert!(within_threshold(source, target, threshold + 1));
        }
    }

    #[test]
    fn shortfall_is_a_percentage(source in 0u64..10_000, target in 1u64..10_000) {
        prop_assume!(source <= target);
        let pct = shortfall_pct(source, target);
        prop_assert!((0.0..=100.0).contains(&pct));
    }
}

// =============================================================================
// Schema normalization
// =============================================================================

proptest! {
    /// Auto-increment counters never affect schema equality.
    #[test]
    fn auto_increment_is_ignored(a in 1u64..u64::MAX, b in 1u64..u64::MAX) {
        let render = |n: u64| SchemaDescriptor::new(format!(
            "CREATE TABLE `t` (\n  `id` int(11) NOT NULL AUTO_INCREMENT,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB AUTO_INCREMENT={n} DEFAULT CHARSET=utf8"
        ));
        prop_assert!(render(a).matches(&render(b), true));
    }
}
