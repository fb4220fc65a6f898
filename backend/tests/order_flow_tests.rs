//! Order reconciliation tests
//!
//! Covers the stock effect of saving, editing, canceling and deleting
//! orders:
//! - the coherent save diff (one signed adjustment per item)
//! - full restoration on deletion and cancellation
//! - the save-then-restore round trip
//! - the order status machine

use std::collections::HashMap;

use proptest::prelude::*;
use shared::allocation::{diff_order_items, ItemQuantity};
use shared::models::OrderStatus;
use uuid::Uuid;

fn line(id: Uuid, quantity: i64) -> ItemQuantity {
    ItemQuantity {
        stock_item_id: Some(id),
        quantity,
    }
}

/// Apply a reconciliation diff to a simulated ledger, floored at 0 the way
/// the service applies it
fn apply_diff(ledger: &mut HashMap<Uuid, i64>, diff: &std::collections::BTreeMap<Uuid, i64>) {
    for (id, delta) in diff {
        let quantity = ledger.entry(*id).or_insert(0);
        *quantity = (*quantity - delta).max(0);
    }
}

/// Restore a deleted order's lines into a simulated ledger
fn restore(ledger: &mut HashMap<Uuid, i64>, items: &[ItemQuantity]) {
    for item in items {
        if let Some(id) = item.stock_item_id {
            *ledger.entry(id).or_insert(0) += item.quantity;
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A quantity change is one signed adjustment, not remove + re-add
    #[test]
    fn test_quantity_change_is_single_adjustment() {
        let a = Uuid::new_v4();
        let diff = diff_order_items(&[line(a, 3)], &[line(a, 5)]);

        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get(&a), Some(&2));
    }

    /// Swapping one item for another restores the old and subtracts the new
    #[test]
    fn test_item_swap() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let diff = diff_order_items(&[line(a, 3)], &[line(b, 2)]);

        assert_eq!(diff.get(&a), Some(&-3));
        assert_eq!(diff.get(&b), Some(&2));
    }

    /// An unchanged order produces no stock mutations at all
    #[test]
    fn test_unchanged_order_is_noop() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let items = [line(a, 3), line(b, 1)];
        let diff = diff_order_items(&items, &items);

        assert!(diff.is_empty());
    }

    /// Applying a save diff keeps quantities exact (no double subtraction)
    #[test]
    fn test_save_diff_applies_net_effect() {
        let a = Uuid::new_v4();
        let mut ledger = HashMap::from([(a, 10)]);

        // order initially committed 3 of A, edit raises it to 5
        let diff = diff_order_items(&[line(a, 3)], &[line(a, 5)]);
        apply_diff(&mut ledger, &diff);

        assert_eq!(ledger[&a], 8);
    }

    /// Deleting an order restores its full commitment
    #[test]
    fn test_delete_restores_stock() {
        // item C: 2 on hand, deleted order committed 4
        let c = Uuid::new_v4();
        let mut ledger = HashMap::from([(c, 2)]);

        restore(&mut ledger, &[line(c, 4)]);
        assert_eq!(ledger[&c], 6);
    }

    /// Lines without a stock item are skipped by the diff
    #[test]
    fn test_orphaned_lines_skipped() {
        let orphan = ItemQuantity {
            stock_item_id: None,
            quantity: 7,
        };
        let diff = diff_order_items(&[orphan], &[]);
        assert!(diff.is_empty());
    }

    /// restoreStock after a create (old = []) returns to the original state
    #[test]
    fn test_create_then_delete_round_trip() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut ledger = HashMap::from([(a, 10), (b, 4)]);
        let items = [line(a, 6), line(b, 4)];

        let diff = diff_order_items(&[], &items);
        apply_diff(&mut ledger, &diff);
        assert_eq!(ledger[&a], 4);
        assert_eq!(ledger[&b], 0);

        restore(&mut ledger, &items);
        assert_eq!(ledger[&a], 10);
        assert_eq!(ledger[&b], 4);
    }

    // --- Status machine ---

    #[test]
    fn test_forward_transitions_valid() {
        use OrderStatus::*;
        for (from, to) in [(Pending, Paid), (Paid, Shipped), (Shipped, Completed)] {
            assert!(from.can_transition_to(to), "{from} -> {to} should be valid");
        }
    }

    #[test]
    fn test_cancel_from_any_active_status() {
        use OrderStatus::*;
        for from in [Pending, Paid, Shipped] {
            assert!(from.can_transition_to(Canceled));
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        use OrderStatus::*;
        for to in [Pending, Paid, Shipped, Completed] {
            assert!(!Canceled.can_transition_to(to));
            assert!(!Completed.can_transition_to(to));
        }
        assert!(!Completed.can_transition_to(Canceled));
    }

    #[test]
    fn test_no_skipping_stages() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Paid.can_transition_to(Completed));
    }

    /// A canceled order no longer holds stock, so deleting it must not
    /// restore a second time
    #[test]
    fn test_cancel_then_delete_restores_once() {
        let a = Uuid::new_v4();
        let mut ledger = HashMap::from([(a, 2)]);
        let items = [line(a, 4)];
        let mut status = OrderStatus::Pending;

        // cancel: release the commitment
        assert!(status.can_transition_to(OrderStatus::Canceled));
        status = OrderStatus::Canceled;
        restore(&mut ledger, &items);
        assert_eq!(ledger[&a], 6);

        // delete: the commitment was already released
        if status.holds_stock() {
            restore(&mut ledger, &items);
        }
        assert_eq!(ledger[&a], 6);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for a small pool of item ids, so lists overlap
    fn item_pool() -> Vec<Uuid> {
        (0..5).map(|_| Uuid::new_v4()).collect()
    }

    /// Strategy for an order line list drawn from a pool of `n` items
    fn lines_strategy(n: usize) -> impl Strategy<Value = Vec<(usize, i64)>> {
        prop::collection::vec((0..n, 1i64..=50), 0..8)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Save followed by restore returns every quantity to its original
        /// value, provided stock covered the order
        #[test]
        fn prop_save_restore_round_trip(indices in lines_strategy(5)) {
            let pool = item_pool();
            let items: Vec<ItemQuantity> = indices
                .iter()
                .map(|(i, q)| line(pool[*i], *q))
                .collect();

            // seed the ledger with enough stock to cover the order
            let totals = shared::allocation::aggregate_quantities(&items);
            let mut ledger: HashMap<Uuid, i64> =
                totals.iter().map(|(id, q)| (*id, q + 10)).collect();
            let original = ledger.clone();

            let diff = diff_order_items(&[], &items);
            apply_diff(&mut ledger, &diff);
            restore(&mut ledger, &items);

            prop_assert_eq!(ledger, original);
        }

        /// Editing from one list to another equals deleting and re-creating,
        /// in net stock effect
        #[test]
        fn prop_edit_equals_delete_plus_create(
            old_indices in lines_strategy(5),
            new_indices in lines_strategy(5)
        ) {
            let pool = item_pool();
            let old: Vec<ItemQuantity> =
                old_indices.iter().map(|(i, q)| line(pool[*i], *q)).collect();
            let new: Vec<ItemQuantity> =
                new_indices.iter().map(|(i, q)| line(pool[*i], *q)).collect();

            // seed generously so the max(0) floor never engages
            let mut direct: HashMap<Uuid, i64> =
                pool.iter().map(|id| (*id, 1000)).collect();
            let mut two_step = direct.clone();

            // one coherent diff
            apply_diff(&mut direct, &diff_order_items(&old, &new));

            // restore old, then subtract new
            restore(&mut two_step, &old);
            apply_diff(&mut two_step, &diff_order_items(&[], &new));

            prop_assert_eq!(direct, two_step);
        }

        /// The ledger never goes negative under any diff application
        #[test]
        fn prop_ledger_never_negative(
            old_indices in lines_strategy(5),
            new_indices in lines_strategy(5),
            seed in 0i64..=20
        ) {
            let pool = item_pool();
            let old: Vec<ItemQuantity> =
                old_indices.iter().map(|(i, q)| line(pool[*i], *q)).collect();
            let new: Vec<ItemQuantity> =
                new_indices.iter().map(|(i, q)| line(pool[*i], *q)).collect();

            let mut ledger: HashMap<Uuid, i64> =
                pool.iter().map(|id| (*id, seed)).collect();

            apply_diff(&mut ledger, &diff_order_items(&old, &new));
            for quantity in ledger.values() {
                prop_assert!(*quantity >= 0);
            }
        }

        /// The diff never mentions an item absent from both lists
        #[test]
        fn prop_diff_touches_only_listed_items(
            old_indices in lines_strategy(5),
            new_indices in lines_strategy(5)
        ) {
            let pool = item_pool();
            let old: Vec<ItemQuantity> =
                old_indices.iter().map(|(i, q)| line(pool[*i], *q)).collect();
            let new: Vec<ItemQuantity> =
                new_indices.iter().map(|(i, q)| line(pool[*i], *q)).collect();

            let listed: std::collections::HashSet<Uuid> = old
                .iter()
                .chain(new.iter())
                .filter_map(|l| l.stock_item_id)
                .collect();

            for id in diff_order_items(&old, &new).keys() {
                prop_assert!(listed.contains(id));
            }
        }
    }
}
