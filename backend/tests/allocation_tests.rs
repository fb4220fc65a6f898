//! Allocation arithmetic tests
//!
//! Covers the pure availability calculator:
//! - clamp boundaries (never oversell, never release more than committed)
//! - idempotent staging
//! - the availability identity on_hand + existing - delta

use proptest::prelude::*;
use shared::allocation::{
    available_quantity, can_allocate, clamp_delta, max_allocatable,
};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Staging more than on-hand stock clamps to exactly on-hand
    #[test]
    fn test_clamp_upper_boundary() {
        // item with 10 on hand, new order, user asks for 12
        let delta = clamp_delta(12, 0, 10);
        assert_eq!(delta, 10);
        assert_eq!(available_quantity(10, 0, delta), 0);
    }

    /// Staging below -existing clamps to exactly -existing
    #[test]
    fn test_clamp_lower_boundary() {
        let delta = clamp_delta(0, 3, 5);
        assert_eq!(delta, -3);
    }

    /// A selection within range passes through unclamped
    #[test]
    fn test_clamp_in_range() {
        // editing a line that committed 3, now selecting 1
        let delta = clamp_delta(1, 3, 5);
        assert_eq!(delta, -2);
    }

    /// Editing an order does not count its own commitment against it
    #[test]
    fn test_availability_includes_own_commitment() {
        // 5 on hand, order already committed 3, releasing 2
        let delta = clamp_delta(1, 3, 5);
        assert_eq!(available_quantity(5, 3, delta), 10);
    }

    /// Commit arithmetic for the release scenario
    #[test]
    fn test_commit_release_restores_stock() {
        let delta = clamp_delta(1, 3, 5);
        // quantity_on_hand = max(0, 5 - (-2)) = 7
        let committed = (5i64 - delta).max(0);
        assert_eq!(committed, 7);
    }

    /// Commit arithmetic for the full-allocation scenario
    #[test]
    fn test_commit_full_allocation_empties_stock() {
        let delta = clamp_delta(12, 0, 10);
        let committed = (10i64 - delta).max(0);
        assert_eq!(committed, 0);
    }

    #[test]
    fn test_can_allocate_bounds() {
        assert!(can_allocate(0, 5));
        assert!(can_allocate(5, 5));
        assert!(!can_allocate(6, 5));
        assert!(!can_allocate(-1, 5));
    }

    #[test]
    fn test_max_allocatable() {
        assert_eq!(max_allocatable(5, 3), 8);
        assert_eq!(max_allocatable(0, 0), 0);
    }

    /// Negative desired quantities are treated as zero
    #[test]
    fn test_negative_desired_treated_as_zero() {
        assert_eq!(clamp_delta(-4, 0, 10), 0);
        assert_eq!(clamp_delta(-4, 3, 10), -3);
    }

    /// Zero on-hand stock admits no positive delta
    #[test]
    fn test_zero_on_hand_allows_no_allocation() {
        assert_eq!(clamp_delta(7, 0, 0), 0);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for on-hand quantities
    fn on_hand_strategy() -> impl Strategy<Value = i64> {
        0i64..=1000
    }

    /// Strategy for existing committed allocations
    fn existing_strategy() -> impl Strategy<Value = i64> {
        0i64..=200
    }

    /// Strategy for desired selections, including out-of-range requests
    fn desired_strategy() -> impl Strategy<Value = i64> {
        -100i64..=5000
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The stored delta always lies within [-existing, on_hand]
        #[test]
        fn prop_clamp_within_bounds(
            desired in desired_strategy(),
            existing in existing_strategy(),
            on_hand in on_hand_strategy()
        ) {
            let delta = clamp_delta(desired, existing, on_hand);
            prop_assert!(delta >= -existing);
            prop_assert!(delta <= on_hand);
        }

        /// Staging the same selection twice stores the same delta
        #[test]
        fn prop_clamp_idempotent(
            desired in desired_strategy(),
            existing in existing_strategy(),
            on_hand in on_hand_strategy()
        ) {
            let first = clamp_delta(desired, existing, on_hand);
            let second = clamp_delta(desired, existing, on_hand);
            prop_assert_eq!(first, second);
        }

        /// availability == on_hand + existing - stored delta, never negative
        #[test]
        fn prop_availability_identity(
            desired in desired_strategy(),
            existing in existing_strategy(),
            on_hand in on_hand_strategy()
        ) {
            let delta = clamp_delta(desired, existing, on_hand);
            let available = available_quantity(on_hand, existing, delta);
            prop_assert_eq!(available, on_hand + existing - delta);
            prop_assert!(available >= 0);
        }

        /// An in-range selection is stored exactly as desired - existing
        #[test]
        fn prop_in_range_selection_not_clamped(
            existing in existing_strategy(),
            on_hand in on_hand_strategy()
        ) {
            // pick a desired value inside [0, existing + on_hand]
            let desired = (existing + on_hand) / 2;
            let delta = clamp_delta(desired, existing, on_hand);
            prop_assert_eq!(delta, desired - existing);
        }

        /// Committing a clamped delta never drives stock negative
        #[test]
        fn prop_commit_never_negative(
            desired in desired_strategy(),
            existing in existing_strategy(),
            on_hand in on_hand_strategy()
        ) {
            let delta = clamp_delta(desired, existing, on_hand);
            let committed = (on_hand - delta).max(0);
            prop_assert!(committed >= 0);
            // a positive delta is covered by on-hand stock without the floor
            if delta >= 0 {
                prop_assert_eq!(committed, on_hand - delta);
            }
        }

        /// can_allocate accepts exactly the quantities up to availability
        #[test]
        fn prop_can_allocate_exact_bound(
            quantity in 0i64..=2000,
            available in 0i64..=1000
        ) {
            prop_assert_eq!(can_allocate(quantity, available), quantity <= available);
        }

        /// max_allocatable is the availability of an untouched session
        #[test]
        fn prop_max_allocatable_matches_fresh_availability(
            existing in existing_strategy(),
            on_hand in on_hand_strategy()
        ) {
            prop_assert_eq!(
                max_allocatable(on_hand, existing),
                available_quantity(on_hand, existing, 0)
            );
        }
    }
}
