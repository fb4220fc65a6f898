//! Allocation arithmetic for the inventory reservation engine
//!
//! Pure, side-effect-free functions combining an item's on-hand quantity,
//! its committed allocation in the order being edited, and the staged delta
//! of the current editing session. Safe to call on every quantity-selection
//! interaction and testable without any persistence.
//!
//! A staged delta is the signed quantity the current unsaved session intends
//! to take from (positive) or release back to (negative) an item's
//! availability, relative to the order's pre-existing committed allocation.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::OrderItem;

/// Compute the clamped delta for a desired selection.
///
/// `desired` is the quantity the user wants the order line to hold,
/// `existing` the quantity the line already holds in the persisted order
/// (0 for a new order), `on_hand` the item's durable stock count.
///
/// The raw delta `desired - existing` is clamped to
/// `[-existing, on_hand]`: a session can never stage more than the on-hand
/// stock nor release more than was actually committed. Negative `desired`
/// is treated as 0.
pub fn clamp_delta(desired: i64, existing: i64, on_hand: i64) -> i64 {
    let existing = existing.max(0);
    let on_hand = on_hand.max(0);
    (desired.max(0) - existing).clamp(-existing, on_hand)
}

/// Quantity the user may still select for an item.
///
/// `on_hand + existing - staged_delta`: the order's own prior commitment is
/// not counted against it while it is being edited.
pub fn available_quantity(on_hand: i64, existing: i64, staged_delta: i64) -> i64 {
    on_hand + existing - staged_delta
}

/// Whether `quantity` can be allocated given the computed availability
pub fn can_allocate(quantity: i64, available: i64) -> bool {
    quantity >= 0 && quantity <= available
}

/// Largest quantity a line can be staged at: on-hand stock plus whatever the
/// order already committed for the item
pub fn max_allocatable(on_hand: i64, existing: i64) -> i64 {
    on_hand.max(0) + existing.max(0)
}

/// One order line as seen by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemQuantity {
    pub stock_item_id: Option<Uuid>,
    pub quantity: i64,
}

impl From<&OrderItem> for ItemQuantity {
    fn from(item: &OrderItem) -> Self {
        Self {
            stock_item_id: item.stock_item_id,
            quantity: i64::from(item.quantity),
        }
    }
}

/// Total quantity per stock item across a list of order lines.
///
/// Duplicate lines for the same item are summed; lines whose stock item is
/// gone are ignored.
pub fn aggregate_quantities(lines: &[ItemQuantity]) -> BTreeMap<Uuid, i64> {
    let mut totals: BTreeMap<Uuid, i64> = BTreeMap::new();
    for line in lines {
        if let Some(id) = line.stock_item_id {
            *totals.entry(id).or_insert(0) += line.quantity;
        }
    }
    totals
}

/// Net stock effect of saving an edited order, as one coherent diff.
///
/// Keyed by stock item id; positive = additional quantity to subtract from
/// stock, negative = quantity to restore. Items appearing in both lists
/// contribute `new - old`, removed items `-old`, added items `+new`.
/// Zero-net entries are omitted, as are lines whose stock item is gone.
///
/// Computing the diff in one pass (rather than independent remove/add
/// passes) is what keeps a quantity change from transiting through a
/// double-subtracted or negative intermediate state.
pub fn diff_order_items(old: &[ItemQuantity], new: &[ItemQuantity]) -> BTreeMap<Uuid, i64> {
    let mut net = aggregate_quantities(new);
    for (id, quantity) in aggregate_quantities(old) {
        *net.entry(id).or_insert(0) -= quantity;
    }

    net.retain(|_, delta| *delta != 0);
    net
}
