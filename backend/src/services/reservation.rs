//! Inventory reservation engine
//!
//! Tracks the allocation delta map for the order currently being edited.
//! Deltas are signed quantities relative to the order's pre-existing
//! committed allocation, clamped at stage time so the session can never
//! oversell on-hand stock nor release more than was committed. The map is
//! session-scoped: it lives between `begin` and either `commit` or
//! `discard`, and is never persisted.
//!
//! `ReservationSession` is plain in-memory state with no I/O; the service
//! wraps it in a mutex (single writer, never held across an await) and owns
//! the atomic commit against the stock ledger.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::OrderStatus;
use shared::allocation;

/// Shared handle to the single active editing session
pub type SharedSession = Arc<Mutex<ReservationSession>>;

/// Lifecycle state of the editing session
///
/// `Idle -> Staging -> {commit | discard} -> Idle`. A finished session is
/// not resumable; a new `begin` starts fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Staging,
}

/// In-memory allocation delta map for one editing session
#[derive(Debug)]
pub struct ReservationSession {
    state: SessionState,
    /// The persisted order being edited, if any
    editing_order: Option<Uuid>,
    /// Committed allocation per item in the order being edited
    existing: HashMap<Uuid, i64>,
    /// Staged deltas; zero entries are pruned, keeping the map sparse
    deltas: HashMap<Uuid, i64>,
}

impl Default for ReservationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            editing_order: None,
            existing: HashMap::new(),
            deltas: HashMap::new(),
        }
    }

    /// Create a shareable session handle for the application state
    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn editing_order(&self) -> Option<Uuid> {
        self.editing_order
    }

    /// Start an editing session
    ///
    /// `existing` holds the committed allocation per item of the order being
    /// edited; empty for a brand-new order. Any previously staged deltas are
    /// discarded.
    pub fn begin(&mut self, editing_order: Option<Uuid>, existing: HashMap<Uuid, i64>) {
        self.state = SessionState::Staging;
        self.editing_order = editing_order;
        self.existing = existing;
        self.deltas.clear();
    }

    /// Current staged delta for an item, default 0
    pub fn staged_delta(&self, item_id: Uuid) -> i64 {
        self.deltas.get(&item_id).copied().unwrap_or(0)
    }

    /// Committed allocation for an item in the order being edited, default 0
    pub fn existing_allocation(&self, item_id: Uuid) -> i64 {
        self.existing.get(&item_id).copied().unwrap_or(0)
    }

    /// Stage a desired quantity for an item, clamping the resulting delta to
    /// `[-existing, on_hand]`. Never fails; returns the delta actually
    /// stored. A clamped delta of 0 removes the entry.
    pub fn set_pending_allocation(&mut self, item_id: Uuid, on_hand: i64, desired: i64) -> i64 {
        // The UI may stage before an explicit begin when composing a new order
        if self.state == SessionState::Idle {
            self.state = SessionState::Staging;
        }

        let existing = self.existing_allocation(item_id);
        let clamped = allocation::clamp_delta(desired, existing, on_hand);

        if clamped == 0 {
            self.deltas.remove(&item_id);
        } else {
            self.deltas.insert(item_id, clamped);
        }
        clamped
    }

    /// Quantity the user may still select for an item
    pub fn available_quantity(&self, item_id: Uuid, on_hand: i64) -> i64 {
        allocation::available_quantity(
            on_hand,
            self.existing_allocation(item_id),
            self.staged_delta(item_id),
        )
    }

    /// Whether `quantity` fits within the computed availability
    pub fn can_allocate(&self, item_id: Uuid, on_hand: i64, quantity: i64) -> bool {
        allocation::can_allocate(quantity, self.available_quantity(item_id, on_hand))
    }

    /// Largest quantity a line for this item can be staged at
    pub fn max_allocatable(&self, item_id: Uuid, on_hand: i64) -> i64 {
        allocation::max_allocatable(on_hand, self.existing_allocation(item_id))
    }

    /// Snapshot of all staged deltas, sorted by item id
    pub fn pending_changes(&self) -> BTreeMap<Uuid, i64> {
        self.deltas.iter().map(|(k, v)| (*k, *v)).collect()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.deltas.is_empty()
    }

    /// Discard all staged deltas without touching the ledger
    pub fn discard(&mut self) {
        self.reset();
    }

    /// Clear staged state after a successful commit
    pub fn complete(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.editing_order = None;
        self.existing.clear();
        self.deltas.clear();
    }
}

/// One staged delta as reflected back to the UI
#[derive(Debug, Clone, Serialize)]
pub struct PendingDelta {
    pub stock_item_id: Uuid,
    pub delta: i64,
}

/// Snapshot of the session for UI reflection
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub editing_order: Option<Uuid>,
    pub pending: Vec<PendingDelta>,
}

/// Result of staging one allocation
#[derive(Debug, Serialize)]
pub struct StagedAllocation {
    pub stock_item_id: Uuid,
    pub staged_delta: i64,
    pub available_quantity: i64,
}

/// Availability of one item as seen by the current session
#[derive(Debug, Serialize)]
pub struct AvailabilityView {
    pub stock_item_id: Uuid,
    pub quantity_on_hand: i64,
    pub existing_allocation: i64,
    pub staged_delta: i64,
    pub available_quantity: i64,
    pub max_allocatable: i64,
    /// Whether the queried quantity fits, when one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_allocate: Option<bool>,
}

/// One applied delta from a commit
#[derive(Debug, Serialize)]
pub struct AppliedDelta {
    pub stock_item_id: Uuid,
    pub delta: i64,
    pub quantity_on_hand: i64,
}

/// Outcome of committing the session
///
/// `missing` lists items that vanished from the ledger between staging and
/// commit; their deltas are skipped, not silently dropped.
#[derive(Debug, Serialize)]
pub struct CommitReport {
    pub applied: Vec<AppliedDelta>,
    pub missing: Vec<Uuid>,
}

/// Reservation service owning the session and its commit path
#[derive(Clone)]
pub struct ReservationService {
    db: PgPool,
    session: SharedSession,
}

impl ReservationService {
    pub fn new(db: PgPool, session: SharedSession) -> Self {
        Self { db, session }
    }

    /// Lock the session map. A poisoned lock only means a panic elsewhere
    /// while holding the guard; every mutation leaves the map consistent,
    /// so recover the inner value instead of propagating the poison.
    fn session(&self) -> MutexGuard<'_, ReservationSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a session for composing a brand-new order
    pub fn begin_new(&self) -> SessionView {
        let mut session = self.session();
        session.begin(None, HashMap::new());
        tracing::debug!("reservation session started (new order)");
        Self::view(&session)
    }

    /// Begin a session for editing a persisted order
    ///
    /// The committed allocation per item is derived here from the order
    /// store rather than trusted from the caller.
    pub async fn begin_editing(&self, order_id: Uuid) -> AppResult<SessionView> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let status = OrderStatus::from_str(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown order status: {status}"))?;
        if !status.holds_stock() {
            return Err(AppError::InvalidStateTransition(
                "canceled orders cannot be edited".to_string(),
            ));
        }

        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT stock_item_id, SUM(quantity)::BIGINT
            FROM order_items
            WHERE order_id = $1 AND stock_item_id IS NOT NULL
            GROUP BY stock_item_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        let existing: HashMap<Uuid, i64> = rows.into_iter().collect();

        let mut session = self.session();
        session.begin(Some(order_id), existing);
        tracing::debug!(%order_id, "reservation session started (editing)");
        Ok(Self::view(&session))
    }

    /// Stage a desired quantity for an item (setPendingAllocation)
    pub async fn stage(&self, item_id: Uuid, desired: i64) -> AppResult<StagedAllocation> {
        let on_hand = self.quantity_on_hand(item_id).await?;

        let mut session = self.session();
        let staged_delta = session.set_pending_allocation(item_id, on_hand, desired);
        let available_quantity = session.available_quantity(item_id, on_hand);
        tracing::debug!(%item_id, desired, staged_delta, "allocation staged");

        Ok(StagedAllocation {
            stock_item_id: item_id,
            staged_delta,
            available_quantity,
        })
    }

    /// Availability of an item as seen by the current session
    pub async fn availability(
        &self,
        item_id: Uuid,
        quantity: Option<i64>,
    ) -> AppResult<AvailabilityView> {
        let on_hand = self.quantity_on_hand(item_id).await?;

        let session = self.session();
        let available_quantity = session.available_quantity(item_id, on_hand);
        Ok(AvailabilityView {
            stock_item_id: item_id,
            quantity_on_hand: on_hand,
            existing_allocation: session.existing_allocation(item_id),
            staged_delta: session.staged_delta(item_id),
            available_quantity,
            max_allocatable: session.max_allocatable(item_id, on_hand),
            can_allocate: quantity.map(|q| allocation::can_allocate(q, available_quantity)),
        })
    }

    /// Snapshot of the session for UI reflection
    pub fn pending(&self) -> SessionView {
        Self::view(&self.session())
    }

    /// Atomically transfer every staged delta into the stock ledger
    ///
    /// All updates run in one transaction. If persistence fails the session
    /// is left intact so the user can retry without re-entering selections;
    /// only a successful commit clears it.
    pub async fn commit_pending_changes(&self) -> AppResult<CommitReport> {
        let snapshot = self.session().pending_changes();

        if snapshot.is_empty() {
            self.session().complete();
            return Ok(CommitReport {
                applied: Vec::new(),
                missing: Vec::new(),
            });
        }

        let mut applied = Vec::new();
        let mut missing = Vec::new();

        let mut tx = self.db.begin().await?;
        for (item_id, delta) in &snapshot {
            let quantity = sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE stock_items
                SET quantity_on_hand = GREATEST(0, quantity_on_hand - $1), updated_at = NOW()
                WHERE id = $2
                RETURNING quantity_on_hand
                "#,
            )
            .bind(*delta as i32)
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?;

            match quantity {
                Some(quantity) => applied.push(AppliedDelta {
                    stock_item_id: *item_id,
                    delta: *delta,
                    quantity_on_hand: i64::from(quantity),
                }),
                None => {
                    tracing::warn!(item_id = %item_id, delta, "staged item no longer exists, skipping");
                    missing.push(*item_id);
                }
            }
        }
        tx.commit().await?;

        self.session().complete();
        tracing::info!(
            applied = applied.len(),
            missing = missing.len(),
            "pending allocations committed"
        );

        Ok(CommitReport { applied, missing })
    }

    /// Discard the session without touching the ledger
    pub fn discard(&self) -> SessionView {
        let mut session = self.session();
        session.discard();
        tracing::debug!("reservation session discarded");
        Self::view(&session)
    }

    /// Clear staged state after an order save that supersedes it
    ///
    /// The reconciler already applied the saved order's stock effect;
    /// committing the session afterwards would double-count. Only the
    /// session belonging to the saved order is cleared: `Some(id)` for an
    /// edit, `None` for a newly composed order.
    pub fn clear_for_order(&self, order_id: Option<Uuid>) {
        let mut session = self.session();
        let matches = match order_id {
            Some(id) => session.editing_order() == Some(id),
            None => session.editing_order().is_none(),
        };
        if matches && session.state() == SessionState::Staging {
            session.discard();
            tracing::debug!(?order_id, "reservation session cleared after order save");
        }
    }

    async fn quantity_on_hand(&self, item_id: Uuid) -> AppResult<i64> {
        let quantity =
            sqlx::query_scalar::<_, i32>("SELECT quantity_on_hand FROM stock_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        Ok(i64::from(quantity))
    }

    fn view(session: &ReservationSession) -> SessionView {
        SessionView {
            state: session.state(),
            editing_order: session.editing_order(),
            pending: session
                .pending_changes()
                .into_iter()
                .map(|(stock_item_id, delta)| PendingDelta {
                    stock_item_id,
                    delta,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn new_session_is_idle_and_empty() {
        let session = ReservationSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_pending_changes());
        assert_eq!(session.staged_delta(item()), 0);
    }

    #[test]
    fn staging_clamps_to_on_hand() {
        // item A: 10 on hand, new order, user asks for 12
        let a = item();
        let mut session = ReservationSession::new();
        session.begin(None, HashMap::new());

        let delta = session.set_pending_allocation(a, 10, 12);
        assert_eq!(delta, 10);
        assert_eq!(session.available_quantity(a, 10), 0);
    }

    #[test]
    fn staging_release_on_edited_order() {
        // item B: 5 on hand, order already committed 3; selecting 1 releases 2
        let b = item();
        let order = Uuid::new_v4();
        let mut session = ReservationSession::new();
        session.begin(Some(order), HashMap::from([(b, 3)]));

        let delta = session.set_pending_allocation(b, 5, 1);
        assert_eq!(delta, -2);
        assert_eq!(session.available_quantity(b, 5), 10);
    }

    #[test]
    fn staging_cannot_release_more_than_committed() {
        let b = item();
        let mut session = ReservationSession::new();
        session.begin(None, HashMap::from([(b, 3)]));

        let delta = session.set_pending_allocation(b, 5, 0);
        assert_eq!(delta, -3);
    }

    #[test]
    fn staging_is_idempotent() {
        let a = item();
        let mut session = ReservationSession::new();
        session.begin(None, HashMap::new());

        let first = session.set_pending_allocation(a, 10, 7);
        let second = session.set_pending_allocation(a, 10, 7);
        assert_eq!(first, second);
        assert_eq!(session.staged_delta(a), 7);
    }

    #[test]
    fn zero_delta_prunes_entry() {
        let a = item();
        let mut session = ReservationSession::new();
        session.begin(None, HashMap::new());

        session.set_pending_allocation(a, 10, 4);
        assert!(session.has_pending_changes());

        session.set_pending_allocation(a, 10, 0);
        assert!(!session.has_pending_changes());
        assert!(session.pending_changes().is_empty());
    }

    #[test]
    fn negative_desired_is_treated_as_zero() {
        let a = item();
        let mut session = ReservationSession::new();
        session.begin(None, HashMap::new());

        let delta = session.set_pending_allocation(a, 10, -5);
        assert_eq!(delta, 0);
        assert!(!session.has_pending_changes());
    }

    #[test]
    fn staging_while_idle_enters_staging() {
        let a = item();
        let mut session = ReservationSession::new();

        session.set_pending_allocation(a, 10, 2);
        assert_eq!(session.state(), SessionState::Staging);
        assert_eq!(session.staged_delta(a), 2);
    }

    #[test]
    fn discard_clears_everything() {
        let a = item();
        let mut session = ReservationSession::new();
        session.begin(Some(Uuid::new_v4()), HashMap::from([(a, 2)]));
        session.set_pending_allocation(a, 5, 4);

        session.discard();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.editing_order(), None);
        assert!(!session.has_pending_changes());
        assert_eq!(session.existing_allocation(a), 0);
    }

    #[test]
    fn begin_discards_previous_staging() {
        let a = item();
        let mut session = ReservationSession::new();
        session.set_pending_allocation(a, 10, 6);

        session.begin(None, HashMap::new());
        assert!(!session.has_pending_changes());
    }

    #[test]
    fn can_allocate_respects_staged_deltas() {
        let a = item();
        let mut session = ReservationSession::new();
        session.begin(None, HashMap::new());
        session.set_pending_allocation(a, 10, 8);

        assert!(session.can_allocate(a, 10, 2));
        assert!(!session.can_allocate(a, 10, 3));
        assert!(!session.can_allocate(a, 10, -1));
    }

    #[test]
    fn max_allocatable_includes_existing_commitment() {
        let b = item();
        let mut session = ReservationSession::new();
        session.begin(None, HashMap::from([(b, 3)]));

        assert_eq!(session.max_allocatable(b, 5), 8);
    }
}
