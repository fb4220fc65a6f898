//! HTTP handlers for the reservation session endpoints
//!
//! These are the engine's staging surface: begin/stage/commit/discard plus
//! the pending snapshot. Staging never fails with a quantity error; it
//! clamps and reports the delta actually stored.

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::reservation::{CommitReport, SessionView, StagedAllocation};
use crate::services::ReservationService;
use crate::AppState;

/// Input for beginning an editing session
#[derive(Debug, Deserialize)]
pub struct BeginSessionInput {
    /// Persisted order to edit; omit to compose a new order
    pub order_id: Option<Uuid>,
}

/// Input for staging an allocation
#[derive(Debug, Deserialize)]
pub struct StageAllocationInput {
    pub stock_item_id: Uuid,
    /// Desired quantity for the order line being edited
    pub quantity: i64,
}

/// Begin an editing session
pub async fn begin_session(
    State(state): State<AppState>,
    Json(input): Json<BeginSessionInput>,
) -> AppResult<Json<SessionView>> {
    let service = ReservationService::new(state.db, state.session);
    let view = match input.order_id {
        Some(order_id) => service.begin_editing(order_id).await?,
        None => service.begin_new(),
    };
    Ok(Json(view))
}

/// Stage a pending allocation for a stock item
pub async fn stage_allocation(
    State(state): State<AppState>,
    Json(input): Json<StageAllocationInput>,
) -> AppResult<Json<StagedAllocation>> {
    let service = ReservationService::new(state.db, state.session);
    let staged = service.stage(input.stock_item_id, input.quantity).await?;
    Ok(Json(staged))
}

/// Snapshot of the session's pending changes
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    let service = ReservationService::new(state.db, state.session);
    Json(service.pending())
}

/// Commit all staged deltas into the stock ledger
pub async fn commit_session(State(state): State<AppState>) -> AppResult<Json<CommitReport>> {
    let service = ReservationService::new(state.db, state.session);
    let report = service.commit_pending_changes().await?;
    Ok(Json(report))
}

/// Discard the session without touching the ledger
pub async fn discard_session(State(state): State<AppState>) -> Json<SessionView> {
    let service = ReservationService::new(state.db, state.session);
    Json(service.discard())
}
