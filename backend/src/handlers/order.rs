//! HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Order, OrderStatus, SalesPlatform};
use crate::services::order::{
    CreateOrderInput, DeletedOrder, OrderListFilter, OrderService, OrderWithItems, SavedOrder,
    StatusChange, UpdateOrderInput, UpdateStatusInput,
};
use crate::services::ReservationService;
use crate::AppState;
use shared::types::{PaginatedResponse, Pagination};

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: Option<OrderStatus>,
    pub platform: Option<SalesPlatform>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    let service = OrderService::new(state.db);

    let default = Pagination::default();
    let pagination = Pagination {
        page: query.page.unwrap_or(default.page),
        per_page: query.per_page.unwrap_or(default.per_page),
    };
    let filter = OrderListFilter {
        start: query.start,
        end: query.end,
        status: query.status,
        platform: query.platform,
    };

    let orders = service.list_orders(filter, pagination).await?;
    Ok(Json(orders))
}

/// Create an order (subtracts its stock commitment atomically)
pub async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<Json<SavedOrder>> {
    let reservations = ReservationService::new(state.db.clone(), state.session);
    let service = OrderService::new(state.db);
    let saved = service.create_order(input).await?;

    // The reconciler applied the order's stock effect; staged deltas for
    // the composed order must not be committed on top of it
    reservations.clear_for_order(None);
    Ok(Json(saved))
}

/// Get an order with its lines
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderWithItems>> {
    let service = OrderService::new(state.db);
    let order = service.get_order(order_id).await?;
    Ok(Json(order))
}

/// Save an edited order (applies the net stock diff atomically)
pub async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<SavedOrder>> {
    let reservations = ReservationService::new(state.db.clone(), state.session);
    let service = OrderService::new(state.db);
    let saved = service.update_order(order_id, input).await?;
    reservations.clear_for_order(Some(order_id));
    Ok(Json(saved))
}

/// Delete an order (restores its stock commitment)
pub async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<DeletedOrder>> {
    let reservations = ReservationService::new(state.db.clone(), state.session);
    let service = OrderService::new(state.db);
    let deleted = service.delete_order(order_id).await?;
    reservations.clear_for_order(Some(order_id));
    Ok(Json(deleted))
}

/// Transition an order's status (canceling restores its stock)
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<StatusChange>> {
    let service = OrderService::new(state.db);
    let change = service.update_status(order_id, input).await?;
    Ok(Json(change))
}
