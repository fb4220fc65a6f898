//! HTTP handlers for stock item and category endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Category, StockItem};
use crate::services::reservation::AvailabilityView;
use crate::services::stock::{
    AdjustQuantityInput, CreateCategoryInput, CreateStockItemInput, QuantityChange,
    SetQuantityInput, StockService, UpdateStockItemInput,
};
use crate::services::ReservationService;
use crate::AppState;

/// List all stock items
pub async fn list_stock_items(State(state): State<AppState>) -> AppResult<Json<Vec<StockItem>>> {
    let service = StockService::new(state.db);
    let items = service.list_items().await?;
    Ok(Json(items))
}

/// Create a stock item
pub async fn create_stock_item(
    State(state): State<AppState>,
    Json(input): Json<CreateStockItemInput>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db);
    let item = service.create_item(input).await?;
    Ok(Json(item))
}

/// Get a stock item
pub async fn get_stock_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db);
    let item = service.get_item(item_id).await?;
    Ok(Json(item))
}

/// Update a stock item's metadata
pub async fn update_stock_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateStockItemInput>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db);
    let item = service.update_item(item_id, input).await?;
    Ok(Json(item))
}

/// Delete a stock item
pub async fn delete_stock_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = StockService::new(state.db);
    service.delete_item(item_id).await?;
    Ok(Json(()))
}

/// Adjust a stock quantity by a signed amount (restock path)
pub async fn adjust_stock_quantity(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<AdjustQuantityInput>,
) -> AppResult<Json<QuantityChange>> {
    let service = StockService::new(state.db);
    let change = service.adjust_quantity(item_id, input.amount).await?;
    Ok(Json(change))
}

/// Set a stock quantity to an absolute value (restock path)
pub async fn set_stock_quantity(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<SetQuantityInput>,
) -> AppResult<Json<QuantityChange>> {
    let service = StockService::new(state.db);
    let change = service.set_quantity(item_id, input.quantity).await?;
    Ok(Json(change))
}

/// Query parameters for the availability endpoint
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// When present, the response reports whether this quantity fits
    pub quantity: Option<i64>,
}

/// Availability of a stock item as seen by the active editing session
pub async fn get_stock_availability(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityView>> {
    let service = ReservationService::new(state.db, state.session);
    let view = service.availability(item_id, query.quantity).await?;
    Ok(Json(view))
}

/// List all categories
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    let service = StockService::new(state.db);
    let categories = service.list_categories().await?;
    Ok(Json(categories))
}

/// Create a category
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<Json<Category>> {
    let service = StockService::new(state.db);
    let category = service.create_category(input).await?;
    Ok(Json(category))
}

/// Delete a category
pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = StockService::new(state.db);
    service.delete_category(category_id).await?;
    Ok(Json(()))
}
