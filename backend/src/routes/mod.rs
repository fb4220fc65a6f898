//! Route definitions for the Merchant Stock Management platform

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Stock item management
        .nest("/stock", stock_routes())
        // Category management
        .nest("/categories", category_routes())
        // Order management
        .nest("/orders", order_routes())
        // Reservation session (the active order edit)
        .nest("/session", session_routes())
}

/// Stock item routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_items).post(handlers::create_stock_item),
        )
        .route(
            "/:item_id",
            get(handlers::get_stock_item)
                .put(handlers::update_stock_item)
                .delete(handlers::delete_stock_item),
        )
        // Explicit restock operations, separate from order allocation
        .route("/:item_id/adjust", post(handlers::adjust_stock_quantity))
        .route("/:item_id/quantity", put(handlers::set_stock_quantity))
        // Availability as seen by the active editing session
        .route("/:item_id/availability", get(handlers::get_stock_availability))
}

/// Category routes
fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/:category_id", delete(handlers::delete_category))
}

/// Order routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route(
            "/:order_id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/:order_id/status", post(handlers::update_order_status))
}

/// Reservation session routes
fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_session))
        .route("/begin", post(handlers::begin_session))
        .route("/allocations", post(handlers::stage_allocation))
        .route("/commit", post(handlers::commit_session))
        .route("/discard", post(handlers::discard_session))
}
