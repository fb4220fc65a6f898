//! Stock ledger service for stock items and categories
//!
//! Owns the durable records. `quantity_on_hand` changes only through the
//! reservation/reconciliation engine or through the explicit restock
//! operations here; the restock path is deliberately separate so a manual
//! stock count correction never interacts with pending order deltas.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Category, StockItem};
use shared::validation::{validate_money, validate_name, validate_stock_quantity};

/// Stock service for managing stock items and categories
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Row for stock item queries
#[derive(Debug, FromRow)]
struct StockItemRow {
    id: Uuid,
    name: String,
    quantity_on_hand: i32,
    price: Decimal,
    cost: Decimal,
    category_id: Option<Uuid>,
    notes: Option<String>,
    notes_th: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockItemRow> for StockItem {
    fn from(row: StockItemRow) -> Self {
        StockItem {
            id: row.id,
            name: row.name,
            quantity_on_hand: row.quantity_on_hand,
            price: row.price,
            cost: row.cost,
            category_id: row.category_id,
            notes: row.notes,
            notes_th: row.notes_th,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row for category queries
#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// Input for creating a stock item
#[derive(Debug, Deserialize)]
pub struct CreateStockItemInput {
    pub name: String,
    pub quantity_on_hand: Option<i64>,
    pub price: Decimal,
    pub cost: Decimal,
    pub category_id: Option<Uuid>,
    pub notes: Option<String>,
    pub notes_th: Option<String>,
}

/// Input for updating a stock item's metadata
///
/// Quantity is intentionally absent: it changes only through the engine or
/// the explicit restock operations.
#[derive(Debug, Deserialize)]
pub struct UpdateStockItemInput {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub clear_category: Option<bool>,
    pub notes: Option<String>,
    pub notes_th: Option<String>,
}

/// Input for a relative restock adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustQuantityInput {
    pub amount: i64,
}

/// Input for an absolute stock count correction
#[derive(Debug, Deserialize)]
pub struct SetQuantityInput {
    pub quantity: i64,
}

/// Input for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
}

/// Result of a restock operation
#[derive(Debug, Serialize)]
pub struct QuantityChange {
    pub stock_item_id: Uuid,
    pub quantity_on_hand: i64,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all stock items, ordered by name
    pub async fn list_items(&self) -> AppResult<Vec<StockItem>> {
        let rows = sqlx::query_as::<_, StockItemRow>(
            r#"
            SELECT id, name, quantity_on_hand, price, cost, category_id,
                   notes, notes_th, created_at, updated_at
            FROM stock_items
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a stock item by id
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<StockItem> {
        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            SELECT id, name, quantity_on_hand, price, cost, category_id,
                   notes, notes_th, created_at, updated_at
            FROM stock_items
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        Ok(row.into())
    }

    /// Create a stock item
    pub async fn create_item(&self, input: CreateStockItemInput) -> AppResult<StockItem> {
        if let Err(msg) = validate_name(&input.name) {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: msg.to_string(),
                message_th: "ชื่อสินค้าไม่ถูกต้อง".to_string(),
            });
        }

        let quantity = input.quantity_on_hand.unwrap_or(0);
        if let Err(msg) = validate_stock_quantity(quantity) {
            return Err(AppError::Validation {
                field: "quantity_on_hand".to_string(),
                message: msg.to_string(),
                message_th: "จำนวนสินค้าต้องไม่ติดลบ".to_string(),
            });
        }

        for (field, value) in [("price", input.price), ("cost", input.cost)] {
            if let Err(msg) = validate_money(value) {
                return Err(AppError::Validation {
                    field: field.to_string(),
                    message: msg.to_string(),
                    message_th: "ราคาต้องไม่ติดลบ".to_string(),
                });
            }
        }

        // Validate category exists if provided
        if let Some(category_id) = input.category_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)",
            )
            .bind(category_id)
            .fetch_one(&self.db)
            .await?;

            if !exists {
                return Err(AppError::NotFound("Category".to_string()));
            }
        }

        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            INSERT INTO stock_items (name, quantity_on_hand, price, cost, category_id, notes, notes_th)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, quantity_on_hand, price, cost, category_id,
                      notes, notes_th, created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(quantity as i32)
        .bind(input.price)
        .bind(input.cost)
        .bind(input.category_id)
        .bind(&input.notes)
        .bind(&input.notes_th)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Update a stock item's metadata
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateStockItemInput,
    ) -> AppResult<StockItem> {
        let existing = self.get_item(item_id).await?;

        let name = input.name.unwrap_or(existing.name);
        if let Err(msg) = validate_name(&name) {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: msg.to_string(),
                message_th: "ชื่อสินค้าไม่ถูกต้อง".to_string(),
            });
        }

        let price = input.price.unwrap_or(existing.price);
        let cost = input.cost.unwrap_or(existing.cost);
        for (field, value) in [("price", price), ("cost", cost)] {
            if let Err(msg) = validate_money(value) {
                return Err(AppError::Validation {
                    field: field.to_string(),
                    message: msg.to_string(),
                    message_th: "ราคาต้องไม่ติดลบ".to_string(),
                });
            }
        }

        let category_id = if input.clear_category.unwrap_or(false) {
            None
        } else {
            match input.category_id {
                Some(category_id) => {
                    let exists = sqlx::query_scalar::<_, bool>(
                        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)",
                    )
                    .bind(category_id)
                    .fetch_one(&self.db)
                    .await?;

                    if !exists {
                        return Err(AppError::NotFound("Category".to_string()));
                    }
                    Some(category_id)
                }
                None => existing.category_id,
            }
        };

        let notes = input.notes.or(existing.notes);
        let notes_th = input.notes_th.or(existing.notes_th);

        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            UPDATE stock_items
            SET name = $1, price = $2, cost = $3, category_id = $4,
                notes = $5, notes_th = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING id, name, quantity_on_hand, price, cost, category_id,
                      notes, notes_th, created_at, updated_at
            "#,
        )
        .bind(name.trim())
        .bind(price)
        .bind(cost)
        .bind(category_id)
        .bind(&notes)
        .bind(&notes_th)
        .bind(item_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Delete a stock item
    ///
    /// Order lines referencing the item keep their history with a NULL
    /// reference; reconciliation skips such lines.
    pub async fn delete_item(&self, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM stock_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Stock item".to_string()));
        }

        tracing::info!(%item_id, "stock item deleted");
        Ok(())
    }

    /// Adjust a stock quantity by a signed amount (explicit restock path)
    ///
    /// Floored at 0. Does not touch pending order deltas.
    pub async fn adjust_quantity(&self, item_id: Uuid, amount: i64) -> AppResult<QuantityChange> {
        let quantity = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE stock_items
            SET quantity_on_hand = GREATEST(0, quantity_on_hand + $1), updated_at = NOW()
            WHERE id = $2
            RETURNING quantity_on_hand
            "#,
        )
        .bind(amount as i32)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        tracing::info!(%item_id, amount, quantity, "stock quantity adjusted");
        Ok(QuantityChange {
            stock_item_id: item_id,
            quantity_on_hand: i64::from(quantity),
        })
    }

    /// Set a stock quantity to an absolute value (explicit restock path)
    pub async fn set_quantity(&self, item_id: Uuid, quantity: i64) -> AppResult<QuantityChange> {
        if let Err(msg) = validate_stock_quantity(quantity) {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
                message_th: "จำนวนสินค้าต้องไม่ติดลบ".to_string(),
            });
        }

        let quantity = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE stock_items
            SET quantity_on_hand = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING quantity_on_hand
            "#,
        )
        .bind(quantity as i32)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        tracing::info!(%item_id, quantity, "stock quantity set");
        Ok(QuantityChange {
            stock_item_id: item_id,
            quantity_on_hand: i64::from(quantity),
        })
    }

    /// List all categories
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a category
    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<Category> {
        if let Err(msg) = validate_name(&input.name) {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: msg.to_string(),
                message_th: "ชื่อหมวดหมู่ไม่ถูกต้อง".to_string(),
            });
        }

        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Delete a category (stock items keep a NULL category)
    pub async fn delete_category(&self, category_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category".to_string()));
        }

        Ok(())
    }
}
