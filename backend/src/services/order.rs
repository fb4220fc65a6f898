//! Order service and stock reconciler
//!
//! Translates the difference between an order's previous item list and its
//! newly edited list into stock ledger mutations, applied as one coherent
//! diff inside a single transaction. Deleting or canceling an order restores
//! its full commitment. Lines whose stock item has been deleted are skipped
//! and reported, never silently dropped.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Order, OrderItem, OrderStatus, SalesPlatform};
use shared::allocation::{self, ItemQuantity};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{validate_customer_name, validate_order_quantity};

/// Order service for managing orders and reconciling their stock effect
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

/// Row for order queries
#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    status: String,
    platform: String,
    customer_name: Option<String>,
    order_date: NaiveDate,
    notes: Option<String>,
    notes_th: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_model(self) -> AppResult<Order> {
        let status = OrderStatus::from_str(&self.status)
            .ok_or_else(|| anyhow::anyhow!("unknown order status: {}", self.status))?;
        let platform = SalesPlatform::from_str(&self.platform)
            .ok_or_else(|| anyhow::anyhow!("unknown sales platform: {}", self.platform))?;

        Ok(Order {
            id: self.id,
            status,
            platform,
            customer_name: self.customer_name,
            order_date: self.order_date,
            notes: self.notes,
            notes_th: self.notes_th,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row for order item queries
#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    stock_item_id: Option<Uuid>,
    quantity: i32,
    unit_price: Decimal,
    position: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            stock_item_id: row.stock_item_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            position: row.position,
        }
    }
}

/// One line of an order as submitted by the caller
#[derive(Debug, Deserialize)]
pub struct OrderItemInput {
    pub stock_item_id: Uuid,
    pub quantity: i64,
    /// Defaults to the stock item's current price
    pub unit_price: Option<Decimal>,
}

/// Input for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub platform: SalesPlatform,
    pub customer_name: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub notes_th: Option<String>,
    pub items: Vec<OrderItemInput>,
}

/// Input for updating an order; `items` replaces the full line list
#[derive(Debug, Deserialize)]
pub struct UpdateOrderInput {
    pub platform: Option<SalesPlatform>,
    pub customer_name: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub notes_th: Option<String>,
    pub items: Vec<OrderItemInput>,
}

/// Input for a status transition
#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
}

/// Filter for listing orders
#[derive(Debug, Default)]
pub struct OrderListFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: Option<OrderStatus>,
    pub platform: Option<SalesPlatform>,
}

/// An order with its lines
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// One stock mutation applied by a reconciliation
///
/// `delta` is the net quantity subtracted from stock; negative deltas are
/// restorations.
#[derive(Debug, Serialize)]
pub struct StockAdjustment {
    pub stock_item_id: Uuid,
    pub delta: i64,
    pub quantity_on_hand: i64,
}

/// Outcome of reconciling an order save, deletion or cancellation
#[derive(Debug, Serialize)]
pub struct ReconciliationReport {
    pub adjustments: Vec<StockAdjustment>,
    /// Item ids that no longer exist in the stock ledger; skipped
    pub missing: Vec<Uuid>,
    /// Lines whose stock item reference is gone (NULL); skipped
    pub orphaned_lines: u64,
}

impl ReconciliationReport {
    fn empty() -> Self {
        Self {
            adjustments: Vec::new(),
            missing: Vec::new(),
            orphaned_lines: 0,
        }
    }
}

/// An order save together with its stock effect
#[derive(Debug, Serialize)]
pub struct SavedOrder {
    pub order: OrderWithItems,
    pub reconciliation: ReconciliationReport,
}

/// An order deletion together with its stock restoration
#[derive(Debug, Serialize)]
pub struct DeletedOrder {
    pub order_id: Uuid,
    pub reconciliation: ReconciliationReport,
}

/// A status transition together with any stock restoration it caused
#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub order: Order,
    pub reconciliation: ReconciliationReport,
}

/// Stock item fields needed while reconciling
struct ItemInfo {
    name: String,
    quantity_on_hand: i64,
    price: Decimal,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List orders, newest first, with optional date/status/platform filter
    pub async fn list_orders(
        &self,
        filter: OrderListFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Order>> {
        let total_items = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM orders
            WHERE ($1::DATE IS NULL OR order_date >= $1)
              AND ($2::DATE IS NULL OR order_date <= $2)
              AND ($3::VARCHAR IS NULL OR status = $3)
              AND ($4::VARCHAR IS NULL OR platform = $4)
            "#,
        )
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.platform.map(|p| p.as_str()))
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, status, platform, customer_name, order_date, notes, notes_th,
                   created_at, updated_at
            FROM orders
            WHERE ($1::DATE IS NULL OR order_date >= $1)
              AND ($2::DATE IS NULL OR order_date <= $2)
              AND ($3::VARCHAR IS NULL OR status = $3)
              AND ($4::VARCHAR IS NULL OR platform = $4)
            ORDER BY order_date DESC, created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.platform.map(|p| p.as_str()))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(OrderRow::into_model)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            pagination: PaginationMeta::new(&pagination, total_items as u64),
            data,
        })
    }

    /// Get an order with its lines
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderWithItems> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, status, platform, customer_name, order_date, notes, notes_th,
                   created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, stock_item_id, quantity, unit_price, position
            FROM order_items
            WHERE order_id = $1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(OrderWithItems {
            order: row.into_model()?,
            items: items.into_iter().map(Into::into).collect(),
        })
    }

    /// Create an order and subtract its stock commitment atomically
    pub async fn create_order(&self, input: CreateOrderInput) -> AppResult<SavedOrder> {
        Self::validate_input(&input.items, input.customer_name.as_deref())?;

        let order_date = input
            .order_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let info = Self::load_item_info(&mut tx, &input.items).await?;
        let new_lines = Self::to_lines(&input.items);

        // old = [] for a brand-new order; the diff is just the new totals
        let diff = allocation::diff_order_items(&[], &new_lines);
        Self::check_availability(
            &diff,
            &allocation::aggregate_quantities(&new_lines),
            &HashMap::new(),
            &info,
        )?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders (status, platform, customer_name, order_date, notes, notes_th)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(OrderStatus::Pending.as_str())
        .bind(input.platform.as_str())
        .bind(&input.customer_name)
        .bind(order_date)
        .bind(&input.notes)
        .bind(&input.notes_th)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_lines(&mut tx, order_id, &input.items, &info).await?;
        let reconciliation = Self::apply_diff(&mut tx, &diff, 0).await?;

        tx.commit().await?;

        tracing::info!(%order_id, lines = input.items.len(), "order created");
        Ok(SavedOrder {
            order: self.get_order(order_id).await?,
            reconciliation,
        })
    }

    /// Save an edited order, applying the net stock diff atomically
    pub async fn update_order(
        &self,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> AppResult<SavedOrder> {
        Self::validate_input(&input.items, input.customer_name.as_deref())?;

        let existing = self.get_order(order_id).await?;
        if !existing.order.status.holds_stock() {
            return Err(AppError::InvalidStateTransition(
                "canceled orders cannot be edited".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let old_lines: Vec<ItemQuantity> =
            existing.items.iter().map(ItemQuantity::from).collect();
        let orphaned_lines = old_lines
            .iter()
            .filter(|line| line.stock_item_id.is_none())
            .count() as u64;

        let info = Self::load_item_info(&mut tx, &input.items).await?;
        let new_lines = Self::to_lines(&input.items);

        let old_totals: HashMap<Uuid, i64> = allocation::aggregate_quantities(&old_lines)
            .into_iter()
            .collect();
        let diff = allocation::diff_order_items(&old_lines, &new_lines);
        Self::check_availability(
            &diff,
            &allocation::aggregate_quantities(&new_lines),
            &old_totals,
            &info,
        )?;

        let platform = input.platform.unwrap_or(existing.order.platform);
        let customer_name = input.customer_name.or(existing.order.customer_name);
        let order_date = input.order_date.unwrap_or(existing.order.order_date);
        let notes = input.notes.or(existing.order.notes);
        let notes_th = input.notes_th.or(existing.order.notes_th);

        sqlx::query(
            r#"
            UPDATE orders
            SET platform = $1, customer_name = $2, order_date = $3,
                notes = $4, notes_th = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(platform.as_str())
        .bind(&customer_name)
        .bind(order_date)
        .bind(&notes)
        .bind(&notes_th)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        // Replace the line rows; the stock effect is the coherent diff,
        // not the row churn
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_lines(&mut tx, order_id, &input.items, &info).await?;

        let reconciliation = Self::apply_diff(&mut tx, &diff, orphaned_lines).await?;

        tx.commit().await?;

        tracing::info!(%order_id, adjustments = reconciliation.adjustments.len(), "order saved");
        Ok(SavedOrder {
            order: self.get_order(order_id).await?,
            reconciliation,
        })
    }

    /// Delete an order, restoring its stock commitment unless it was
    /// already released by cancellation
    pub async fn delete_order(&self, order_id: Uuid) -> AppResult<DeletedOrder> {
        let existing = self.get_order(order_id).await?;

        let mut tx = self.db.begin().await?;

        let reconciliation = if existing.order.status.holds_stock() {
            Self::restore_stock(&mut tx, &existing.items).await?
        } else {
            ReconciliationReport::empty()
        };

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%order_id, restored = reconciliation.adjustments.len(), "order deleted");
        Ok(DeletedOrder {
            order_id,
            reconciliation,
        })
    }

    /// Transition an order's status; canceling restores its stock
    pub async fn update_status(
        &self,
        order_id: Uuid,
        input: UpdateStatusInput,
    ) -> AppResult<StatusChange> {
        let existing = self.get_order(order_id).await?;
        let current = existing.order.status;

        if !current.can_transition_to(input.status) {
            return Err(AppError::InvalidStateTransition(format!(
                "{} -> {}",
                current, input.status
            )));
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(input.status.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        let reconciliation = if input.status == OrderStatus::Canceled {
            Self::restore_stock(&mut tx, &existing.items).await?
        } else {
            ReconciliationReport::empty()
        };

        tx.commit().await?;

        tracing::info!(%order_id, status = %input.status, "order status updated");
        Ok(StatusChange {
            order: self.get_order(order_id).await?.order,
            reconciliation,
        })
    }

    // ------------------------------------------------------------------
    // Reconciliation internals
    // ------------------------------------------------------------------

    /// Restore the full commitment of an order's lines
    /// (`quantity_on_hand += quantity` per line with a live item)
    async fn restore_stock(
        tx: &mut Transaction<'_, Postgres>,
        items: &[OrderItem],
    ) -> AppResult<ReconciliationReport> {
        let lines: Vec<ItemQuantity> = items.iter().map(ItemQuantity::from).collect();
        let orphaned_lines = lines
            .iter()
            .filter(|line| line.stock_item_id.is_none())
            .count() as u64;
        if orphaned_lines > 0 {
            tracing::warn!(orphaned_lines, "order lines without a stock item skipped in restore");
        }

        // Restoration is the inverse diff: subtract nothing, give back all
        let diff: BTreeMap<Uuid, i64> =
            allocation::aggregate_quantities(&lines)
                .into_iter()
                .map(|(id, quantity)| (id, -quantity))
                .collect();

        Self::apply_diff(tx, &diff, orphaned_lines).await
    }

    /// Apply a net stock diff inside the caller's transaction
    ///
    /// Positive deltas subtract, negative deltas restore; every update is
    /// floored at 0. Items that vanished are skipped and reported.
    async fn apply_diff(
        tx: &mut Transaction<'_, Postgres>,
        diff: &BTreeMap<Uuid, i64>,
        orphaned_lines: u64,
    ) -> AppResult<ReconciliationReport> {
        let mut adjustments = Vec::new();
        let mut missing = Vec::new();

        for (item_id, delta) in diff {
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
            .fetch_optional(&mut **tx)
            .await?;

            match quantity {
                Some(quantity) => adjustments.push(StockAdjustment {
                    stock_item_id: *item_id,
                    delta: *delta,
                    quantity_on_hand: i64::from(quantity),
                }),
                None => {
                    tracing::warn!(item_id = %item_id, delta, "stock item missing during reconciliation, skipping");
                    missing.push(*item_id);
                }
            }
        }

        Ok(ReconciliationReport {
            adjustments,
            missing,
            orphaned_lines,
        })
    }

    // ------------------------------------------------------------------
    // Private helpers
    // ------------------------------------------------------------------

    fn validate_input(items: &[OrderItemInput], customer_name: Option<&str>) -> AppResult<()> {
        if items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "An order must contain at least one item".to_string(),
                message_th: "ออเดอร์ต้องมีสินค้าอย่างน้อย 1 รายการ".to_string(),
            });
        }

        for item in items {
            if let Err(msg) = validate_order_quantity(item.quantity) {
                return Err(AppError::Validation {
                    field: "quantity".to_string(),
                    message: msg.to_string(),
                    message_th: "จำนวนต้องมากกว่า 0".to_string(),
                });
            }
        }

        if let Some(name) = customer_name {
            if let Err(msg) = validate_customer_name(name) {
                return Err(AppError::Validation {
                    field: "customer_name".to_string(),
                    message: msg.to_string(),
                    message_th: "ชื่อลูกค้ายาวเกินไป".to_string(),
                });
            }
        }

        Ok(())
    }

    fn to_lines(items: &[OrderItemInput]) -> Vec<ItemQuantity> {
        items
            .iter()
            .map(|item| ItemQuantity {
                stock_item_id: Some(item.stock_item_id),
                quantity: item.quantity,
            })
            .collect()
    }

    /// Load name/quantity/price for every distinct referenced stock item
    async fn load_item_info(
        tx: &mut Transaction<'_, Postgres>,
        items: &[OrderItemInput],
    ) -> AppResult<HashMap<Uuid, ItemInfo>> {
        let mut info = HashMap::new();
        for item in items {
            if info.contains_key(&item.stock_item_id) {
                continue;
            }
            let row = sqlx::query_as::<_, (String, i32, Decimal)>(
                "SELECT name, quantity_on_hand, price FROM stock_items WHERE id = $1",
            )
            .bind(item.stock_item_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

            info.insert(
                item.stock_item_id,
                ItemInfo {
                    name: row.0,
                    quantity_on_hand: i64::from(row.1),
                    price: row.2,
                },
            );
        }
        Ok(info)
    }

    /// Reject any net-positive diff entry that exceeds on-hand stock
    fn check_availability(
        diff: &BTreeMap<Uuid, i64>,
        new_totals: &BTreeMap<Uuid, i64>,
        old_totals: &HashMap<Uuid, i64>,
        info: &HashMap<Uuid, ItemInfo>,
    ) -> AppResult<()> {
        for (item_id, net) in diff {
            if *net <= 0 {
                continue;
            }
            let Some(item) = info.get(item_id) else {
                continue;
            };
            if *net > item.quantity_on_hand {
                let old = old_totals.get(item_id).copied().unwrap_or(0);
                return Err(AppError::InsufficientStock {
                    item: item.name.clone(),
                    requested: new_totals.get(item_id).copied().unwrap_or(*net),
                    available: item.quantity_on_hand + old,
                });
            }
        }
        Ok(())
    }

    async fn insert_lines(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        items: &[OrderItemInput],
        info: &HashMap<Uuid, ItemInfo>,
    ) -> AppResult<()> {
        for (position, item) in items.iter().enumerate() {
            let unit_price = item.unit_price.unwrap_or_else(|| {
                info.get(&item.stock_item_id)
                    .map(|i| i.price)
                    .unwrap_or(Decimal::ZERO)
            });

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, stock_item_id, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(item.stock_item_id)
            .bind(item.quantity as i32)
            .bind(unit_price)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
