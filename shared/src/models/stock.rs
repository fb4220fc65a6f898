//! Stock item models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stock item tracked by the merchant
///
/// `quantity_on_hand` is the durable on-hand count. It is mutated only by the
/// reservation/reconciliation engine and by the explicit restock operations,
/// never written directly from order edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub id: Uuid,
    pub name: String,
    pub quantity_on_hand: i32,
    /// Selling price per unit
    pub price: Decimal,
    /// Acquisition cost per unit
    pub cost: Decimal,
    pub category_id: Option<Uuid>,
    pub notes: Option<String>,
    pub notes_th: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Profit margin per unit (price - cost)
    pub fn unit_margin(&self) -> Decimal {
        self.price - self.cost
    }
}
