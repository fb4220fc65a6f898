//! Order and order item models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer order composed of stock items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    pub platform: SalesPlatform,
    pub customer_name: Option<String>,
    pub order_date: NaiveDate,
    pub notes: Option<String>,
    pub notes_th: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line in an order referencing a stock item
///
/// `stock_item_id` is nullable: the referenced item may have been deleted
/// after the order was saved. Reconciliation skips such lines and reports
/// them instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub stock_item_id: Option<Uuid>,
    /// Quantity committed by this order, always positive
    pub quantity: i32,
    /// Unit price captured at the time of sale
    pub unit_price: Decimal,
    /// Stable position of the line within the order
    pub position: i32,
}

/// Order lifecycle status
///
/// Orders move forward through pending -> paid -> shipped -> completed.
/// `canceled` is reachable from any non-terminal status and releases the
/// order's stock commitment. `completed` and `canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "shipped" => Some(OrderStatus::Shipped),
            "completed" => Some(OrderStatus::Completed),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }

    /// Whether the order still holds a stock commitment in this status
    pub fn holds_stock(&self) -> bool {
        !matches!(self, OrderStatus::Canceled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// Whether a transition from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Paid) | (Paid, Shipped) | (Shipped, Completed) => true,
            (Pending | Paid | Shipped, Canceled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sales channel the order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesPlatform {
    Storefront,
    Shopee,
    Lazada,
    Line,
    Instagram,
    Facebook,
    Other,
}

impl SalesPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesPlatform::Storefront => "storefront",
            SalesPlatform::Shopee => "shopee",
            SalesPlatform::Lazada => "lazada",
            SalesPlatform::Line => "line",
            SalesPlatform::Instagram => "instagram",
            SalesPlatform::Facebook => "facebook",
            SalesPlatform::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "storefront" => Some(SalesPlatform::Storefront),
            "shopee" => Some(SalesPlatform::Shopee),
            "lazada" => Some(SalesPlatform::Lazada),
            "line" => Some(SalesPlatform::Line),
            "instagram" => Some(SalesPlatform::Instagram),
            "facebook" => Some(SalesPlatform::Facebook),
            "other" => Some(SalesPlatform::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for SalesPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
