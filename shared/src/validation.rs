//! Validation utilities for the Merchant Stock Management platform

use rust_decimal::Decimal;

/// Validate a stock item or category name
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name must not be empty");
    }
    if trimmed.len() > 120 {
        return Err("Name must be at most 120 characters");
    }
    Ok(())
}

/// Validate an order line quantity (strictly positive)
pub fn validate_order_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than 0");
    }
    Ok(())
}

/// Validate an absolute stock quantity (zero allowed, negative not)
pub fn validate_stock_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Validate a price or cost value
pub fn validate_money(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate a customer name (optional field, but bounded when present)
pub fn validate_customer_name(name: &str) -> Result<(), &'static str> {
    if name.len() > 200 {
        return Err("Customer name must be at most 200 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn accepts_normal_name() {
        assert!(validate_name("เสื้อยืดลายแมว M").is_ok());
    }

    #[test]
    fn order_quantity_must_be_positive() {
        assert!(validate_order_quantity(0).is_err());
        assert!(validate_order_quantity(-1).is_err());
        assert!(validate_order_quantity(1).is_ok());
    }

    #[test]
    fn stock_quantity_allows_zero() {
        assert!(validate_stock_quantity(0).is_ok());
        assert!(validate_stock_quantity(-1).is_err());
    }

    #[test]
    fn money_cannot_be_negative() {
        assert!(validate_money(Decimal::new(-1, 2)).is_err());
        assert!(validate_money(Decimal::ZERO).is_ok());
    }
}
