//! HTTP handlers for the Merchant Stock Management platform

pub mod health;
pub mod order;
pub mod reservation;
pub mod stock;

pub use health::*;
pub use order::*;
pub use reservation::*;
pub use stock::*;
