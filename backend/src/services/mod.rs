//! Business logic services for the Merchant Stock Management platform

pub mod order;
pub mod reservation;
pub mod stock;

pub use order::OrderService;
pub use reservation::ReservationService;
pub use stock::StockService;
