//! Shared types and models for the Merchant Stock Management platform
//!
//! This crate contains the domain models, the pure allocation arithmetic of
//! the inventory reservation engine, and validation helpers shared between
//! the backend and other components of the system.

pub mod allocation;
pub mod models;
pub mod types;
pub mod validation;

pub use allocation::*;
pub use models::*;
pub use types::*;
pub use validation::*;
