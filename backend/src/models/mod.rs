//! Database models for the Merchant Stock Management platform
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
