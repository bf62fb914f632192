//! Data layer module
//!
//! Handles primary-store persistence:
//! - SQLite database operations
//! - Entity models shared with the replica and snapshot layers

mod database;
mod models;

pub use database::Database;
pub use models::*;
