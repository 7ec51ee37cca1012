//! Data layer module
//!
//! Handles all data persistence:
//! - Users
//! - Connected provider accounts
//! - Posts and windowed engagement aggregates

mod database;
mod models;

pub use database::{DEFAULT_POST_LIMIT, Database, MAX_POST_LIMIT};
pub use models::*;
