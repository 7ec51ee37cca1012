//! API layer
//!
//! HTTP handlers for:
//! - Instagram connection (connect, callback, refresh, posts, disconnect)
//! - Growth statistics
//! - Metrics (Prometheus)

mod dto;
mod growth;
mod instagram;
pub mod metrics;

pub use dto::*;

pub use growth::growth_router;
pub use instagram::{callback_router, instagram_router};
pub use metrics::metrics_router;
