//! Authentication
//!
//! Handles:
//! - Signed session tokens
//! - Signed OAuth state tokens
//! - Authentication extractor

mod middleware;
pub mod session;
pub mod state;

pub use middleware::CurrentUser;
pub use session::{Session, create_session_token, verify_session_token};
pub use state::{StateClaims, create_state_token, verify_state_token};
