//! Authentication
//!
//! Handles:
//! - Password hashing
//! - Signed session tokens
//! - The current-user extractor

mod middleware;
pub mod password;
pub mod session;

pub use middleware::{CurrentUser, SESSION_COOKIE};
pub use password::{hash_password, verify_password};
pub use session::{Session, create_session_token, verify_session_token};
