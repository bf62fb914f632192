//! API layer
//!
//! HTTP handlers for:
//! - Registration and login
//! - Posts, comments and likes
//! - Profiles and follows
//! - Messages and notifications
//! - Liveness and metrics (Prometheus)

mod auth;
mod dto;
mod messages;
pub mod metrics;
mod posts;
mod status;
mod users;

pub use dto::*;

pub use auth::auth_router;
pub use messages::messages_router;
pub use metrics::metrics_router;
pub use posts::posts_router;
pub use status::status_router;
pub use users::users_router;
