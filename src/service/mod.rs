//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Every mutating method commits to the primary store first, then hands the
//! committed row to the replica dispatcher.

mod account;
mod message;
mod post;

pub use account::{AccountService, FollowCounts};
pub use message::MessageService;
pub use post::{LikeSummary, PostDetail, PostService};

use crate::error::AppError;

/// Longest accepted comment or message body
pub const SHORT_TEXT_MAX_CHARS: usize = 140;
/// Longest accepted about-me text
pub const ABOUT_ME_MAX_CHARS: usize = 140;

/// Trim `value` and check it is non-empty and at most `max_chars` long.
fn require_text<'a>(field: &str, value: &'a str, max_chars: usize) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_trims_and_bounds() {
        assert_eq!(require_text("body", "  hi ", 140).unwrap(), "hi");
        assert!(require_text("body", "   ", 140).is_err());
        assert!(require_text("body", &"é".repeat(141), 140).is_err());
        assert!(require_text("body", &"é".repeat(140), 140).is_ok());
    }
}
