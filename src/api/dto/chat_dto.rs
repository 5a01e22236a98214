//! Request/response types for the chat REST endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ChatError;

/// Body of `POST /api/v1/moderate` and `POST /api/v1/summarize`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TextRequest {
    /// Text to process.
    pub text: String,
}

/// Moderation verdict.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModerateResponse {
    /// `true` when the text may be broadcast.
    pub safe: bool,
    /// Rejection reason, empty when safe.
    pub reason: String,
}

/// Bullet-point summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct SummarizeResponse {
    /// Summary text or placeholder.
    pub summary: String,
}

/// Body of `POST /api/v1/topic`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TopicRequest {
    /// Debate topic.
    pub topic: String,
}

/// Opening question that was broadcast to the room.
#[derive(Debug, Serialize, ToSchema)]
pub struct TopicResponse {
    /// Topic as submitted.
    pub topic: String,
    /// Generated or templated question.
    pub question: String,
    /// Number of connections the question was delivered to.
    pub recipients: usize,
    /// When the broadcast was issued.
    pub broadcast_at: DateTime<Utc>,
}

/// Live connection count.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionsResponse {
    /// Number of registered connections.
    pub count: usize,
}

/// Rejects blank input, returning the trimmed value otherwise.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] naming `field` when `value` is
/// blank.
pub fn non_blank<'a>(field: &str, value: &'a str) -> Result<&'a str, ChatError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_rejected() {
        assert!(matches!(
            non_blank("text", "  "),
            Err(ChatError::InvalidRequest(_))
        ));
        assert!(matches!(non_blank("text", " hi "), Ok("hi")));
    }
}
