//! Message entity and validated message text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::BoardError;

/// Maximum length of a message, in characters, after trimming.
pub const MAX_TEXT_CHARS: usize = 255;

/// A persisted row of the `messages` table.
///
/// Rows are append-only: `id` and `timestamp` are assigned by the store at
/// insert time and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    /// Store-assigned identifier, strictly increasing per insert.
    pub id: i32,
    /// Message body, 1–255 characters.
    pub text: String,
    /// Store-assigned creation time.
    pub timestamp: DateTime<Utc>,
}

/// Text of a new message that has passed validation.
///
/// The only way to obtain one is [`MessageText::parse`] (or its
/// `TryFrom` impls), so holding a `MessageText` means the value is trimmed,
/// non-empty and within [`MAX_TEXT_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageText(String);

impl MessageText {
    /// Validates a raw JSON value as message text.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Validation`] if the value is missing, not a
    /// string, blank after trimming, or longer than [`MAX_TEXT_CHARS`].
    pub fn parse(value: Option<&serde_json::Value>) -> Result<Self, BoardError> {
        match value {
            None | Some(serde_json::Value::Null) => Err(BoardError::Validation(
                "missing \"text\" in request body".to_string(),
            )),
            Some(serde_json::Value::String(s)) => Self::try_from(s.as_str()),
            Some(_) => Err(BoardError::Validation(
                "\"text\" must be a string".to_string(),
            )),
        }
    }

    /// Returns the trimmed text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for MessageText {
    type Error = BoardError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BoardError::Validation(
                "\"text\" must not be empty".to_string(),
            ));
        }
        let len = trimmed.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(BoardError::Validation(format!(
                "\"text\" is {len} characters; at most {MAX_TEXT_CHARS} allowed"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<&serde_json::Value> for MessageText {
    type Error = BoardError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Self::parse(Some(value))
    }
}
