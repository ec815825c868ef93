//! Validated reads and appends against the `messages` table.

use std::sync::Arc;

use crate::domain::{Message, MessageText};
use crate::error::BoardError;
use crate::persistence::ConnectionManager;

/// Append-only message store.
///
/// Every operation acquires a handle, runs exactly one statement, and
/// releases the handle before inspecting the result.
#[derive(Debug, Clone)]
pub struct MessageStore {
    connections: Arc<ConnectionManager>,
}

impl MessageStore {
    /// Creates a store on top of the given connection manager.
    #[must_use]
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Returns up to `limit` messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Connection`] if no handle could be acquired
    /// and [`BoardError::Query`] if the select failed.
    pub async fn list(&self, limit: u32) -> Result<Vec<Message>, BoardError> {
        let lease = self.connections.acquire().await?;
        let result = lease.handle().select_recent(limit).await;
        self.connections.release(lease).await;

        let messages = result.map_err(BoardError::Query)?;
        tracing::debug!(count = messages.len(), limit, "listed messages");
        Ok(messages)
    }

    /// Validates and appends one message.
    ///
    /// `text` is the raw JSON value of the request's `text` field.
    /// Validation happens before any handle is acquired.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Validation`] for missing, non-string, blank or
    /// over-long text, [`BoardError::Connection`] if no handle could be
    /// acquired, and [`BoardError::Query`] if the insert failed.
    pub async fn append(&self, text: Option<&serde_json::Value>) -> Result<(), BoardError> {
        let text = MessageText::parse(text)?;
        self.append_text(&text).await
    }

    /// Appends already-validated text.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Connection`] if no handle could be acquired
    /// and [`BoardError::Query`] if the insert failed.
    pub async fn append_text(&self, text: &MessageText) -> Result<(), BoardError> {
        let lease = self.connections.acquire().await?;
        let result = lease.handle().insert_message(text).await;
        self.connections.release(lease).await;

        result.map_err(BoardError::Query)?;
        tracing::info!(chars = text.as_str().chars().count(), "message added");
        Ok(())
    }
}
