//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::api::RequestDispatcher;
use crate::domain::SchemaState;
use crate::persistence::ConnectionManager;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Dispatcher for `/api/messages`.
    pub dispatcher: Arc<RequestDispatcher>,
    /// Connection manager, kept for shutdown and health reporting.
    pub connections: Arc<ConnectionManager>,
}

impl AppState {
    /// Builds the state for one server: a fresh [`SchemaState`] and a
    /// dispatcher over `connections`.
    #[must_use]
    pub fn new(connections: Arc<ConnectionManager>, list_limit: u32) -> Self {
        let dispatcher = RequestDispatcher::new(
            Arc::clone(&connections),
            Arc::new(SchemaState::new()),
            list_limit,
        );
        Self {
            dispatcher: Arc::new(dispatcher),
            connections,
        }
    }
}
