//! Request dispatcher for `/api/messages`.
//!
//! Every invocation passes two gates in order:
//!
//! 1. **Bootstrap gate**: if the schema is not known to exist yet, run
//!    [`SchemaBootstrapper::ensure_schema`]. A failure short-circuits with
//!    a 500 and leaves the flag unset so the next request retries.
//! 2. **Method routing**: `GET` lists, `POST` appends, anything else is
//!    405.
//!
//! Errors become HTTP responses here and nowhere else.

use std::sync::Arc;

use axum::Json;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::domain::SchemaState;
use crate::error::BoardError;
use crate::persistence::ConnectionManager;
use crate::service::{MessageStore, SchemaBootstrapper};

/// Gates traffic behind the schema bootstrap and routes by method.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    bootstrapper: SchemaBootstrapper,
    store: MessageStore,
    list_limit: u32,
}

impl RequestDispatcher {
    /// Creates a dispatcher over one connection manager and readiness flag.
    #[must_use]
    pub fn new(
        connections: Arc<ConnectionManager>,
        state: Arc<SchemaState>,
        list_limit: u32,
    ) -> Self {
        Self {
            bootstrapper: SchemaBootstrapper::new(Arc::clone(&connections), state),
            store: MessageStore::new(connections),
            list_limit,
        }
    }

    /// Returns the schema readiness flag.
    #[must_use]
    pub fn schema_state(&self) -> &Arc<SchemaState> {
        self.bootstrapper.state()
    }

    /// Handles one request and produces exactly one response.
    pub async fn dispatch(&self, method: &Method, body: &[u8]) -> Response {
        match self.route(method, body).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    async fn route(&self, method: &Method, body: &[u8]) -> Result<Response, BoardError> {
        if !self.bootstrapper.state().is_ready() {
            self.bootstrapper.ensure_schema().await?;
        }

        match *method {
            Method::GET => {
                let messages = self.store.list(self.list_limit).await?;
                Ok((StatusCode::OK, Json(messages)).into_response())
            }
            Method::POST => {
                let payload = parse_body(body)?;
                self.store.append(payload.get("text")).await?;
                Ok(StatusCode::CREATED.into_response())
            }
            _ => Err(BoardError::MethodNotAllowed(method.clone())),
        }
    }
}

fn parse_body(body: &[u8]) -> Result<serde_json::Value, BoardError> {
    serde_json::from_slice(body)
        .map_err(|e| BoardError::Validation(format!("request body is not valid JSON: {e}")))
}
