//! Message board endpoint: list and append.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::response::Response;
use axum::routing::any;

use crate::api::dto::CreateMessageRequest;
use crate::app_state::AppState;
use crate::domain::Message;
use crate::error::ErrorResponse;

/// `GET | POST /api/messages` — List recent messages or append one.
///
/// Every method is accepted here so that the dispatcher, not the router,
/// decides between routing and 405 after the bootstrap gate.
#[utoipa::path(
    method(get, post),
    path = "/api/messages",
    tag = "Messages",
    summary = "List or append messages",
    description = "`GET` returns the most recent messages, newest first. `POST` appends one message; the store assigns its id and timestamp.",
    request_body(content = CreateMessageRequest, description = "Required for POST"),
    responses(
        (status = 200, description = "Recent messages, newest first", body = Vec<Message>),
        (status = 201, description = "Message added"),
        (status = 400, description = "Missing, non-string, blank or over-long text", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn messages_handler(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Response {
    state.dispatcher.dispatch(&method, &body).await
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/messages", any(messages_handler))
}
