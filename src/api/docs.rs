//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::handlers;

/// Generated OpenAPI description of every endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "message-board",
        description = "Append-only message board backed by PostgreSQL."
    ),
    paths(handlers::messages::messages_handler, handlers::system::health_handler),
    tags(
        (name = "Messages", description = "List and append messages"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;
