//! Message DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for `POST /api/messages`.
///
/// Only used for the OpenAPI document; the dispatcher reads the body as a
/// raw JSON value so that a non-string `text` is reported as a validation
/// error rather than a deserialization failure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    /// Message text, 1–255 characters after trimming.
    #[schema(example = "hello, board")]
    pub text: String,
}
