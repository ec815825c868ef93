//! Domain layer: the message entity and schema readiness state.

pub mod message;
pub mod schema_state;

pub use message::{MAX_TEXT_CHARS, Message, MessageText};
pub use schema_state::SchemaState;
