//! Service layer: schema bootstrap and the message store.

pub mod bootstrap;
pub mod message_store;

pub use bootstrap::SchemaBootstrapper;
pub use message_store::MessageStore;
