//! Persistence layer: store handles and their lifecycle.
//!
//! The [`Connector`] / [`StoreHandle`] traits abstract the single
//! `messages` table. [`ConnectionManager`] applies the configured
//! [`LifecyclePolicy`] on top of a connector. Two backends exist:
//! PostgreSQL via `sqlx` and an in-memory store.

pub mod connection;
pub mod memory;
pub mod postgres;

pub use connection::{ConnectionManager, Connector, Lease, LifecyclePolicy, StoreHandle};
pub use memory::{MemoryDatabase, TableLock};
pub use postgres::{PgConnector, PgStore};
