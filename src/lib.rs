//! # message-board
//!
//! REST backend for an append-only message board on PostgreSQL.
//!
//! A single endpoint, `/api/messages`, lists the most recent messages
//! (`GET`) and appends new ones (`POST`). Each request first passes a
//! bootstrap gate that creates the `messages` table once per process, then
//! is routed by method. Store handles are managed under one configurable
//! lifecycle policy: a process-wide shared handle, or a fresh handle per
//! operation.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── RequestDispatcher (api/)
//!     │       ├── SchemaBootstrapper (service/)
//!     │       └── MessageStore (service/)
//!     │
//!     ├── ConnectionManager + LifecyclePolicy (persistence/)
//!     │
//!     └── PostgreSQL (sqlx) | in-memory store
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
