//! PostgreSQL implementation of the store seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::connection::{Connector, LifecyclePolicy, StoreHandle};
use crate::config::BoardConfig;
use crate::domain::{Message, MessageText};
use crate::error::StoreFailure;

/// DDL for the only table this service owns.
pub const CREATE_MESSAGES_TABLE: &str = "CREATE TABLE IF NOT EXISTS messages (\
     id SERIAL PRIMARY KEY, \
     text VARCHAR(255) NOT NULL, \
     timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()\
     )";

const SELECT_RECENT: &str = "SELECT id, text, timestamp FROM messages \
     ORDER BY timestamp DESC, id DESC LIMIT $1";

const INSERT_MESSAGE: &str = "INSERT INTO messages (text) VALUES ($1)";

/// SQLSTATEs PostgreSQL raises when two sessions race the same
/// `CREATE TABLE IF NOT EXISTS`: `duplicate_table`, and `unique_violation`
/// on the `pg_type` catalog.
const DUPLICATE_CREATION_CODES: [&str; 2] = ["42P07", "23505"];

/// Opens `sqlx` connection pools against a PostgreSQL URL.
#[derive(Debug, Clone)]
pub struct PgConnector {
    database_url: String,
    max_connections: u32,
    connect_timeout: Duration,
}

impl PgConnector {
    /// Creates a connector.
    #[must_use]
    pub fn new(database_url: String, max_connections: u32, connect_timeout: Duration) -> Self {
        Self {
            database_url,
            max_connections: max_connections.max(1),
            connect_timeout,
        }
    }

    /// Builds a connector sized for the configured lifecycle policy.
    ///
    /// An ephemeral handle serves a single operation, so its pool holds one
    /// connection.
    #[must_use]
    pub fn from_config(config: &BoardConfig) -> Self {
        let max_connections = match config.connection_policy {
            LifecyclePolicy::Singleton => config.database_max_connections,
            LifecyclePolicy::Ephemeral => 1,
        };
        Self::new(
            config.database_url.clone(),
            max_connections,
            Duration::from_secs(config.database_connect_timeout_secs),
        )
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<Arc<dyn StoreHandle>, StoreFailure> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(&self.database_url)
            .await?;
        Ok(Arc::new(PgStore::new(pool)))
    }
}

/// PostgreSQL-backed store handle using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_duplicate_creation_code(code: Option<&str>) -> bool {
    code.is_some_and(|code| DUPLICATE_CREATION_CODES.contains(&code))
}

fn is_duplicate_creation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => is_duplicate_creation_code(db_err.code().as_deref()),
        _ => false,
    }
}

#[async_trait]
impl StoreHandle for PgStore {
    async fn create_messages_table(&self) -> Result<(), StoreFailure> {
        match sqlx::query(CREATE_MESSAGES_TABLE).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_creation(&err) => {
                tracing::debug!(error = %err, "messages table created concurrently");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn select_recent(&self, limit: u32) -> Result<Vec<Message>, StoreFailure> {
        let rows = sqlx::query_as::<_, (i32, String, DateTime<Utc>)>(SELECT_RECENT)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, text, timestamp)| Message {
                id,
                text,
                timestamp,
            })
            .collect())
    }

    async fn insert_message(&self, text: &MessageText) -> Result<(), StoreFailure> {
        sqlx::query(INSERT_MESSAGE)
            .bind(text.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
