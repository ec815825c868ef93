//! One-time schema bootstrap.

use std::sync::Arc;

use crate::domain::SchemaState;
use crate::error::BoardError;
use crate::persistence::ConnectionManager;

/// Ensures the `messages` table exists before any query runs.
///
/// Holds no lock: concurrent callers may each run the idempotent
/// `CREATE TABLE IF NOT EXISTS` and all of them succeed. A table dropped
/// after the flag is set is not noticed here; later queries fail with
/// [`BoardError::Query`].
#[derive(Debug, Clone)]
pub struct SchemaBootstrapper {
    connections: Arc<ConnectionManager>,
    state: Arc<SchemaState>,
}

impl SchemaBootstrapper {
    /// Creates a bootstrapper that records success in `state`.
    #[must_use]
    pub fn new(connections: Arc<ConnectionManager>, state: Arc<SchemaState>) -> Self {
        Self { connections, state }
    }

    /// Returns the readiness flag this bootstrapper updates.
    #[must_use]
    pub fn state(&self) -> &Arc<SchemaState> {
        &self.state
    }

    /// Creates the `messages` table if it is missing and marks the schema
    /// ready.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Connection`] if no handle could be acquired and
    /// [`BoardError::Schema`] if the statement failed. The readiness flag is
    /// left untouched on failure.
    pub async fn ensure_schema(&self) -> Result<(), BoardError> {
        let lease = self.connections.acquire().await?;
        tracing::info!("initializing schema if not exists");
        let result = lease.handle().create_messages_table().await;
        self.connections.release(lease).await;

        result.map_err(BoardError::Schema)?;

        if self.state.mark_ready() {
            tracing::info!("schema initialization successful");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::{LifecyclePolicy, MemoryDatabase};

    fn make_bootstrapper(
        db: &Arc<MemoryDatabase>,
        policy: LifecyclePolicy,
    ) -> SchemaBootstrapper {
        let connections = Arc::new(ConnectionManager::new(db.connector(), policy));
        SchemaBootstrapper::new(connections, Arc::new(SchemaState::new()))
    }

    #[tokio::test]
    async fn creates_table_and_flips_state() {
        let db = MemoryDatabase::new();
        let bootstrapper = make_bootstrapper(&db, LifecyclePolicy::Singleton);
        assert!(!bootstrapper.state().is_ready());

        assert!(bootstrapper.ensure_schema().await.is_ok());
        assert!(db.table_exists().await);
        assert!(bootstrapper.state().is_ready());
    }

    #[tokio::test]
    async fn repeated_bootstrap_keeps_rows() {
        let db = MemoryDatabase::new();
        let bootstrapper = make_bootstrapper(&db, LifecyclePolicy::Singleton);
        assert!(bootstrapper.ensure_schema().await.is_ok());

        let handle = db.connector().connect().await;
        let Ok(handle) = handle else {
            panic!("connect failed");
        };
        let Ok(text) = crate::domain::MessageText::try_from("kept") else {
            panic!("valid text");
        };
        assert!(handle.insert_message(&text).await.is_ok());

        for _ in 0..5 {
            assert!(bootstrapper.ensure_schema().await.is_ok());
        }
        assert_eq!(db.tables_created(), 1);
        assert_eq!(db.row_count().await, 1);
    }

    #[tokio::test]
    async fn failure_leaves_state_unset() {
        let db = MemoryDatabase::new();
        db.fail_schema(true);
        let bootstrapper = make_bootstrapper(&db, LifecyclePolicy::Ephemeral);

        let result = bootstrapper.ensure_schema().await;
        assert!(matches!(result, Err(BoardError::Schema(_))));
        assert!(!bootstrapper.state().is_ready());
        assert_eq!(db.open_count(), db.close_count());
    }

    #[tokio::test]
    async fn unreachable_store_is_connection_error() {
        let db = MemoryDatabase::new();
        db.fail_connect(true);
        let bootstrapper = make_bootstrapper(&db, LifecyclePolicy::Ephemeral);

        let result = bootstrapper.ensure_schema().await;
        assert!(matches!(result, Err(BoardError::Connection(_))));
        assert!(!bootstrapper.state().is_ready());
    }

    #[tokio::test]
    async fn concurrent_bootstraps_converge() {
        let db = MemoryDatabase::new();
        let bootstrapper = make_bootstrapper(&db, LifecyclePolicy::Ephemeral);

        let (a, b) = tokio::join!(bootstrapper.ensure_schema(), bootstrapper.ensure_schema());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(db.tables_created(), 1);
        assert_eq!(db.open_count(), 2);
        assert_eq!(db.close_count(), 2);
    }
}
