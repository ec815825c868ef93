//! Store handle lifecycle management.
//!
//! The [`Connector`] and [`StoreHandle`] traits are the seam between the
//! service layer and a concrete store (PostgreSQL in production, the
//! in-memory store in tests). [`ConnectionManager`] sits on top of a
//! connector and applies one [`LifecyclePolicy`] to every acquire and
//! release, so the bootstrapper and the message store never need to know
//! which policy is configured.
//!
//! Callers follow the same shape everywhere:
//!
//! ```text
//! let lease = manager.acquire().await?;
//! let result = lease.handle().some_query().await;
//! manager.release(lease).await;
//! result
//! ```
//!
//! There is no early return between `acquire` and `release`. If the
//! operation's future is dropped before it reaches `release` (a client
//! disconnect, a timeout), the [`Lease`] closes an ephemeral handle from
//! its `Drop` impl instead.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::domain::{Message, MessageText};
use crate::error::{BoardError, StoreFailure};

/// An open handle to the message store.
#[async_trait]
pub trait StoreHandle: Send + Sync + fmt::Debug {
    /// Creates the `messages` table unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns the driver's diagnostic on failure.
    async fn create_messages_table(&self) -> Result<(), StoreFailure>;

    /// Returns up to `limit` messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns the driver's diagnostic on failure.
    async fn select_recent(&self, limit: u32) -> Result<Vec<Message>, StoreFailure>;

    /// Inserts one message; the store assigns `id` and `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns the driver's diagnostic on failure.
    async fn insert_message(&self, text: &MessageText) -> Result<(), StoreFailure>;

    /// Disposes of the handle. Further use fails.
    async fn close(&self);
}

/// Opens new store handles.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Opens a fresh handle.
    ///
    /// # Errors
    ///
    /// Returns the driver's diagnostic when the store is unreachable or
    /// rejects the credentials.
    async fn connect(&self) -> Result<Arc<dyn StoreHandle>, StoreFailure>;
}

/// How long a store handle lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecyclePolicy {
    /// One handle per process, opened on first use and shared by every
    /// later operation.
    #[default]
    Singleton,
    /// A fresh handle per operation, closed when the operation ends.
    Ephemeral,
}

impl LifecyclePolicy {
    /// Returns the configuration string for this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Ephemeral => "ephemeral",
        }
    }
}

impl fmt::Display for LifecyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a policy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown connection policy {0:?}; expected \"singleton\" or \"ephemeral\"")]
pub struct UnknownPolicy(String);

impl FromStr for LifecyclePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" => Ok(Self::Singleton),
            "ephemeral" => Ok(Self::Ephemeral),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// A store handle checked out by one operation.
///
/// Hand it back through [`ConnectionManager::release`]. An ephemeral lease
/// dropped without release spawns the close on the current runtime, so the
/// handle is disposed of even when the owning future is cancelled.
#[derive(Debug)]
pub struct Lease {
    handle: Arc<dyn StoreHandle>,
    policy: LifecyclePolicy,
    released: bool,
}

impl Lease {
    /// Returns the leased handle.
    #[must_use]
    pub fn handle(&self) -> &dyn StoreHandle {
        self.handle.as_ref()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.released || self.policy != LifecyclePolicy::Ephemeral {
            return;
        }
        let handle = Arc::clone(&self.handle);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!("ephemeral store handle dropped without release; closing");
                runtime.spawn(async move {
                    handle.close().await;
                });
            }
            Err(_) => {
                tracing::warn!("ephemeral store handle dropped outside a runtime; not closed");
            }
        }
    }
}

/// Applies a [`LifecyclePolicy`] on top of a [`Connector`].
#[derive(Debug)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: LifecyclePolicy,
    shared: OnceCell<Arc<dyn StoreHandle>>,
    close_on_shutdown: bool,
}

impl ConnectionManager {
    /// Creates a manager. No handle is opened until the first acquire.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, policy: LifecyclePolicy) -> Self {
        Self {
            connector,
            policy,
            shared: OnceCell::new(),
            close_on_shutdown: true,
        }
    }

    /// Sets whether [`shutdown`](Self::shutdown) closes the shared
    /// singleton handle or leaves it to process teardown.
    #[must_use]
    pub fn with_close_on_shutdown(mut self, close: bool) -> Self {
        self.close_on_shutdown = close;
        self
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    /// Checks out a usable handle.
    ///
    /// Under [`LifecyclePolicy::Singleton`] the first call opens the shared
    /// handle; concurrent first calls wait for the same open. A failed open
    /// leaves nothing cached, so the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Connection`] if the store cannot be reached.
    pub async fn acquire(&self) -> Result<Lease, BoardError> {
        let handle = match self.policy {
            LifecyclePolicy::Singleton => {
                let handle = self
                    .shared
                    .get_or_try_init(|| async {
                        let handle = self.connector.connect().await?;
                        tracing::info!(policy = %self.policy, "opened shared store handle");
                        Ok::<_, StoreFailure>(handle)
                    })
                    .await
                    .map_err(BoardError::Connection)?;
                Arc::clone(handle)
            }
            LifecyclePolicy::Ephemeral => {
                let handle = self
                    .connector
                    .connect()
                    .await
                    .map_err(BoardError::Connection)?;
                tracing::debug!(policy = %self.policy, "opened store handle");
                handle
            }
        };

        Ok(Lease {
            handle,
            policy: self.policy,
            released: false,
        })
    }

    /// Hands a lease back. Ephemeral handles are closed here.
    pub async fn release(&self, mut lease: Lease) {
        if lease.policy == LifecyclePolicy::Ephemeral {
            lease.handle.close().await;
            tracing::debug!(policy = %self.policy, "closed store handle");
        }
        lease.released = true;
    }

    /// Disposes of the shared handle at process shutdown, if configured.
    pub async fn shutdown(&self) {
        if self.policy != LifecyclePolicy::Singleton {
            return;
        }
        let Some(handle) = self.shared.get() else {
            return;
        };
        if self.close_on_shutdown {
            handle.close().await;
            tracing::info!("closed shared store handle");
        } else {
            tracing::info!("leaving shared store handle to process teardown");
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryDatabase;

    fn manager(db: &Arc<MemoryDatabase>, policy: LifecyclePolicy) -> ConnectionManager {
        ConnectionManager::new(db.connector(), policy)
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("singleton".parse::<LifecyclePolicy>(), Ok(LifecyclePolicy::Singleton));
        assert_eq!(" Ephemeral ".parse::<LifecyclePolicy>(), Ok(LifecyclePolicy::Ephemeral));
        assert!("pooled".parse::<LifecyclePolicy>().is_err());
        assert!("shared".parse::<LifecyclePolicy>().is_err());
        assert_eq!(LifecyclePolicy::default(), LifecyclePolicy::Singleton);
    }

    #[tokio::test]
    async fn singleton_opens_once_and_reuses() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Singleton);

        for _ in 0..5 {
            let Ok(lease) = manager.acquire().await else {
                panic!("acquire failed");
            };
            manager.release(lease).await;
        }

        assert_eq!(db.open_count(), 1);
        assert_eq!(db.close_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_singleton_acquires_share_one_handle() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Singleton);

        let (a, b) = tokio::join!(manager.acquire(), manager.acquire());
        let (Ok(a), Ok(b)) = (a, b) else {
            panic!("acquire failed");
        };
        manager.release(a).await;
        manager.release(b).await;

        assert_eq!(db.open_count(), 1);
    }

    #[tokio::test]
    async fn ephemeral_opens_and_closes_per_lease() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Ephemeral);

        for _ in 0..3 {
            let Ok(lease) = manager.acquire().await else {
                panic!("acquire failed");
            };
            manager.release(lease).await;
        }

        assert_eq!(db.open_count(), 3);
        assert_eq!(db.close_count(), 3);
    }

    async fn wait_for_closes(db: &MemoryDatabase, expected: usize) {
        for _ in 0..100 {
            if db.close_count() >= expected {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn dropped_ephemeral_lease_closes_handle() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Ephemeral);

        let Ok(lease) = manager.acquire().await else {
            panic!("acquire failed");
        };
        drop(lease);
        wait_for_closes(&db, 1).await;

        assert_eq!(db.open_count(), 1);
        assert_eq!(db.close_count(), 1);
    }

    #[tokio::test]
    async fn dropped_singleton_lease_keeps_shared_handle() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Singleton);

        let Ok(lease) = manager.acquire().await else {
            panic!("acquire failed");
        };
        drop(lease);
        tokio::task::yield_now().await;

        assert_eq!(db.close_count(), 0);
        assert!(manager.acquire().await.is_ok());
        assert_eq!(db.open_count(), 1);
    }

    #[tokio::test]
    async fn connect_failure_is_connection_error() {
        let db = MemoryDatabase::new();
        db.fail_connect(true);
        let manager = manager(&db, LifecyclePolicy::Singleton);

        let result = manager.acquire().await;
        assert!(matches!(result, Err(BoardError::Connection(_))));

        // Nothing was cached, so recovery is picked up on the next call.
        db.fail_connect(false);
        assert!(manager.acquire().await.is_ok());
        assert_eq!(db.open_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_closes_shared_handle_when_configured() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Singleton);
        let Ok(lease) = manager.acquire().await else {
            panic!("acquire failed");
        };
        manager.release(lease).await;

        manager.shutdown().await;
        assert_eq!(db.close_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_can_leave_shared_handle_open() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Singleton).with_close_on_shutdown(false);
        let Ok(lease) = manager.acquire().await else {
            panic!("acquire failed");
        };
        manager.release(lease).await;

        manager.shutdown().await;
        assert_eq!(db.close_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_before_first_use_is_noop() {
        let db = MemoryDatabase::new();
        let manager = manager(&db, LifecyclePolicy::Singleton);
        manager.shutdown().await;
        assert_eq!(db.open_count(), 0);
        assert_eq!(db.close_count(), 0);
    }
}
