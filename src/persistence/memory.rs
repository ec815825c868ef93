//! In-memory message store.
//!
//! Used by the test suite and for running the server without PostgreSQL
//! (`DATABASE_URL=memory:`). Behaves like the `messages` table: the table
//! must be created before use, ids increase per insert, timestamps are
//! assigned at insert and never go backwards. It also records how many
//! handles were opened and closed and can be told to fail on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{RwLock, RwLockWriteGuard};

use super::connection::{Connector, StoreHandle};
use crate::domain::{Message, MessageText};
use crate::error::StoreFailure;

#[derive(Debug, Default)]
struct MessagesTable {
    rows: Vec<Message>,
    next_id: i32,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MessagesTable {
    fn insert(&mut self, text: &MessageText) -> Result<(), StoreFailure> {
        let id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| StoreFailure::new("nextval: reached maximum value of sequence"))?;
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(prev) if now <= prev => prev + TimeDelta::microseconds(1),
            _ => now,
        };
        self.rows.push(Message {
            id,
            text: text.as_str().to_string(),
            timestamp,
        });
        self.next_id = id;
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    fn recent(&self, limit: u32) -> Vec<Message> {
        let mut rows: Vec<&Message> = self.rows.iter().collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        rows.into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Exclusive lock on the `messages` table, as held by a long-running
/// transaction. Queries from every handle wait until it is dropped.
#[derive(Debug)]
pub struct TableLock<'a> {
    _guard: RwLockWriteGuard<'a, Option<MessagesTable>>,
}

/// Shared state of one in-memory database.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    table: RwLock<Option<MessagesTable>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    tables_created: AtomicUsize,
    fail_connect: AtomicBool,
    fail_schema: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryDatabase {
    /// Creates an empty database with no `messages` table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a connector that opens handles onto this database.
    #[must_use]
    pub fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        Arc::new(MemoryConnector {
            db: Arc::clone(self),
        })
    }

    /// Number of handles opened so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of handles closed so far.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of times the `messages` table was actually created.
    #[must_use]
    pub fn tables_created(&self) -> usize {
        self.tables_created.load(Ordering::SeqCst)
    }

    /// Returns `true` if the `messages` table exists.
    pub async fn table_exists(&self) -> bool {
        self.table.read().await.is_some()
    }

    /// Number of stored messages (0 when the table does not exist).
    pub async fn row_count(&self) -> usize {
        let table = self.table.read().await;
        (*table).as_ref().map_or(0, |t| t.rows.len())
    }

    /// Drops the `messages` table, as an out-of-band `DROP TABLE` would.
    pub async fn drop_table(&self) {
        *self.table.write().await = None;
    }

    /// Locks the `messages` table until the returned guard is dropped.
    pub async fn lock_table(&self) -> TableLock<'_> {
        TableLock {
            _guard: self.table.write().await,
        }
    }

    /// Makes subsequent connects fail (or succeed again).
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `CREATE TABLE` statements fail (or succeed again).
    pub fn fail_schema(&self, fail: bool) {
        self.fail_schema.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent selects and inserts fail (or succeed again).
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MemoryConnector {
    db: Arc<MemoryDatabase>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn StoreHandle>, StoreFailure> {
        if self.db.fail_connect.load(Ordering::SeqCst) {
            return Err(StoreFailure::new("connection refused"));
        }
        self.db.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryHandle {
            db: Arc::clone(&self.db),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
struct MemoryHandle {
    db: Arc<MemoryDatabase>,
    closed: AtomicBool,
}

impl MemoryHandle {
    fn ensure_open(&self) -> Result<(), StoreFailure> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreFailure::new("connection is closed"));
        }
        Ok(())
    }

    fn ensure_queries_allowed(&self) -> Result<(), StoreFailure> {
        self.ensure_open()?;
        if self.db.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreFailure::new("server closed the connection unexpectedly"));
        }
        Ok(())
    }
}

fn missing_table() -> StoreFailure {
    StoreFailure::new("relation \"messages\" does not exist")
}

#[async_trait]
impl StoreHandle for MemoryHandle {
    async fn create_messages_table(&self) -> Result<(), StoreFailure> {
        self.ensure_open()?;
        if self.db.fail_schema.load(Ordering::SeqCst) {
            return Err(StoreFailure::new("permission denied for schema public"));
        }
        let mut table = self.db.table.write().await;
        if table.is_none() {
            *table = Some(MessagesTable::default());
            self.db.tables_created.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn select_recent(&self, limit: u32) -> Result<Vec<Message>, StoreFailure> {
        self.ensure_queries_allowed()?;
        let guard = self.db.table.read().await;
        let table = (*guard).as_ref().ok_or_else(missing_table)?;
        Ok(table.recent(limit))
    }

    async fn insert_message(&self, text: &MessageText) -> Result<(), StoreFailure> {
        self.ensure_queries_allowed()?;
        let mut guard = self.db.table.write().await;
        let table = (*guard).as_mut().ok_or_else(missing_table)?;
        table.insert(text)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.db.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
