// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable keyed store of per-agent lifecycle records.
//!
//! Each row holds the JSON-serialized [`AgentRecord`]. Partial updates run
//! inside a transaction so a concurrent upsert never interleaves with the
//! read-modify-write.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use warden_core::{AgentId, AgentRecord, RecordPatch};

/// Errors from record store operations
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no record for agent {0}")]
    NotFound(AgentId),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record store unavailable: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn get(&self, id: &AgentId) -> Result<Option<AgentRecord>, RecordError>;

    /// Insert or fully replace the record keyed by `record.id`.
    async fn upsert(&self, record: &AgentRecord) -> Result<(), RecordError>;

    /// Apply `patch` to an existing record and return the result.
    ///
    /// Fails with [`RecordError::NotFound`] when no record exists.
    async fn update(&self, id: &AgentId, patch: &RecordPatch) -> Result<AgentRecord, RecordError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agent_records (
    id   TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL
);
";

/// SQLite-backed record store.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, RecordError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::Backend(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, RecordError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RecordError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, RecordError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RecordError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| RecordError::Backend(e.to_string()))?
    }
}

fn read_record(conn: &Connection, id: &AgentId) -> Result<Option<AgentRecord>, RecordError> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM agent_records WHERE id = ?1", [id.as_str()], |row| row.get(0))
        .optional()?;
    body.map(|b| serde_json::from_str(&b)).transpose().map_err(RecordError::from)
}

fn write_record(conn: &Connection, record: &AgentRecord) -> Result<(), RecordError> {
    let body = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO agent_records (id, body) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET body = excluded.body",
        (record.id.as_str(), body),
    )?;
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, id: &AgentId) -> Result<Option<AgentRecord>, RecordError> {
        let id = id.clone();
        self.with_conn(move |conn| read_record(conn, &id)).await
    }

    async fn upsert(&self, record: &AgentRecord) -> Result<(), RecordError> {
        let record = record.clone();
        self.with_conn(move |conn| write_record(conn, &record)).await
    }

    async fn update(&self, id: &AgentId, patch: &RecordPatch) -> Result<AgentRecord, RecordError> {
        let id = id.clone();
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut record = read_record(&tx, &id)?.ok_or_else(|| RecordError::NotFound(id))?;
            record.apply(&patch);
            write_record(&tx, &record)?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{RecordError, RecordStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use warden_core::{AgentId, AgentRecord, RecordPatch};

    #[derive(Default)]
    struct State {
        records: HashMap<AgentId, AgentRecord>,
        writes: usize,
        unavailable: bool,
    }

    /// In-memory record store for tests.
    #[derive(Clone, Default)]
    pub struct MemoryRecordStore {
        inner: Arc<Mutex<State>>,
    }

    impl MemoryRecordStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn record(&self, id: &AgentId) -> Option<AgentRecord> {
            self.inner.lock().records.get(id).cloned()
        }

        /// Number of successful upserts and updates.
        pub fn writes(&self) -> usize {
            self.inner.lock().writes
        }

        /// Make every call fail with a backend error.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.inner.lock().unavailable = unavailable;
        }

        fn check(state: &State) -> Result<(), RecordError> {
            if state.unavailable {
                return Err(RecordError::Backend("injected outage".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RecordStore for MemoryRecordStore {
        async fn get(&self, id: &AgentId) -> Result<Option<AgentRecord>, RecordError> {
            let state = self.inner.lock();
            Self::check(&state)?;
            Ok(state.records.get(id).cloned())
        }

        async fn upsert(&self, record: &AgentRecord) -> Result<(), RecordError> {
            let mut state = self.inner.lock();
            Self::check(&state)?;
            state.records.insert(record.id.clone(), record.clone());
            state.writes += 1;
            Ok(())
        }

        async fn update(
            &self,
            id: &AgentId,
            patch: &RecordPatch,
        ) -> Result<AgentRecord, RecordError> {
            let mut state = self.inner.lock();
            Self::check(&state)?;
            let record =
                state.records.get_mut(id).ok_or_else(|| RecordError::NotFound(id.clone()))?;
            record.apply(patch);
            let updated = record.clone();
            state.writes += 1;
            Ok(updated)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::MemoryRecordStore;

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
