//! Transactional engine adapter
//!
//! Thin wrapper over the embedded redb engine. One table holds every
//! session record, keyed by session key, valued by the encoded record.
//!
//! # Transactions
//!
//! [`Engine::transact`] runs a closure against an [`EngineTxn`]:
//! - `Ok` from the closure commits; all writes land together
//! - `Err` from the closure aborts; no write lands
//!
//! The engine serializes write transactions internally. This adapter never
//! retries: an engine error reaches the caller as `EngineFailure`.
//!
//! # Reads
//!
//! [`Engine::get`], [`Engine::scan`] and [`Engine::count`] use read
//! transactions and observe the last committed state without blocking
//! writers.

use crate::durability::DurabilityMode;
use redb::{Database, ReadableTable, TableDefinition};
use sessiondb_core::codec::{decode_record, encode_record};
use sessiondb_core::{Deadline, Error, Result, SessionRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// The single table holding session records
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

fn engine_err(e: impl Into<redb::Error>) -> Error {
    let e: redb::Error = e.into();
    error!(error = %e, "Engine operation failed");
    Error::engine(e)
}

/// Handle to the embedded engine
pub struct Engine {
    db: Database,
    durability: DurabilityMode,
    /// `None` for in-memory engines
    path: Option<PathBuf>,
}

impl Engine {
    /// Open (or create) a file-backed engine
    ///
    /// Parent directories are created as needed. Failure here is fatal for
    /// the store.
    pub fn open(path: impl AsRef<Path>, durability: DurabilityMode) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::engine(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let db = Database::create(path).map_err(engine_err)?;
        let engine = Engine {
            db,
            durability,
            path: Some(path.to_path_buf()),
        };
        engine.init()?;
        info!(path = %path.display(), durability = ?durability, "Opened session engine");
        Ok(engine)
    }

    /// Create an engine that lives entirely in memory
    pub fn ephemeral() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(engine_err)?;
        let engine = Engine {
            db,
            durability: DurabilityMode::None,
            path: None,
        };
        engine.init()?;
        debug!("Opened ephemeral session engine");
        Ok(engine)
    }

    /// Make sure the sessions table exists so readers never see it missing
    fn init(&self) -> Result<()> {
        let txn = self.db.begin_write().map_err(engine_err)?;
        txn.open_table(SESSIONS).map_err(engine_err)?;
        txn.commit().map_err(engine_err)
    }

    /// File backing this engine, `None` if ephemeral
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if this engine has no backing file
    pub fn is_ephemeral(&self) -> bool {
        self.path.is_none()
    }

    /// Commit durability in effect
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    // ========================================================================
    // Snapshot reads
    // ========================================================================

    /// Read the last committed record for `key`
    pub fn get(&self, key: &str) -> Result<Option<SessionRecord>> {
        let txn = self.db.begin_read().map_err(engine_err)?;
        let table = txn.open_table(SESSIONS).map_err(engine_err)?;
        let stored = table.get(key).map_err(engine_err)?;
        stored.map(|bytes| decode_record(bytes.value())).transpose()
    }

    /// Every committed record, sorted by key
    pub fn scan(&self) -> Result<Vec<SessionRecord>> {
        let txn = self.db.begin_read().map_err(engine_err)?;
        let table = txn.open_table(SESSIONS).map_err(engine_err)?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(engine_err)? {
            let (_, bytes) = entry.map_err(engine_err)?;
            records.push(decode_record(bytes.value())?);
        }
        Ok(records)
    }

    /// Number of committed records
    pub fn count(&self) -> Result<usize> {
        let txn = self.db.begin_read().map_err(engine_err)?;
        let table = txn.open_table(SESSIONS).map_err(engine_err)?;
        let mut count = 0;
        for entry in table.iter().map_err(engine_err)? {
            entry.map_err(engine_err)?;
            count += 1;
        }
        Ok(count)
    }

    // ========================================================================
    // Single-operation writes
    // ========================================================================

    /// Write one record in its own transaction
    pub fn put(&self, record: &SessionRecord) -> Result<()> {
        self.transact(|txn| txn.put(record))
    }

    /// Delete one record in its own transaction
    ///
    /// Returns `true` if the record existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.transact(|txn| txn.delete(key))
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Run `f` in one write transaction
    ///
    /// Commits if `f` returns `Ok`, aborts if it returns `Err`.
    pub fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut EngineTxn<'_>) -> Result<T>,
    {
        self.run(None, f)
    }

    /// Like [`Engine::transact`], bounded by a deadline
    ///
    /// The deadline is checked once the write transaction is obtained and
    /// again just before commit; a passed deadline aborts the transaction
    /// with `DeadlineExceeded`.
    pub fn transact_until<T, F>(&self, deadline: Deadline, f: F) -> Result<T>
    where
        F: FnOnce(&mut EngineTxn<'_>) -> Result<T>,
    {
        self.run(Some(deadline), f)
    }

    fn run<T, F>(&self, deadline: Option<Deadline>, f: F) -> Result<T>
    where
        F: FnOnce(&mut EngineTxn<'_>) -> Result<T>,
    {
        let mut txn = self.db.begin_write().map_err(engine_err)?;
        txn.set_durability(self.durability.into());

        let outcome = match deadline {
            Some(deadline) => deadline.check("engine transaction begin"),
            None => Ok(()),
        }
        .and_then(|()| {
            let table = txn.open_table(SESSIONS).map_err(engine_err)?;
            let mut handle = EngineTxn { table, writes: 0 };
            let value = f(&mut handle)?;
            Ok((value, handle.writes))
        })
        .and_then(|(value, writes)| {
            if let Some(deadline) = deadline {
                deadline.check("engine commit")?;
            }
            Ok((value, writes))
        });

        match outcome {
            Ok((value, writes)) => {
                txn.commit().map_err(engine_err)?;
                debug!(writes, "Committed engine transaction");
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(error = %abort_err, "Engine abort failed");
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path)
            .field("durability", &self.durability)
            .finish()
    }
}

/// Transaction handle passed to [`Engine::transact`]
///
/// Reads see the transaction's own earlier writes.
pub struct EngineTxn<'txn> {
    table: redb::Table<'txn, &'static str, &'static [u8]>,
    writes: usize,
}

impl EngineTxn<'_> {
    /// Read a record inside the transaction
    pub fn get(&self, key: &str) -> Result<Option<SessionRecord>> {
        let stored = self.table.get(key).map_err(engine_err)?;
        stored.map(|bytes| decode_record(bytes.value())).transpose()
    }

    /// Check if a record exists inside the transaction
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.table.get(key).map_err(engine_err)?.is_some())
    }

    /// Write a record under its own key
    pub fn put(&mut self, record: &SessionRecord) -> Result<()> {
        let bytes = encode_record(record)?;
        self.table
            .insert(record.key.as_str(), bytes.as_slice())
            .map_err(engine_err)?;
        self.writes += 1;
        Ok(())
    }

    /// Delete a record, returning `true` if it existed
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let removed = self.table.remove(key).map_err(engine_err)?.is_some();
        if removed {
            self.writes += 1;
        }
        Ok(removed)
    }

    /// Number of records visible inside the transaction
    pub fn count(&self) -> Result<usize> {
        let mut count = 0;
        for entry in self.table.iter().map_err(engine_err)? {
            entry.map_err(engine_err)?;
            count += 1;
        }
        Ok(count)
    }
}
