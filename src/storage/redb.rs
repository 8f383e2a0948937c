//! ReDB storage implementation for pending transactions.
//!
//! Records are keyed by the hex transaction hash and stored as JSON.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::coordination::state::PendingTransaction;
use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::TxHash;

const PENDING_TRANSACTIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("pending_transactions");

/// Storage wrapper for ReDB.
///
/// Thread-safe via internal Arc. Clone is cheap.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open or create a database at the given path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path) -> ConstellationResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| ConstellationError::Storage(e.to_string()))?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;

        tracing::info!(path = %path.display(), "Opened storage database");
        Ok(storage)
    }

    /// Open an in-memory database for testing.
    #[cfg(test)]
    pub fn open_memory() -> ConstellationResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| ConstellationError::Storage(e.to_string()))?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> ConstellationResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            // Opening the table creates it.
            let _ = write_txn.open_table(PENDING_TRANSACTIONS)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Insert or replace a pending transaction.
    pub fn put_pending(&self, pending: &PendingTransaction) -> ConstellationResult<()> {
        let key = pending.hash.to_string();
        let value = serde_json::to_vec(pending)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_TRANSACTIONS)?;
            table.insert(key.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;
        tracing::debug!(hash = %key, status = %pending.status, "Stored pending transaction");
        Ok(())
    }

    /// Get a pending transaction by hash.
    pub fn get_pending(&self, hash: &TxHash) -> ConstellationResult<Option<PendingTransaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TRANSACTIONS)?;

        match table.get(hash.to_string().as_str())? {
            Some(value) => {
                let pending: PendingTransaction = serde_json::from_slice(value.value())?;
                Ok(Some(pending))
            }
            None => Ok(None),
        }
    }

    /// Delete a pending transaction. Returns whether it existed.
    pub fn delete_pending(&self, hash: &TxHash) -> ConstellationResult<bool> {
        let key = hash.to_string();
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(PENDING_TRANSACTIONS)?;
            table.remove(key.as_str())?.is_some()
        };
        write_txn.commit()?;

        if deleted {
            tracing::debug!(hash = %key, "Deleted pending transaction");
        }
        Ok(deleted)
    }

    /// List every pending transaction.
    pub fn list_pending(&self) -> ConstellationResult<Vec<PendingTransaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TRANSACTIONS)?;

        table
            .iter()?
            .map(|entry| -> ConstellationResult<PendingTransaction> {
                let (_, value) = entry?;
                Ok(serde_json::from_slice(value.value())?)
            })
            .collect()
    }
}
