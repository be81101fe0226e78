// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! Durable local key-value store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `settings`: well-known key → string value (index document, encryption key)
//! - `blobs`: content identifier → raw envelope bytes (local-only mode)

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

/// Small string settings: `cyberguard-storage-index`, `cyberguard-encryption-key`.
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Local object table: content identifier → envelope bytes.
const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type KvResult<T> = Result<T, KvError>;

// =============================================================================
// LocalKv
// =============================================================================

/// Embedded durable key-value store shared by the index, the encryption
/// provider and the local-only blob table.
pub struct LocalKv {
    db: Database,
}

impl LocalKv {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SETTINGS)?;
            let _ = write_txn.open_table(BLOBS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn get_setting(&self, key: &str) -> KvResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Insert or overwrite a setting.
    pub fn put_setting(&self, key: &str, value: &str) -> KvResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove a setting. Removing an absent key is not an error.
    pub fn remove_setting(&self, key: &str) -> KvResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    pub fn put_blob(&self, content_id: &str, bytes: &[u8]) -> KvResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BLOBS)?;
            table.insert(content_id, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_blob(&self, content_id: &str) -> KvResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BLOBS)?;
        Ok(table.get(content_id)?.map(|v| v.value().to_vec()))
    }

    /// Remove a blob. Returns whether it existed.
    pub fn remove_blob(&self, content_id: &str) -> KvResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(BLOBS)?;
            let removed = table.remove(content_id)?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Drop every blob in the local object table.
    pub fn clear_blobs(&self) -> KvResult<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(BLOBS)?;
        {
            let _ = write_txn.open_table(BLOBS)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn blob_count(&self) -> KvResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BLOBS)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
