// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! # Storage Façade
//!
//! Entry point for callers: takes a JSON payload plus metadata, optionally
//! encrypts it, hands the envelope to the content store and records it in
//! the local index. Retrieval runs the same path backwards.
//!
//! ## Envelope format
//!
//! - plain: the payload serialized as compact JSON
//! - encrypted: `{"encrypted": "<base64 nonce||ciphertext>"}` where the
//!   plaintext is the payload's JSON text
//!
//! Whether to decrypt on retrieval is decided by the index's `isEncrypted`
//! flag (or an explicit override), never by looking at the envelope shape.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::client::{is_local_id, ContentStoreClient, StoreMode};
use super::encryption::EncryptionProvider;
use super::index::{IndexEntry, IndexQuery, IndexStats, LocalIndex, RecordMetadata, StorageMethod};
use super::kv::LocalKv;
use super::paths::StoragePaths;
use super::{StorageError, StorageResult};
use crate::config::StorageConfig;

#[derive(Debug, Serialize, Deserialize)]
struct EncryptedEnvelope {
    encrypted: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub content_id: String,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedRecord {
    pub value: Value,
    /// `None` when the identifier has no index entry.
    pub metadata: Option<RecordMetadata>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RetrieveOptions {
    /// Decrypt identifiers that have no index entry.
    pub assume_encrypted: bool,
}

/// Process-wide storage context. Construct once with
/// [`open`](Self::open), share behind an `Arc`, and call
/// [`shutdown`](Self::shutdown) on exit.
pub struct StorageService {
    encryption: EncryptionProvider,
    client: ContentStoreClient,
    index: LocalIndex,
    local_fallback: bool,
}

impl StorageService {
    pub async fn open(config: StorageConfig) -> StorageResult<Self> {
        let paths = StoragePaths::new(&config.data_dir);
        let kv = Arc::new(LocalKv::open(&paths.database_file())?);
        let client = ContentStoreClient::connect(&config, kv.clone()).await;

        info!(
            data_dir = %paths.root().display(),
            mode = ?client.mode(),
            "Storage service ready"
        );

        Ok(Self {
            encryption: EncryptionProvider::new(kv.clone()),
            client,
            index: LocalIndex::new(kv),
            local_fallback: config.local_fallback,
        })
    }

    pub fn mode(&self) -> StoreMode {
        self.client.mode()
    }

    /// Network passthroughs (pin, peers, pubsub, node info).
    pub fn client(&self) -> &ContentStoreClient {
        &self.client
    }

    pub fn encryption(&self) -> &EncryptionProvider {
        &self.encryption
    }

    /// Store `payload`, encrypting it first when `encrypt` is set.
    ///
    /// The index is only written after the envelope is safely stored.
    pub async fn store(
        &self,
        payload: &Value,
        metadata: RecordMetadata,
        encrypt: bool,
    ) -> StorageResult<StoredRecord> {
        let envelope = self.seal_envelope(payload, encrypt)?;

        let (receipt, method) = match self.client.put(envelope.clone()).await {
            Ok(receipt) => {
                let method = if is_local_id(&receipt.content_id) {
                    StorageMethod::Local
                } else {
                    StorageMethod::Distributed
                };
                (receipt, method)
            }
            Err(e @ StorageError::BackendTimeout { .. }) => return Err(e),
            Err(e) if self.local_fallback => {
                warn!(error = %e, "Distributed put failed, storing locally instead");
                let receipt = self.client.put_local(&envelope).map_err(|local| {
                    StorageError::StorageUnavailable(format!(
                        "distributed put failed ({e}); local put failed ({local})"
                    ))
                })?;
                (receipt, StorageMethod::Local)
            }
            Err(e) => return Err(StorageError::StorageUnavailable(e.to_string())),
        };

        let mut final_metadata = metadata;
        final_metadata.merge(RecordMetadata {
            is_encrypted: Some(encrypt),
            storage_method: Some(method),
            gateway: match method {
                StorageMethod::Distributed => self.client.gateway().map(str::to_string),
                StorageMethod::Local => None,
            },
            timestamp: Some(Utc::now()),
            ..RecordMetadata::default()
        });

        let entry = self.index.upsert(&receipt.content_id, final_metadata)?;
        info!(
            content_id = %receipt.content_id,
            encrypted = encrypt,
            method = ?method,
            size = receipt.size,
            "Stored record"
        );

        Ok(StoredRecord {
            content_id: entry.content_id,
            metadata: entry.metadata,
        })
    }

    pub async fn retrieve(&self, content_id: &str) -> StorageResult<RetrievedRecord> {
        self.retrieve_with(content_id, RetrieveOptions::default())
            .await
    }

    /// Retrieve with an explicit encryption override for unindexed
    /// identifiers. Indexed records always follow their recorded flag.
    pub async fn retrieve_with(
        &self,
        content_id: &str,
        options: RetrieveOptions,
    ) -> StorageResult<RetrievedRecord> {
        let metadata = self.index.get(content_id)?.map(|entry| entry.metadata);
        let encrypted = metadata
            .as_ref()
            .map(RecordMetadata::encrypted)
            .unwrap_or(options.assume_encrypted);

        let bytes = self.client.get(content_id).await?;
        let value = if encrypted {
            self.open_envelope(&bytes)?
        } else {
            serde_json::from_slice(&bytes)?
        };

        debug!(content_id = %content_id, encrypted, "Retrieved record");
        Ok(RetrievedRecord { value, metadata })
    }

    /// Stop tracking `content_id`. Locally minted blobs are dropped too;
    /// remote copies are left alone.
    pub fn delete(&self, content_id: &str) -> StorageResult<()> {
        let removed = self.index.remove(content_id)?;
        let dropped = self.client.remove_local(content_id)?;
        debug!(content_id = %content_id, removed, dropped, "Deleted record");
        Ok(())
    }

    /// Empty the index; in Fallback mode also purge the local blob table.
    pub fn clear_all(&self) -> StorageResult<()> {
        self.index.clear()?;
        if self.client.mode() == StoreMode::Fallback {
            self.client.clear_local_blobs()?;
        }
        info!(mode = ?self.client.mode(), "Cleared local index");
        Ok(())
    }

    pub fn list_index(&self) -> StorageResult<Vec<IndexEntry>> {
        self.index.list()
    }

    pub fn query(&self, query: &IndexQuery) -> StorageResult<Vec<IndexEntry>> {
        self.index.query(query)
    }

    pub fn stats(&self) -> StorageResult<IndexStats> {
        self.index.stats()
    }

    pub async fn shutdown(&self) {
        self.client.shutdown().await;
        info!("Storage service shut down");
    }

    fn seal_envelope(&self, payload: &Value, encrypt: bool) -> StorageResult<Vec<u8>> {
        let plain = serde_json::to_string(payload)?;
        if !encrypt {
            return Ok(plain.into_bytes());
        }

        let key = self.encryption.get_or_create_key()?;
        let encrypted = self.encryption.encrypt(&Value::String(plain), Some(&key))?;
        Ok(serde_json::to_vec(&EncryptedEnvelope { encrypted })?)
    }

    fn open_envelope(&self, bytes: &[u8]) -> StorageResult<Value> {
        let envelope: EncryptedEnvelope = serde_json::from_slice(bytes).map_err(|e| {
            StorageError::DecryptionFailed(format!("not an encrypted envelope: {e}"))
        })?;
        self.encryption.decrypt(&envelope.encrypted, None)
    }
}

// =============================================================================
// Tests
// =============================================================================
