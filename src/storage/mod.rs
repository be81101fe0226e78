// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! # Encrypted Content-Addressed Storage
//!
//! Stores JSON records (scan results, chat transcripts, incident reports)
//! as optionally encrypted envelopes on an IPFS node, with an embedded
//! local store standing in when no node is reachable.
//!
//! ## Layers
//!
//! ```text
//! StorageService (service.rs)
//!   ├── EncryptionProvider (encryption.rs)   key + AES-256-GCM
//!   ├── ContentStoreClient (client.rs)       Connected | Fallback
//!   │     ├── KuboApi (ipfs.rs)              IPFS HTTP RPC
//!   │     └── BlobCache (blob_cache.rs)
//!   └── LocalIndex (index.rs)                content id → metadata
//!
//! LocalKv (kv.rs): redb file under DATA_DIR
//!   settings  cyberguard-storage-index, cyberguard-encryption-key
//!   blobs     local-<hash> → envelope bytes
//! ```
//!
//! ## Ownership
//!
//! - Only the façade writes the index
//! - Only the encryption provider writes the key
//! - Only the store client writes the blob table

pub mod blob_cache;
pub mod client;
pub mod encryption;
pub mod error;
pub mod index;
pub mod ipfs;
pub mod kv;
pub mod paths;
pub mod service;

#[cfg(test)]
pub(crate) mod mock_kubo;

pub use client::{ContentStoreClient, NodeInfo, PutReceipt, StoreMode, LOCAL_ID_PREFIX};
pub use encryption::{EncryptionKey, EncryptionProvider};
pub use error::{StorageError, StorageResult};
pub use index::{
    IndexEntry, IndexQuery, IndexStats, LocalIndex, RecordMetadata, SortOrder, StorageMethod,
};
pub use kv::{KvError, LocalKv};
pub use paths::StoragePaths;
pub use service::{RetrieveOptions, RetrievedRecord, StorageService, StoredRecord};
