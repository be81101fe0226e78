// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! # Local Index
//!
//! Durable registry of stored records: content identifier → metadata.
//!
//! The whole index is one JSON array under [`INDEX_KEY`] in the settings
//! table, rewritten on every mutation. A document that fails to parse is
//! logged once and replaced by an empty one; the data it described is still
//! reachable by content identifier.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use utoipa::ToSchema;

use super::kv::LocalKv;
use super::paths::INDEX_KEY;
use super::{StorageError, StorageResult};

/// Type bucket for entries with no `type`.
pub const UNTYPED_BUCKET: &str = "other";

/// Where a record's envelope lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageMethod {
    #[serde(alias = "IPFS")]
    Distributed,
    #[serde(alias = "Local")]
    Local,
}

/// Record metadata as persisted in the index.
///
/// Unknown caller fields are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_encrypted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_method: Option<StorageMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl RecordMetadata {
    pub fn with_type(record_type: impl Into<String>) -> Self {
        Self {
            record_type: Some(record_type.into()),
            ..Self::default()
        }
    }

    /// Overlay `newer` onto `self`: fields set in `newer` win, everything
    /// else is kept.
    pub fn merge(&mut self, newer: RecordMetadata) {
        if newer.record_type.is_some() {
            self.record_type = newer.record_type;
        }
        if newer.title.is_some() {
            self.title = newer.title;
        }
        if newer.is_encrypted.is_some() {
            self.is_encrypted = newer.is_encrypted;
        }
        if newer.storage_method.is_some() {
            self.storage_method = newer.storage_method;
        }
        if newer.gateway.is_some() {
            self.gateway = newer.gateway;
        }
        if newer.timestamp.is_some() {
            self.timestamp = newer.timestamp;
        }
        self.extra.extend(newer.extra);
    }

    pub fn encrypted(&self) -> bool {
        self.is_encrypted.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(alias = "cid")]
    pub content_id: String,
    pub metadata: RecordMetadata,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filter and ordering for [`LocalIndex::query`].
#[derive(Debug, Clone, Default)]
pub struct IndexQuery {
    /// Exact match on `metadata.type`.
    pub record_type: Option<String>,
    /// Case-insensitive substring over the identifier and the metadata JSON.
    pub search: Option<String>,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// Index handle. Reads and read-modify-write cycles are serialised by an
/// internal lock so that no update is lost.
pub struct LocalIndex {
    kv: Arc<LocalKv>,
    write_lock: Mutex<()>,
}

impl LocalIndex {
    pub fn new(kv: Arc<LocalKv>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    /// All entries, in stored order. A corrupt document reads as empty.
    pub fn list(&self) -> StorageResult<Vec<IndexEntry>> {
        let _guard = self.lock();
        self.entries()
    }

    pub fn get(&self, content_id: &str) -> StorageResult<Option<IndexEntry>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|e| e.content_id == content_id))
    }

    /// Insert or merge metadata for `content_id`, refreshing its timestamp.
    pub fn upsert(&self, content_id: &str, metadata: RecordMetadata) -> StorageResult<IndexEntry> {
        let _guard = self.lock();
        let mut entries = self.entries()?;
        let now = Utc::now();

        let entry = match entries.iter_mut().find(|e| e.content_id == content_id) {
            Some(existing) => {
                existing.metadata.merge(metadata);
                existing.timestamp = now;
                existing.clone()
            }
            None => {
                let entry = IndexEntry {
                    content_id: content_id.to_string(),
                    metadata,
                    timestamp: now,
                };
                entries.push(entry.clone());
                entry
            }
        };

        self.save(&entries)?;
        Ok(entry)
    }

    /// Drop the entry for `content_id`. Returns whether it existed.
    pub fn remove(&self, content_id: &str) -> StorageResult<bool> {
        let _guard = self.lock();
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|e| e.content_id != content_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    /// Drop the document entirely; an absent document reads as empty.
    pub fn clear(&self) -> StorageResult<()> {
        let _guard = self.lock();
        self.kv.remove_setting(INDEX_KEY)?;
        Ok(())
    }

    pub fn query(&self, query: &IndexQuery) -> StorageResult<Vec<IndexEntry>> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut entries: Vec<IndexEntry> = self
            .list()?
            .into_iter()
            .filter(|e| match &query.record_type {
                Some(t) => e.metadata.record_type.as_deref() == Some(t.as_str()),
                None => true,
            })
            .filter(|e| match &needle {
                Some(needle) => matches_search(e, needle),
                None => true,
            })
            .collect();

        match query.order {
            SortOrder::NewestFirst => entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            SortOrder::OldestFirst => entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        }
        Ok(entries)
    }

    pub fn stats(&self) -> StorageResult<IndexStats> {
        let entries = self.list()?;
        let mut by_type = BTreeMap::new();
        for entry in &entries {
            let bucket = entry
                .metadata
                .record_type
                .clone()
                .unwrap_or_else(|| UNTYPED_BUCKET.to_string());
            *by_type.entry(bucket).or_insert(0) += 1;
        }
        Ok(IndexStats {
            total: entries.len(),
            by_type,
        })
    }

    /// Caller holds the lock.
    fn entries(&self) -> StorageResult<Vec<IndexEntry>> {
        match self.load() {
            Err(StorageError::IndexCorrupt(reason)) => {
                warn!(reason = %reason, "Local index is corrupt, resetting to empty");
                self.save(&[])?;
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn load(&self) -> StorageResult<Vec<IndexEntry>> {
        match self.kv.get_setting(INDEX_KEY)? {
            None => Ok(Vec::new()),
            Some(document) => serde_json::from_str(&document)
                .map_err(|e| StorageError::IndexCorrupt(e.to_string())),
        }
    }

    fn save(&self, entries: &[IndexEntry]) -> StorageResult<()> {
        let document = serde_json::to_string(entries)?;
        self.kv.put_setting(INDEX_KEY, &document)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches_search(entry: &IndexEntry, needle: &str) -> bool {
    if entry.content_id.to_lowercase().contains(needle) {
        return true;
    }
    serde_json::to_string(&entry.metadata)
        .map(|json| json.to_lowercase().contains(needle))
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
