// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! # API Data Models
//!
//! Request and response bodies for the REST API. Index entries and record
//! metadata are served as-is from the storage layer; this module only adds
//! the envelopes around them.
//!
//! ## Model Categories
//!
//! - **Records**: store, retrieve and list stored records
//! - **Network**: IPFS node status, peers, pins and pubsub

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::storage::{NodeInfo, RecordMetadata, StoreMode};

// =============================================================================
// Record Models
// =============================================================================

fn default_encrypt() -> bool {
    true
}

/// Request body for storing a record.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StoreRecordRequest {
    /// Arbitrary JSON payload.
    #[schema(value_type = Object)]
    pub payload: Value,
    /// Caller metadata (`type`, `title`, plus any extra fields).
    #[serde(default)]
    pub metadata: RecordMetadata,
    /// Encrypt before storing. Defaults to `true`.
    #[serde(default = "default_encrypt")]
    pub encrypt: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecordResponse {
    pub content_id: String,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RetrieveRecordResponse {
    #[schema(value_type = Object)]
    pub value: Value,
    /// Absent when the record is not in the local index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RecordMetadata>,
}

// =============================================================================
// Network Models
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NetworkStatus {
    pub mode: StoreMode,
    /// Present in connected mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PeerView {
    pub peer: String,
    pub addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
}

/// Multiaddr of a peer to connect to or disconnect from.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PeerRequest {
    pub address: String,
}

fn default_ping_count() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PingRequest {
    /// Peer ID (not a multiaddr).
    pub peer: String,
    #[serde(default = "default_ping_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PingView {
    pub success: bool,
    /// Round-trip time; absent on status lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublishRequest {
    pub topic: String,
    /// UTF-8 message body.
    pub message: String,
}
