// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! CyberGuard - Encrypted Content-Addressed Storage Service
//!
//! Stores scan results, chat transcripts and incident reports as optionally
//! encrypted blobs on an IPFS node, falling back to an embedded local store
//! when no node is reachable, and keeps a searchable local index of them.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment configuration
//! - `polling` - Bounded retry with backoff
//! - `storage` - Encryption, content store client, local index, façade

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod polling;
pub mod state;
pub mod storage;
