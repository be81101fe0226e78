// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! Path constants and well-known keys for the local storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for local persistent storage.
pub const DATA_ROOT: &str = "./data";

/// File name of the embedded database under the data root.
pub const DATABASE_FILE: &str = "cyberguard.redb";

/// Settings key holding the serialized local index (JSON array).
pub const INDEX_KEY: &str = "cyberguard-storage-index";

/// Settings key holding the hex-encoded encryption key.
pub const ENCRYPTION_KEY_NAME: &str = "cyberguard-encryption-key";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all local data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the embedded database file.
    pub fn database_file(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }
}
