// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

use std::sync::Arc;

use crate::storage::StorageService;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageService>,
}

impl AppState {
    pub fn new(storage: StorageService) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }
}
