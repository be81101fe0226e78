// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! # Bounded Polling
//!
//! Helper for waiting on results that become available asynchronously
//! (a backend finishing its startup, an external scan completing).
//!
//! Every wait is bounded: the check runs at most `max_attempts` times with
//! geometrically growing delays capped at `max_delay`, then the wait fails
//! with [`StorageError::ResultUnavailable`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::storage::{StorageError, StorageResult};

/// Outcome of a single readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
}

/// Retry schedule for [`poll_until_ready`].
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    /// Five attempts, 5 s apart and growing, capped at 25 s.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            multiplier: 2,
            max_delay: Duration::from_secs(25),
        }
    }
}

impl BackoffPolicy {
    /// Delay to sleep after the given (zero-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `check` until it reports [`PollStatus::Ready`] or the policy's
/// attempt ceiling is reached.
///
/// Check errors are logged and count as a failed attempt.
pub async fn poll_until_ready<T, F, Fut>(policy: &BackoffPolicy, mut check: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<PollStatus<T>>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 0..attempts {
        match check().await {
            Ok(PollStatus::Ready(value)) => return Ok(value),
            Ok(PollStatus::Pending) => {
                debug!(attempt = attempt + 1, attempts, "Result not ready yet");
            }
            Err(e) => {
                warn!(attempt = attempt + 1, attempts, error = %e, "Poll attempt failed");
            }
        }

        if attempt + 1 < attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(StorageError::ResultUnavailable { attempts })
}
