// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the embedded database | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `IPFS_API_URL` | IPFS RPC endpoint; empty or `off` runs local-only | `https://ipfs.infura.io:5001` |
//! | `IPFS_GATEWAY_URL` | Read gateway recorded in record metadata | `https://ipfs.io` |
//! | `IPFS_GATEWAY_READS` | Read remote records through the gateway when no node is connected | `true` |
//! | `IPFS_PROJECT_ID` | Basic-auth user for hosted endpoints | Optional |
//! | `IPFS_PROJECT_SECRET` | Basic-auth password for hosted endpoints | Optional |
//! | `IPFS_TIMEOUT_MS` | Timeout for a single put/get | `30000` |
//! | `IPFS_CONNECT_ATTEMPTS` | Connection attempts before going local-only | `3` |
//! | `STORAGE_LOCAL_FALLBACK` | Retry failed distributed writes locally | `true` |
//! | `BLOB_CACHE_CAPACITY` | Fetched blobs kept in memory | `256` |
//! | `BLOB_CACHE_TTL_SECS` | Lifetime of a cached blob | `600` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::storage::ipfs::ApiCredentials;
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the local data directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// IPFS RPC API base URL. `off` (or empty) skips the backend entirely.
pub const IPFS_API_URL_ENV: &str = "IPFS_API_URL";
pub const IPFS_GATEWAY_URL_ENV: &str = "IPFS_GATEWAY_URL";
pub const IPFS_GATEWAY_READS_ENV: &str = "IPFS_GATEWAY_READS";
pub const IPFS_PROJECT_ID_ENV: &str = "IPFS_PROJECT_ID";
pub const IPFS_PROJECT_SECRET_ENV: &str = "IPFS_PROJECT_SECRET";
pub const IPFS_TIMEOUT_MS_ENV: &str = "IPFS_TIMEOUT_MS";
pub const IPFS_CONNECT_ATTEMPTS_ENV: &str = "IPFS_CONNECT_ATTEMPTS";
pub const STORAGE_LOCAL_FALLBACK_ENV: &str = "STORAGE_LOCAL_FALLBACK";
pub const BLOB_CACHE_CAPACITY_ENV: &str = "BLOB_CACHE_CAPACITY";
pub const BLOB_CACHE_TTL_SECS_ENV: &str = "BLOB_CACHE_TTL_SECS";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_IPFS_API_URL: &str = "https://ipfs.infura.io:5001";
pub const DEFAULT_IPFS_GATEWAY_URL: &str = "https://ipfs.io";
pub const DEFAULT_IPFS_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_IPFS_CONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BLOB_CACHE_CAPACITY: usize = 256;
pub const DEFAULT_BLOB_CACHE_TTL_SECS: u64 = 600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} has an invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Everything the storage layer needs to start.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// `None` runs local-only without probing a backend.
    pub ipfs_api_url: Option<Url>,
    /// Validated, without trailing slash.
    pub gateway_url: String,
    /// Fetch non-local identifiers from the gateway in Fallback mode.
    pub gateway_reads: bool,
    pub credentials: Option<ApiCredentials>,
    pub request_timeout: Duration,
    pub connect_attempts: u32,
    pub local_fallback: bool,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl StorageConfig {
    /// Load from environment variables, applying defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Local-only configuration rooted at `data_dir`: no node, no gateway
    /// reads.
    pub fn local_only(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ipfs_api_url: None,
            gateway_url: DEFAULT_IPFS_GATEWAY_URL.to_string(),
            gateway_reads: false,
            credentials: None,
            request_timeout: Duration::from_millis(DEFAULT_IPFS_TIMEOUT_MS),
            connect_attempts: DEFAULT_IPFS_CONNECT_ATTEMPTS,
            local_fallback: true,
            cache_capacity: DEFAULT_BLOB_CACHE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_BLOB_CACHE_TTL_SECS),
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string());

        let data_dir = get(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DATA_ROOT.to_string());

        let ipfs_api_url = match get(IPFS_API_URL_ENV) {
            Some(v) if v.is_empty() || v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(parse_url(IPFS_API_URL_ENV, &v)?),
            None => Some(parse_url(IPFS_API_URL_ENV, DEFAULT_IPFS_API_URL)?),
        };

        let gateway_url = get(IPFS_GATEWAY_URL_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_IPFS_GATEWAY_URL.to_string());
        parse_url(IPFS_GATEWAY_URL_ENV, &gateway_url)?;
        let gateway_url = gateway_url.trim_end_matches('/').to_string();

        let credentials = match (get(IPFS_PROJECT_ID_ENV), get(IPFS_PROJECT_SECRET_ENV)) {
            (Some(username), Some(password)) if !username.is_empty() => Some(ApiCredentials {
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            ipfs_api_url,
            gateway_url,
            gateway_reads: parse_bool(
                IPFS_GATEWAY_READS_ENV,
                get(IPFS_GATEWAY_READS_ENV),
                true,
            )?,
            credentials,
            request_timeout: Duration::from_millis(parse_or(
                IPFS_TIMEOUT_MS_ENV,
                get(IPFS_TIMEOUT_MS_ENV),
                DEFAULT_IPFS_TIMEOUT_MS,
            )?),
            connect_attempts: parse_or(
                IPFS_CONNECT_ATTEMPTS_ENV,
                get(IPFS_CONNECT_ATTEMPTS_ENV),
                DEFAULT_IPFS_CONNECT_ATTEMPTS,
            )?,
            local_fallback: parse_bool(
                STORAGE_LOCAL_FALLBACK_ENV,
                get(STORAGE_LOCAL_FALLBACK_ENV),
                true,
            )?,
            cache_capacity: parse_or(
                BLOB_CACHE_CAPACITY_ENV,
                get(BLOB_CACHE_CAPACITY_ENV),
                DEFAULT_BLOB_CACHE_CAPACITY,
            )?,
            cache_ttl: Duration::from_secs(parse_or(
                BLOB_CACHE_TTL_SECS_ENV,
                get(BLOB_CACHE_TTL_SECS_ENV),
                DEFAULT_BLOB_CACHE_TTL_SECS,
            )?),
        })
    }
}

/// `HOST:PORT` to bind the HTTP server to.
pub fn bind_address() -> Result<String, ConfigError> {
    let host = std::env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = parse_or(PORT_ENV, std::env::var(PORT_ENV).ok(), DEFAULT_PORT)?;
    Ok(format!("{host}:{port}"))
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: v }),
        _ => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name, value: raw }),
    }
}
