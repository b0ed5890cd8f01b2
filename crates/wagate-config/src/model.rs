// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Wagate gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup with actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Wagate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WagateConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP/WebSocket gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Job queue and worker pool settings.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "wagate".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HMAC secret for signing and verifying bearer tokens.
    /// `None` rejects all authenticated requests (fail-closed).
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Bearer token lifetime in seconds, used when the login endpoint
    /// issues tokens.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Username accepted by the login endpoint. Logs in with the admin
    /// role. `None` disables password login entirely.
    #[serde(default)]
    pub admin_username: Option<String>,

    /// Password paired with `admin_username`.
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
            admin_username: None,
            admin_password: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_token_ttl_secs() -> u64 {
    86_400
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "wagate.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Job queue and worker pool configuration.
///
/// These are deployment capacity knobs. The jitter spread and the
/// unauthenticated-close grace window are fixed policy constants, not
/// configurable here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// Number of concurrent job workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum delivery attempts per job before it is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between consecutive recipient sends within a bulk job, in
    /// milliseconds.
    #[serde(default = "default_bulk_delay_ms")]
    pub bulk_delay_ms: u64,

    /// Spread each bulk delay by up to ±30%, so paced sends do not land on
    /// an exact metronome. Disable for deterministic pacing.
    #[serde(default = "default_bulk_jitter")]
    pub bulk_jitter: bool,

    /// How often idle workers poll for due jobs, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the recovery sweep reclaims jobs stuck `running` past
    /// their lease, in seconds.
    #[serde(default = "default_reclaim_interval_secs")]
    pub reclaim_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            bulk_delay_ms: default_bulk_delay_ms(),
            bulk_jitter: default_bulk_jitter(),
            poll_interval_ms: default_poll_interval_ms(),
            reclaim_interval_secs: default_reclaim_interval_secs(),
        }
    }
}

fn default_workers() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_bulk_delay_ms() -> u64 {
    5_000
}

fn default_bulk_jitter() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_reclaim_interval_secs() -> u64 {
    60
}
