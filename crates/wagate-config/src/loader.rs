// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wagate.toml` > `~/.config/wagate/wagate.toml` >
//! `/etc/wagate/wagate.toml`, with environment variable overrides via the
//! `WAGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WagateConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wagate/wagate.toml` (system-wide)
/// 3. `~/.config/wagate/wagate.toml` (user XDG config)
/// 4. `./wagate.toml` (local directory)
/// 5. `WAGATE_*` environment variables
pub fn load_config() -> Result<WagateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<WagateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WagateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WagateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WagateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WagateConfig::default()))
        .merge(Toml::file("/etc/wagate/wagate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("wagate/wagate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("wagate.toml"))
        .merge(env_provider())
}

/// Environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so keys that themselves
/// contain underscores map correctly: `WAGATE_GATEWAY_TOKEN_SECRET` must
/// become `gateway.token_secret`, not `gateway.token.secret`.
fn env_provider() -> Env {
    Env::prefixed("WAGATE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("jobs_", "jobs.", 1);
        mapped.into()
    })
}
