// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: valid bind addresses, non-empty paths, sane worker counts.

use crate::diagnostic::ConfigError;
use crate::model::WagateConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all failures rather than failing fast.
pub fn validate_config(config: &WagateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if let Some(secret) = &config.gateway.token_secret
        && secret.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "gateway.token_secret must not be empty when set".to_string(),
        });
    }

    match (
        &config.gateway.admin_username,
        &config.gateway.admin_password,
    ) {
        (Some(_), None) | (None, Some(_)) => {
            errors.push(ConfigError::Validation {
                message: "gateway.admin_username and gateway.admin_password must be set together"
                    .to_string(),
            });
        }
        (Some(username), Some(password)) => {
            if username.trim().is_empty() || password.is_empty() {
                errors.push(ConfigError::Validation {
                    message: "gateway.admin_username and gateway.admin_password must not be empty"
                        .to_string(),
                });
            }
        }
        (None, None) => {}
    }

    if config.jobs.workers == 0 {
        errors.push(ConfigError::Validation {
            message: "jobs.workers must be at least 1".to_string(),
        });
    }

    if config.jobs.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "jobs.max_attempts must be at least 1".to_string(),
        });
    } else if config.jobs.max_attempts > 100 {
        errors.push(ConfigError::Validation {
            message: "jobs.max_attempts must be at most 100".to_string(),
        });
    }

    if config.jobs.poll_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "jobs.poll_interval_ms must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
