// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wagate serve` command implementation.
//!
//! Opens the SQLite store, hydrates the session registry, starts the job
//! worker pool, and runs the HTTP/WebSocket gateway until a shutdown signal
//! arrives.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use wagate_config::WagateConfig;
use wagate_core::GateError;
use wagate_gateway::{
    GatewayState, ServerConfig, StaticCredentialVerifier, TokenService, start_server,
};
use wagate_jobs::{JobQueue, WorkerPool, WorkerSettings};
use wagate_session::{LoginRateLimiter, SessionManager};
use wagate_storage::Database;

use crate::driver::UnconfiguredClientFactory;
use crate::shutdown;

/// How often stale login rate-limiter entries are swept.
const LIMITER_GC_INTERVAL: Duration = Duration::from_secs(300);

/// Runs the `wagate serve` command.
pub async fn run_serve(config: WagateConfig) -> Result<(), GateError> {
    init_tracing(&config.service.log_level);

    info!(service = config.service.name.as_str(), "starting wagate serve");

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;

    let manager = SessionManager::new(db.clone(), Arc::new(UnconfiguredClientFactory));
    let hydrated = manager.hydrate().await?;
    info!(sessions = hydrated, "session registry hydrated");

    let queue = JobQueue::new(db.clone(), config.jobs.max_attempts);

    let cancel = shutdown::install_signal_handler();

    let settings = WorkerSettings {
        workers: config.jobs.workers,
        poll_interval: Duration::from_millis(config.jobs.poll_interval_ms),
        reclaim_interval: Duration::from_secs(config.jobs.reclaim_interval_secs),
        bulk_delay: Duration::from_millis(config.jobs.bulk_delay_ms),
        bulk_jitter: config.jobs.bulk_jitter,
        ..WorkerSettings::default()
    };
    let pool = WorkerPool::new(queue.clone(), manager.clone(), settings);
    pool.spawn(cancel.clone());
    info!(
        workers = config.jobs.workers,
        max_attempts = config.jobs.max_attempts,
        "job worker pool started"
    );

    if config.gateway.token_secret.is_none() {
        warn!("gateway.token_secret is not set -- all authenticated routes will reject");
    }
    if config.gateway.admin_username.is_none() {
        warn!("gateway.admin_username is not set -- password login is disabled");
    }

    let limiter = Arc::new(LoginRateLimiter::new());
    {
        let limiter = limiter.clone();
        let gc_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LIMITER_GC_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => limiter.gc().await,
                    _ = gc_cancel.cancelled() => break,
                }
            }
        });
    }

    let state = GatewayState {
        manager,
        queue,
        limiter,
        verifier: Arc::new(StaticCredentialVerifier::new(
            config.gateway.admin_username.clone(),
            config.gateway.admin_password.clone(),
        )),
        tokens: TokenService::new(
            config.gateway.token_secret.clone(),
            config.gateway.token_ttl_secs,
        ),
        start_time: std::time::Instant::now(),
    };

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    start_server(&server_config, state, cancel).await?;

    db.close().await?;
    info!("wagate serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wagate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
