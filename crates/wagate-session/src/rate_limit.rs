// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Login rate limiter: per-address consecutive-failure tracking.
//!
//! Five consecutive failures block an address for fifteen minutes. A
//! successful login clears the count and any active block. Entries for
//! addresses idle past the block window are evicted opportunistically.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use wagate_core::GateError;

const MAX_CONSECUTIVE_FAILURES: u32 = 5;
const BLOCK_DURATION: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
struct Entry {
    failures: u32,
    blocked_until: Option<Instant>,
    last_attempt: Instant,
}

/// Tracks login failures per client address.
pub struct LoginRateLimiter {
    max_failures: u32,
    block: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_policy(MAX_CONSECUTIVE_FAILURES, BLOCK_DURATION)
    }

    pub fn with_policy(max_failures: u32, block: Duration) -> Self {
        Self {
            max_failures,
            block,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fail with `RateLimited` if `addr` is currently blocked.
    ///
    /// The login endpoint calls this before verifying credentials, so blocked
    /// addresses never reach the verifier.
    pub async fn check(&self, addr: &str) -> Result<(), GateError> {
        let entries = self.entries.lock().await;
        if let Some(entry) = entries.get(addr) {
            if let Some(until) = entry.blocked_until {
                let now = Instant::now();
                if until > now {
                    return Err(GateError::RateLimited {
                        retry_after_secs: (until - now).as_secs().max(1),
                    });
                }
            }
        }
        Ok(())
    }

    /// Record the outcome of a login attempt.
    ///
    /// Success clears the failure count and any block. The failure that
    /// reaches the threshold starts the block window.
    pub async fn record_attempt(&self, addr: &str, success: bool) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if success {
            entries.remove(addr);
            return;
        }

        let entry = entries.entry(addr.to_string()).or_insert(Entry {
            failures: 0,
            blocked_until: None,
            last_attempt: now,
        });

        // An expired block resets the count before the new failure lands.
        if matches!(entry.blocked_until, Some(until) if until <= now) {
            entry.failures = 0;
            entry.blocked_until = None;
        }

        entry.failures += 1;
        entry.last_attempt = now;
        if entry.failures >= self.max_failures {
            entry.blocked_until = Some(now + self.block);
            tracing::warn!(addr, failures = entry.failures, "login address blocked");
        }
    }

    /// How much longer `addr` stays blocked, or `None` if it is not.
    pub async fn retry_after(&self, addr: &str) -> Option<Duration> {
        let entries = self.entries.lock().await;
        let until = entries.get(addr)?.blocked_until?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }

    /// Attempts left before `addr` gets blocked.
    pub async fn remaining(&self, addr: &str) -> u32 {
        let entries = self.entries.lock().await;
        match entries.get(addr) {
            Some(entry) => self.max_failures.saturating_sub(entry.failures),
            None => self.max_failures,
        }
    }

    /// Evict entries idle past the block window to bound memory growth.
    pub async fn gc(&self) {
        let now = Instant::now();
        let block = self.block;
        self.entries.lock().await.retain(|_, entry| {
            let blocked = matches!(entry.blocked_until, Some(until) if until > now);
            blocked || now - entry.last_attempt < block
        });
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
