// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue service: enqueue, inspect, cancel, retry, cleanup.
//!
//! Enqueue validates and persists; execution belongs to the worker pool.
//! Cancellation of a running job is cooperative: the queue cancels the
//! job's token and the executing worker observes it before the next send.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use wagate_core::GateError;
use wagate_core::types::{JobKind, JobRecord, JobStatus};
use wagate_storage::{Database, now_utc, queries};

use crate::payload::{BulkPayload, SendPayload};

/// Input for `enqueue`.
#[derive(Debug, Clone)]
pub struct EnqueueJob {
    pub kind: JobKind,
    pub session_id: String,
    /// Kind-specific payload JSON (see `payload`).
    pub payload: String,
    /// RFC 3339; required for `scheduled`, rejected otherwise.
    pub scheduled_for: Option<String>,
}

#[derive(Clone)]
pub struct JobQueue {
    db: Database,
    running: Arc<DashMap<String, CancellationToken>>,
    max_attempts: u32,
}

impl JobQueue {
    pub fn new(db: Database, max_attempts: u32) -> Self {
        Self {
            db,
            running: Arc::new(DashMap::new()),
            max_attempts,
        }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn running(&self) -> &Arc<DashMap<String, CancellationToken>> {
        &self.running
    }

    /// Validate and persist a new `pending` job; returns without waiting for
    /// execution.
    pub async fn enqueue(&self, input: EnqueueJob) -> Result<JobRecord, GateError> {
        let total = match input.kind {
            JobKind::Single | JobKind::Scheduled => {
                SendPayload::parse(&input.payload)?;
                0
            }
            JobKind::Bulk => BulkPayload::parse(&input.payload)?.recipients.len() as u32,
        };

        let scheduled_for = match (input.kind, input.scheduled_for) {
            (JobKind::Scheduled, Some(at)) => Some(normalize_timestamp(&at)?),
            (JobKind::Scheduled, None) => {
                return Err(GateError::InvalidInput(
                    "scheduled job requires scheduled_for".into(),
                ));
            }
            (_, Some(_)) => {
                return Err(GateError::InvalidInput(
                    "scheduled_for is only valid for scheduled jobs".into(),
                ));
            }
            (_, None) => None,
        };

        let now = now_utc();
        let record = JobRecord {
            id: Uuid::new_v4().to_string(),
            kind: input.kind,
            session_id: input.session_id,
            payload: input.payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: self.max_attempts,
            scheduled_for,
            next_attempt_at: None,
            total,
            succeeded: 0,
            failed: 0,
            locked_until: None,
            last_error: None,
            created_at: now.clone(),
            updated_at: now,
        };
        queries::jobs::insert_job(&self.db, &record).await?;
        tracing::info!(job_id = %record.id, kind = %record.kind, session_id = %record.session_id, "job enqueued");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<JobRecord, GateError> {
        queries::jobs::get_job(&self.db, id)
            .await?
            .ok_or(GateError::NotFound)
    }

    pub async fn list(
        &self,
        status: Option<JobStatus>,
        kind: Option<JobKind>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<JobRecord>, GateError> {
        queries::jobs::list_jobs(&self.db, status, kind, limit, offset).await
    }

    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        status: Option<JobStatus>,
        kind: Option<JobKind>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<JobRecord>, GateError> {
        queries::jobs::list_jobs_for_owner(&self.db, owner_id, status, kind, limit, offset).await
    }

    /// Cancel a job.
    ///
    /// Pending jobs flip to `cancelled` atomically. Running jobs get their
    /// token cancelled and the worker records the terminal status; a
    /// `running` row with no live worker (stale lease) is cancelled directly.
    /// Terminal jobs are an `InvalidState` error.
    pub async fn cancel(&self, id: &str) -> Result<(), GateError> {
        let job = self.get(id).await?;
        match job.status {
            JobStatus::Pending => {
                if queries::jobs::cancel_if_pending(&self.db, id).await? {
                    tracing::info!(job_id = %id, "pending job cancelled");
                    Ok(())
                } else {
                    // Lost the race against a claim or another cancel.
                    Err(GateError::InvalidState)
                }
            }
            JobStatus::Running => {
                match self.running.get(id) {
                    Some(token) => {
                        token.cancel();
                        tracing::info!(job_id = %id, "running job cancellation requested");
                    }
                    None => {
                        queries::jobs::mark_cancelled(&self.db, id).await?;
                        tracing::info!(job_id = %id, "orphaned running job cancelled");
                    }
                }
                Ok(())
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                Err(GateError::InvalidState)
            }
        }
    }

    /// Re-queue a failed job, if attempts remain.
    pub async fn retry(&self, id: &str) -> Result<JobRecord, GateError> {
        let job = self.get(id).await?;
        if job.status != JobStatus::Failed {
            return Err(GateError::InvalidState);
        }
        if !queries::jobs::retry_failed(&self.db, id).await? {
            return Err(GateError::InvalidState);
        }
        tracing::info!(job_id = %id, "failed job re-queued");
        self.get(id).await
    }

    /// Delete jobs older than `age_secs` regardless of status.
    pub async fn cleanup(&self, age_secs: i64) -> Result<usize, GateError> {
        let removed = queries::jobs::cleanup_older_than(&self.db, age_secs).await?;
        if removed > 0 {
            tracing::info!(removed, "old jobs cleaned up");
        }
        Ok(removed)
    }

    /// Return stuck `running` rows with expired leases to `pending`.
    pub async fn reclaim(&self) -> Result<usize, GateError> {
        let reclaimed = queries::jobs::reclaim_stuck(&self.db).await?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "stuck jobs reclaimed");
        }
        Ok(reclaimed)
    }
}

/// Parse an RFC 3339 timestamp and normalize it to the storage format so
/// lexicographic comparisons against generated timestamps hold.
fn normalize_timestamp(value: &str) -> Result<String, GateError> {
    let parsed = chrono::DateTime::parse_from_rfc3339(value)
        .map_err(|e| GateError::InvalidInput(format!("invalid scheduled_for: {e}")))?;
    Ok(parsed
        .with_timezone(&chrono::Utc)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string())
}
