// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job record operations for crash-safe queue processing.
//!
//! The claim operation is a single transaction flipping the oldest due
//! `pending` row to `running`, so two workers can never claim the same job.

use std::str::FromStr;

use rusqlite::params;
use wagate_core::GateError;
use wagate_core::types::{JobKind, JobRecord, JobStatus};

use crate::database::{Database, map_tr_err, now_utc, utc_after_secs};

const JOB_COLUMNS: &str = "id, kind, session_id, payload, status, attempts, max_attempts, \
     scheduled_for, next_attempt_at, total, succeeded, failed, locked_until, \
     last_error, created_at, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRecord> {
    let kind_text: String = row.get(1)?;
    let status_text: String = row.get(4)?;
    let kind = JobKind::from_str(&kind_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status = JobStatus::from_str(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(JobRecord {
        id: row.get(0)?,
        kind,
        session_id: row.get(2)?,
        payload: row.get(3)?,
        status,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        scheduled_for: row.get(7)?,
        next_attempt_at: row.get(8)?,
        total: row.get(9)?,
        succeeded: row.get(10)?,
        failed: row.get(11)?,
        locked_until: row.get(12)?,
        last_error: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Insert a new job record.
pub async fn insert_job(db: &Database, record: &JobRecord) -> Result<(), GateError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs (id, kind, session_id, payload, status, attempts,
                                   max_attempts, scheduled_for, next_attempt_at, total,
                                   succeeded, failed, locked_until, last_error,
                                   created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    record.id,
                    record.kind.to_string(),
                    record.session_id,
                    record.payload,
                    record.status.to_string(),
                    record.attempts,
                    record.max_attempts,
                    record.scheduled_for,
                    record.next_attempt_at,
                    record.total,
                    record.succeeded,
                    record.failed,
                    record.locked_until,
                    record.last_error,
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a job by id.
pub async fn get_job(db: &Database, id: &str) -> Result<Option<JobRecord>, GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_job) {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List jobs with optional status/kind filters and limit/offset pagination.
pub async fn list_jobs(
    db: &Database,
    status: Option<JobStatus>,
    kind: Option<JobKind>,
    limit: u32,
    offset: u32,
) -> Result<Vec<JobRecord>, GateError> {
    db.connection()
        .call(move |conn| {
            let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1=1");
            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            if let Some(status) = status {
                sql.push_str(&format!(" AND status = ?{}", args.len() + 1));
                args.push(Box::new(status.to_string()));
            }
            if let Some(kind) = kind {
                sql.push_str(&format!(" AND kind = ?{}", args.len() + 1));
                args.push(Box::new(kind.to_string()));
            }
            sql.push_str(&format!(
                " ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
                args.len() + 1,
                args.len() + 2
            ));
            args.push(Box::new(limit));
            args.push(Box::new(offset));

            let mut stmt = conn.prepare(&sql)?;
            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                args.iter().map(|a| a.as_ref()).collect();
            let rows = stmt.query_map(params_ref.as_slice(), row_to_job)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// List jobs whose session belongs to `owner_id`, with the same filters and
/// pagination as `list_jobs`.
pub async fn list_jobs_for_owner(
    db: &Database,
    owner_id: &str,
    status: Option<JobStatus>,
    kind: Option<JobKind>,
    limit: u32,
    offset: u32,
) -> Result<Vec<JobRecord>, GateError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let qualified = JOB_COLUMNS
                .split(", ")
                .map(|c| format!("jobs.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut sql = format!(
                "SELECT {qualified} FROM jobs
                 JOIN sessions ON sessions.id = jobs.session_id
                 WHERE sessions.owner_id = ?1"
            );
            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(owner_id)];
            if let Some(status) = status {
                sql.push_str(&format!(" AND jobs.status = ?{}", args.len() + 1));
                args.push(Box::new(status.to_string()));
            }
            if let Some(kind) = kind {
                sql.push_str(&format!(" AND jobs.kind = ?{}", args.len() + 1));
                args.push(Box::new(kind.to_string()));
            }
            sql.push_str(&format!(
                " ORDER BY jobs.created_at DESC LIMIT ?{} OFFSET ?{}",
                args.len() + 1,
                args.len() + 2
            ));
            args.push(Box::new(limit));
            args.push(Box::new(offset));

            let mut stmt = conn.prepare(&sql)?;
            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                args.iter().map(|a| a.as_ref()).collect();
            let rows = stmt.query_map(params_ref.as_slice(), row_to_job)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next due pending job.
///
/// Atomically selects the oldest `pending` job whose `scheduled_for` and
/// `next_attempt_at` gates have passed and marks it `running` with a
/// `lease_secs` liveness lease. Returns `None` when nothing is due.
pub async fn claim_due_job(
    db: &Database,
    lease_secs: i64,
) -> Result<Option<JobRecord>, GateError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now_utc();

            let result = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE status = 'pending'
                       AND (scheduled_for IS NULL OR scheduled_for <= ?1)
                       AND (next_attempt_at IS NULL OR next_attempt_at <= ?1)
                     ORDER BY created_at ASC
                     LIMIT 1"
                ))?;
                stmt.query_row(params![now], row_to_job)
            };

            match result {
                Ok(record) => {
                    let locked_until = utc_after_secs(lease_secs);
                    tx.execute(
                        "UPDATE jobs SET status = 'running', locked_until = ?1,
                         updated_at = ?2 WHERE id = ?3",
                        params![locked_until, now, record.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(JobRecord {
                        status: JobStatus::Running,
                        locked_until: Some(locked_until),
                        ..record
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a running job completed.
pub async fn complete_job(db: &Database, id: &str) -> Result<(), GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'completed', locked_until = NULL,
                 last_error = NULL, updated_at = ?1 WHERE id = ?2",
                params![now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt.
///
/// Increments attempts. If attempts reach the maximum, the job becomes
/// `failed`; otherwise it returns to `pending` with an exponential backoff
/// gate (`backoff_base_secs * 2^(attempts-1)`). Returns the resulting status.
pub async fn fail_job(
    db: &Database,
    id: &str,
    error: &str,
    backoff_base_secs: i64,
) -> Result<JobStatus, GateError> {
    let id = id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let (attempts, max_attempts): (u32, u32) = tx.query_row(
                "SELECT attempts, max_attempts FROM jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let status = if new_attempts >= max_attempts {
                tx.execute(
                    "UPDATE jobs SET status = 'failed', attempts = ?1,
                     locked_until = NULL, last_error = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![new_attempts, error, now_utc(), id],
                )?;
                JobStatus::Failed
            } else {
                // Cap the exponent; past 2^20 the gate is years out anyway
                // and an unbounded shift would overflow.
                let backoff = backoff_base_secs.saturating_mul(1 << (new_attempts - 1).min(20));
                tx.execute(
                    "UPDATE jobs SET status = 'pending', attempts = ?1,
                     next_attempt_at = ?2, locked_until = NULL, last_error = ?3,
                     updated_at = ?4 WHERE id = ?5",
                    params![new_attempts, utc_after_secs(backoff), error, now_utc(), id],
                )?;
                JobStatus::Pending
            };
            tx.commit()?;
            Ok(status)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a job as failed without retry (e.g. a bulk job aborted mid-run).
pub async fn abort_job(db: &Database, id: &str, error: &str) -> Result<(), GateError> {
    let id = id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'failed', locked_until = NULL,
                 last_error = ?1, updated_at = ?2 WHERE id = ?3",
                params![error, now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Cancel a job iff it is still pending. Returns true if the row changed.
pub async fn cancel_if_pending(db: &Database, id: &str) -> Result<bool, GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE jobs SET status = 'cancelled', updated_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![now_utc(), id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a running job cancelled, after its worker observed the cancellation.
pub async fn mark_cancelled(db: &Database, id: &str) -> Result<(), GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'cancelled', locked_until = NULL,
                 updated_at = ?1 WHERE id = ?2",
                params![now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Reset a failed job to pending, iff attempts remain. Returns true if the
/// row changed.
pub async fn retry_failed(db: &Database, id: &str) -> Result<bool, GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE jobs SET status = 'pending', next_attempt_at = NULL,
                 last_error = NULL, updated_at = ?1
                 WHERE id = ?2 AND status = 'failed' AND attempts < max_attempts",
                params![now_utc(), id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Update bulk progress counters after each per-recipient attempt.
pub async fn update_progress(
    db: &Database,
    id: &str,
    succeeded: u32,
    failed: u32,
    last_error: Option<&str>,
) -> Result<(), GateError> {
    let id = id.to_string();
    let last_error = last_error.map(str::to_string);
    db.connection()
        .call(move |conn| {
            match last_error {
                Some(err) => conn.execute(
                    "UPDATE jobs SET succeeded = ?1, failed = ?2, last_error = ?3,
                     updated_at = ?4 WHERE id = ?5",
                    params![succeeded, failed, err, now_utc(), id],
                )?,
                None => conn.execute(
                    "UPDATE jobs SET succeeded = ?1, failed = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![succeeded, failed, now_utc(), id],
                )?,
            };
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all jobs older than `age_secs`, regardless of status. Returns the
/// number of rows removed.
pub async fn cleanup_older_than(db: &Database, age_secs: i64) -> Result<usize, GateError> {
    db.connection()
        .call(move |conn| {
            let cutoff = utc_after_secs(-age_secs);
            let n = conn.execute("DELETE FROM jobs WHERE created_at < ?1", params![cutoff])?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Reclaim jobs stuck `running` past their liveness lease back to `pending`.
///
/// Run on service start and periodically; this is what makes worker crashes
/// at-least-once instead of lost-forever.
pub async fn reclaim_stuck(db: &Database) -> Result<usize, GateError> {
    db.connection()
        .call(move |conn| {
            let now = now_utc();
            let n = conn.execute(
                "UPDATE jobs SET status = 'pending', locked_until = NULL, updated_at = ?1
                 WHERE status = 'running' AND locked_until IS NOT NULL AND locked_until < ?1",
                params![now],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}
