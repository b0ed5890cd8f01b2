// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk dispatcher: paced fan-out of one job across many recipients.
//!
//! Recipients run in their payload order against one session. A single
//! recipient failure is recorded and the run continues; the whole job only
//! aborts when the session loses authentication mid-run. Progress counters
//! persist after every attempt, so a reclaimed job resumes where it stopped.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use wagate_core::GateError;
use wagate_core::types::JobRecord;
use wagate_session::SessionManager;
use wagate_storage::{Database, queries};

use crate::payload::{BulkPayload, render};

/// Spread applied to the inter-send delay, ±30%.
const PACING_JITTER: f64 = 0.3;

/// How a bulk run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Every recipient was attempted.
    Completed,
    /// The cancellation token fired mid-run.
    Cancelled,
    /// The run stopped early; the reason lands in `last_error`.
    Aborted(String),
}

/// Execute a bulk job. The caller translates the outcome into the terminal
/// job status.
pub async fn run(
    db: &Database,
    manager: &SessionManager,
    job: &JobRecord,
    payload: &BulkPayload,
    delay: Duration,
    jitter: bool,
    cancel: &CancellationToken,
) -> Result<BulkOutcome, GateError> {
    let mut succeeded = job.succeeded;
    let mut failed = job.failed;
    // Resume after a reclaim: skip recipients already attempted.
    let start = (succeeded + failed) as usize;
    let last = payload.recipients.len() - 1;

    for (index, recipient) in payload.recipients.iter().enumerate().skip(start) {
        if cancel.is_cancelled() {
            tracing::info!(job_id = %job.id, attempted = index, "bulk run cancelled");
            return Ok(BulkOutcome::Cancelled);
        }
        if !manager.is_ready(&job.session_id).await {
            tracing::warn!(job_id = %job.id, attempted = index, "bulk run lost session auth");
            return Ok(BulkOutcome::Aborted("session not authenticated".into()));
        }

        let content = render(&payload.content, &recipient.variables);
        match manager.dispatch(&job.session_id, &recipient.to, &content).await {
            Ok(_) => {
                succeeded += 1;
                queries::jobs::update_progress(db, &job.id, succeeded, failed, None).await?;
            }
            Err(error) => {
                failed += 1;
                tracing::debug!(job_id = %job.id, to = %recipient.to, %error, "bulk recipient failed");
                queries::jobs::update_progress(
                    db,
                    &job.id,
                    succeeded,
                    failed,
                    Some(&error.to_string()),
                )
                .await?;
            }
        }

        if index < last {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(job_id = %job.id, attempted = index + 1, "bulk run cancelled");
                    return Ok(BulkOutcome::Cancelled);
                }
                _ = tokio::time::sleep(pacing(delay, jitter)) => {}
            }
        }
    }

    tracing::info!(job_id = %job.id, succeeded, failed, "bulk run completed");
    Ok(BulkOutcome::Completed)
}

fn pacing(delay: Duration, jitter: bool) -> Duration {
    if delay.is_zero() || !jitter {
        return delay;
    }
    let factor = rand::thread_rng().gen_range(1.0 - PACING_JITTER..=1.0 + PACING_JITTER);
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use wagate_core::types::{Identity, JobKind, JobStatus, Role};
    use wagate_session::CreateSession;
    use wagate_storage::now_utc;
    use wagate_test_utils::MockClientFactory;

    async fn setup() -> (
        Database,
        SessionManager,
        Arc<MockClientFactory>,
        String,
        tempfile::TempDir,
    ) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let factory = Arc::new(MockClientFactory::new());
        let manager = SessionManager::new(db.clone(), factory.clone());
        let record = manager
            .create(
                &Identity::new("alice", Role::User),
                CreateSession {
                    name: "bulk".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        factory
            .client_for(&record.id)
            .unwrap()
            .set_authenticated(true, true);
        (db, manager, factory, record.id, dir)
    }

    fn bulk_payload(recipients: &[&str]) -> BulkPayload {
        let entries = recipients
            .iter()
            .map(|to| format!(r#"{{"to":"{to}"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        BulkPayload::parse(&format!(
            r#"{{"recipients":[{entries}],"content":{{"type":"text","body":"hi"}}}}"#
        ))
        .unwrap()
    }

    async fn insert_bulk_job(db: &Database, session_id: &str, total: u32) -> JobRecord {
        let record = JobRecord {
            id: uuid::Uuid::new_v4().to_string(),
            kind: JobKind::Bulk,
            session_id: session_id.to_string(),
            payload: String::new(),
            status: JobStatus::Running,
            attempts: 0,
            max_attempts: 3,
            scheduled_for: None,
            next_attempt_at: None,
            total,
            succeeded: 0,
            failed: 0,
            locked_until: None,
            last_error: None,
            created_at: now_utc(),
            updated_at: now_utc(),
        };
        queries::jobs::insert_job(db, &record).await.unwrap();
        record
    }

    #[tokio::test(start_paused = true)]
    async fn paces_between_sends() {
        let (db, manager, factory, session_id, _dir) = setup().await;
        let job = insert_bulk_job(&db, &session_id, 3).await;
        let payload = bulk_payload(&["1", "2", "3"]);

        let started = tokio::time::Instant::now();
        let outcome = run(
            &db,
            &manager,
            &job,
            &payload,
            Duration::from_secs(2),
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, BulkOutcome::Completed);

        // Two full 2-second inter-send gaps, and none after the final send.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
        assert_eq!(
            factory.client_for(&session_id).unwrap().sent_count().await,
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_keeps_pacing_within_band() {
        let (db, manager, factory, session_id, _dir) = setup().await;
        let job = insert_bulk_job(&db, &session_id, 3).await;
        let payload = bulk_payload(&["1", "2", "3"]);

        let started = tokio::time::Instant::now();
        let outcome = run(
            &db,
            &manager,
            &job,
            &payload,
            Duration::from_secs(2),
            true,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, BulkOutcome::Completed);

        // Each gap lands between 70% and 130% of the configured delay.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2 * 1400), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(2 * 2600), "{elapsed:?}");
        assert_eq!(
            factory.client_for(&session_id).unwrap().sent_count().await,
            3
        );
    }

    #[tokio::test]
    async fn recipient_failure_does_not_abort() {
        let (db, manager, factory, session_id, _dir) = setup().await;
        let job = insert_bulk_job(&db, &session_id, 3).await;
        let client = factory.client_for(&session_id).unwrap();
        client.push_send_error("blocked recipient").await;

        let outcome = run(
            &db,
            &manager,
            &job,
            &bulk_payload(&["1", "2", "3"]),
            Duration::ZERO,
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, BulkOutcome::Completed);

        let loaded = queries::jobs::get_job(&db, &job.id).await.unwrap().unwrap();
        assert_eq!(loaded.succeeded, 2);
        assert_eq!(loaded.failed, 1);
        assert_eq!(loaded.remaining(), 0);
        assert_eq!(loaded.last_error.as_deref(), Some("client error: blocked recipient"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_next_send() {
        let (db, manager, factory, session_id, _dir) = setup().await;
        let job = insert_bulk_job(&db, &session_id, 5).await;
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let outcome = run(
            &db,
            &manager,
            &job,
            &bulk_payload(&["1", "2", "3", "4", "5"]),
            Duration::from_secs(10),
            false,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(outcome, BulkOutcome::Cancelled);
        // Only the first send happened before the token fired mid-delay.
        assert_eq!(
            factory.client_for(&session_id).unwrap().sent_count().await,
            1
        );
    }

    #[tokio::test]
    async fn aborts_when_session_loses_auth() {
        let (db, manager, factory, session_id, _dir) = setup().await;
        let job = insert_bulk_job(&db, &session_id, 3).await;
        factory
            .client_for(&session_id)
            .unwrap()
            .set_authenticated(false, false);

        let outcome = run(
            &db,
            &manager,
            &job,
            &bulk_payload(&["1", "2", "3"]),
            Duration::ZERO,
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            BulkOutcome::Aborted("session not authenticated".into())
        );
    }

    #[tokio::test]
    async fn resumes_from_persisted_counters() {
        let (db, manager, factory, session_id, _dir) = setup().await;
        let mut job = insert_bulk_job(&db, &session_id, 4).await;
        // A previous worker already attempted the first two recipients.
        job.succeeded = 1;
        job.failed = 1;
        queries::jobs::update_progress(&db, &job.id, 1, 1, None)
            .await
            .unwrap();

        let outcome = run(
            &db,
            &manager,
            &job,
            &bulk_payload(&["1", "2", "3", "4"]),
            Duration::ZERO,
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, BulkOutcome::Completed);

        let client = factory.client_for(&session_id).unwrap();
        let sent = client.sent_messages().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "3");
        assert_eq!(sent[1].to, "4");

        let loaded = queries::jobs::get_job(&db, &job.id).await.unwrap().unwrap();
        assert_eq!(loaded.succeeded, 3);
        assert_eq!(loaded.failed, 1);
    }
}
