// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool: claims due jobs and executes them against session clients.
//!
//! Each worker loops claim → execute → claim until the queue is empty, then
//! polls. A reclaim task returns leases abandoned by crashed workers to
//! `pending`, on start and periodically.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use wagate_core::GateError;
use wagate_core::types::{JobKind, JobRecord, JobStatus};
use wagate_session::SessionManager;
use wagate_storage::queries;

use crate::bulk::{self, BulkOutcome};
use crate::payload::{BulkPayload, SendPayload};
use crate::queue::JobQueue;

/// Tuning knobs for the pool, from the `jobs` config section.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub workers: usize,
    pub poll_interval: Duration,
    pub reclaim_interval: Duration,
    /// Inter-send pacing for bulk jobs.
    pub bulk_delay: Duration,
    /// Spread each bulk delay by up to ±30%. Off means exact pacing.
    pub bulk_jitter: bool,
    /// Base of the exponential retry backoff.
    pub backoff_base_secs: i64,
    /// Worker liveness lease stamped on claim.
    pub lease_secs: i64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            poll_interval: Duration::from_millis(1000),
            reclaim_interval: Duration::from_secs(60),
            bulk_delay: Duration::from_millis(5000),
            bulk_jitter: true,
            backoff_base_secs: 30,
            lease_secs: 300,
        }
    }
}

pub struct WorkerPool {
    queue: JobQueue,
    manager: SessionManager,
    settings: WorkerSettings,
}

impl WorkerPool {
    pub fn new(queue: JobQueue, manager: SessionManager, settings: WorkerSettings) -> Self {
        Self {
            queue,
            manager,
            settings,
        }
    }

    /// Spawn the reclaim task and the worker tasks; all stop on `shutdown`.
    pub fn spawn(&self, shutdown: CancellationToken) {
        {
            let queue = self.queue.clone();
            let interval = self.settings.reclaim_interval;
            let cancel = shutdown.clone();
            tokio::spawn(async move {
                reclaim_loop(queue, interval, cancel).await;
            });
        }

        for worker_id in 0..self.settings.workers {
            let queue = self.queue.clone();
            let manager = self.manager.clone();
            let settings = self.settings.clone();
            let cancel = shutdown.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, queue, manager, settings, cancel).await;
            });
        }
        tracing::info!(workers = self.settings.workers, "worker pool started");
    }
}

/// Recovery sweep: runs once immediately, then on the interval.
async fn reclaim_loop(queue: JobQueue, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = queue.reclaim().await {
                    tracing::warn!(%error, "reclaim sweep failed");
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("reclaim task shutting down");
                break;
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: JobQueue,
    manager: SessionManager,
    settings: WorkerSettings,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match queries::jobs::claim_due_job(queue.db(), settings.lease_secs).await {
            Ok(Some(job)) => {
                tracing::debug!(worker_id, job_id = %job.id, kind = %job.kind, "job claimed");
                execute(&queue, &manager, &settings, job, &cancel).await;
                // Drain the queue before going back to sleep.
                continue;
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(worker_id, %error, "job claim failed");
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(settings.poll_interval) => {}
            _ = cancel.cancelled() => {
                tracing::debug!(worker_id, "worker shutting down");
                break;
            }
        }
    }
}

async fn execute(
    queue: &JobQueue,
    manager: &SessionManager,
    settings: &WorkerSettings,
    job: JobRecord,
    shutdown: &CancellationToken,
) {
    let token = CancellationToken::new();
    queue.running().insert(job.id.clone(), token.clone());
    let result = run_job(queue, manager, settings, &job, &token, shutdown).await;
    queue.running().remove(&job.id);
    if let Err(error) = result {
        tracing::warn!(job_id = %job.id, %error, "job bookkeeping failed");
    }
}

async fn run_job(
    queue: &JobQueue,
    manager: &SessionManager,
    settings: &WorkerSettings,
    job: &JobRecord,
    token: &CancellationToken,
    shutdown: &CancellationToken,
) -> Result<(), GateError> {
    let db = queue.db();
    match job.kind {
        JobKind::Single | JobKind::Scheduled => {
            let payload = match SendPayload::parse(&job.payload) {
                Ok(payload) => payload,
                Err(error) => {
                    // Malformed payloads never become valid; fail terminally.
                    return queries::jobs::abort_job(db, &job.id, &error.to_string()).await;
                }
            };
            if token.is_cancelled() {
                return queries::jobs::mark_cancelled(db, &job.id).await;
            }
            match manager.dispatch(&job.session_id, &payload.to, &payload.content).await {
                Ok(message_id) => {
                    tracing::info!(job_id = %job.id, message_id = %message_id.0, "job completed");
                    queries::jobs::complete_job(db, &job.id).await
                }
                Err(error) => {
                    let status = queries::jobs::fail_job(
                        db,
                        &job.id,
                        &error.to_string(),
                        settings.backoff_base_secs,
                    )
                    .await?;
                    match status {
                        JobStatus::Pending => {
                            tracing::info!(job_id = %job.id, %error, "job failed, will retry")
                        }
                        _ => tracing::warn!(job_id = %job.id, %error, "job failed terminally"),
                    }
                    Ok(())
                }
            }
        }
        JobKind::Bulk => {
            let payload = match BulkPayload::parse(&job.payload) {
                Ok(payload) => payload,
                Err(error) => {
                    return queries::jobs::abort_job(db, &job.id, &error.to_string()).await;
                }
            };
            let outcome = tokio::select! {
                outcome = bulk::run(db, manager, job, &payload, settings.bulk_delay, settings.bulk_jitter, token) => outcome?,
                // On shutdown the row stays `running`; the lease reclaim
                // resumes it from its counters after restart.
                _ = shutdown.cancelled() => return Ok(()),
            };
            match outcome {
                BulkOutcome::Completed => queries::jobs::complete_job(db, &job.id).await,
                BulkOutcome::Cancelled => queries::jobs::mark_cancelled(db, &job.id).await,
                BulkOutcome::Aborted(reason) => {
                    queries::jobs::abort_job(db, &job.id, &reason).await
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use wagate_core::types::{Identity, Role};
    use wagate_session::CreateSession;
    use wagate_storage::Database;
    use wagate_test_utils::MockClientFactory;

    use crate::queue::EnqueueJob;

    struct Ctx {
        queue: JobQueue,
        manager: SessionManager,
        factory: Arc<MockClientFactory>,
        session_id: String,
        _dir: tempfile::TempDir,
    }

    async fn setup(max_attempts: u32) -> Ctx {
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
                    name: "worker".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        factory
            .client_for(&record.id)
            .unwrap()
            .set_authenticated(true, true);
        Ctx {
            queue: JobQueue::new(db, max_attempts),
            manager,
            factory,
            session_id: record.id,
            _dir: dir,
        }
    }

    fn fast_settings() -> WorkerSettings {
        WorkerSettings {
            workers: 2,
            poll_interval: Duration::from_millis(10),
            reclaim_interval: Duration::from_secs(60),
            bulk_delay: Duration::ZERO,
            bulk_jitter: false,
            backoff_base_secs: 0,
            lease_secs: 300,
        }
    }

    fn single(session_id: &str) -> EnqueueJob {
        EnqueueJob {
            kind: JobKind::Single,
            session_id: session_id.to_string(),
            payload: r#"{"to":"15551112222","content":{"type":"text","body":"hi"}}"#.to_string(),
            scheduled_for: None,
        }
    }

    async fn wait_for_status(queue: &JobQueue, id: &str, status: JobStatus) -> JobRecord {
        for _ in 0..200 {
            let job = queue.get(id).await.unwrap();
            if job.status == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached {status}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pool_completes_single_job() {
        let ctx = setup(3).await;
        let shutdown = CancellationToken::new();
        WorkerPool::new(ctx.queue.clone(), ctx.manager.clone(), fast_settings())
            .spawn(shutdown.clone());

        let record = ctx.queue.enqueue(single(&ctx.session_id)).await.unwrap();
        wait_for_status(&ctx.queue, &record.id, JobStatus::Completed).await;
        assert_eq!(
            ctx.factory
                .client_for(&ctx.session_id)
                .unwrap()
                .sent_count()
                .await,
            1
        );
        shutdown.cancel();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pool_retries_until_attempts_exhausted() {
        let ctx = setup(2).await;
        let client = ctx.factory.client_for(&ctx.session_id).unwrap();
        client.push_send_error("flaky").await;
        client.push_send_error("flaky").await;

        let shutdown = CancellationToken::new();
        WorkerPool::new(ctx.queue.clone(), ctx.manager.clone(), fast_settings())
            .spawn(shutdown.clone());

        let record = ctx.queue.enqueue(single(&ctx.session_id)).await.unwrap();
        let job = wait_for_status(&ctx.queue, &record.id, JobStatus::Failed).await;
        assert_eq!(job.attempts, 2);
        assert!(job.last_error.is_some());
        shutdown.cancel();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pool_recovers_after_transient_failure() {
        let ctx = setup(3).await;
        ctx.factory
            .client_for(&ctx.session_id)
            .unwrap()
            .push_send_error("flaky")
            .await;

        let shutdown = CancellationToken::new();
        WorkerPool::new(ctx.queue.clone(), ctx.manager.clone(), fast_settings())
            .spawn(shutdown.clone());

        let record = ctx.queue.enqueue(single(&ctx.session_id)).await.unwrap();
        let job = wait_for_status(&ctx.queue, &record.id, JobStatus::Completed).await;
        assert_eq!(job.attempts, 1);
        shutdown.cancel();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pool_runs_bulk_and_updates_progress() {
        let ctx = setup(3).await;
        let shutdown = CancellationToken::new();
        WorkerPool::new(ctx.queue.clone(), ctx.manager.clone(), fast_settings())
            .spawn(shutdown.clone());

        let record = ctx
            .queue
            .enqueue(EnqueueJob {
                kind: JobKind::Bulk,
                session_id: ctx.session_id.clone(),
                payload: r#"{"recipients":[{"to":"1"},{"to":"2"},{"to":"3"}],
                             "content":{"type":"text","body":"hi"}}"#
                    .to_string(),
                scheduled_for: None,
            })
            .await
            .unwrap();

        let job = wait_for_status(&ctx.queue, &record.id, JobStatus::Completed).await;
        assert_eq!(job.succeeded, 3);
        assert_eq!(job.failed, 0);
        shutdown.cancel();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unparseable_payload_fails_terminally() {
        let ctx = setup(3).await;
        // Bypass enqueue validation to simulate a corrupt row.
        let record = ctx.queue.enqueue(single(&ctx.session_id)).await.unwrap();
        let mut broken = record.clone();
        broken.id = uuid::Uuid::new_v4().to_string();
        broken.payload = "not json".to_string();
        queries::jobs::insert_job(ctx.queue.db(), &broken).await.unwrap();

        let shutdown = CancellationToken::new();
        WorkerPool::new(ctx.queue.clone(), ctx.manager.clone(), fast_settings())
            .spawn(shutdown.clone());

        let job = wait_for_status(&ctx.queue, &broken.id, JobStatus::Failed).await;
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.unwrap().contains("invalid send payload"));
        shutdown.cancel();
    }
}
