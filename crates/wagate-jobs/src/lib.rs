// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue: validated enqueue, a fixed-size worker pool with atomic
//! claims, retry with exponential backoff, cooperative cancellation, paced
//! bulk dispatch, lease-based crash recovery, and retention cleanup.

pub mod bulk;
pub mod payload;
pub mod queue;
pub mod worker;

pub use bulk::BulkOutcome;
pub use payload::{BulkPayload, BulkRecipient, SendPayload};
pub use queue::{EnqueueJob, JobQueue};
pub use worker::{WorkerPool, WorkerSettings};
