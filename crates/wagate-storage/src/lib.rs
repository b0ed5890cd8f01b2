// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer: serialized SQLite access, embedded migrations, and
//! typed queries for sessions and the job queue.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, now_utc, utc_after_secs};
