// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles for Wagate crates.

pub mod mock_client;

pub use mock_client::{MockClientFactory, MockProtocolClient, SentMessage};
