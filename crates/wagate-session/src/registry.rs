// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session registry.
//!
//! Maps session ids to live handles. The registry owns no lifecycle logic;
//! the manager inserts on create/hydrate and removes on delete.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use wagate_core::traits::ProtocolClient;
use wagate_core::types::SessionRecord;

use crate::pairing::PairingStreamer;

/// One live session: its persisted record, protocol client, pairing channel,
/// and the cancellation token of its running event pump (if any).
pub struct SessionHandle {
    pub id: String,
    /// Authoritative in-memory copy of the record. Flag changes go through
    /// this lock and are persisted before it is released, so ownership check,
    /// state read, and action cannot be torn by a concurrent operation.
    pub record: Mutex<SessionRecord>,
    pub client: Arc<dyn ProtocolClient>,
    pub pairing: PairingStreamer,
    pub pump: Mutex<Option<CancellationToken>>,
    /// Serializes state transitions (connect/disconnect/logout/delete) per
    /// session, held across the client I/O they perform. A delete therefore
    /// waits for an in-flight connect and tears down whatever it opened.
    pub ops: Mutex<()>,
}

impl SessionHandle {
    pub fn new(record: SessionRecord, client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            id: record.id.clone(),
            record: Mutex::new(record),
            client,
            pairing: PairingStreamer::new(),
            pump: Mutex::new(None),
            ops: Mutex::new(()),
        }
    }

    /// Cancel the running event pump, if any.
    pub async fn cancel_pump(&self) {
        if let Some(token) = self.pump.lock().await.take() {
            token.cancel();
        }
    }
}

/// Shared map of live sessions.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: Arc<SessionHandle>) {
        self.inner.write().await.insert(handle.id.clone(), handle);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.inner.write().await.remove(id)
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
