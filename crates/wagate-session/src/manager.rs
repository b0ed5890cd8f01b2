// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle manager.
//!
//! Owns the state machine `Created → Connecting → AwaitingPairing →
//! Authenticated → Disconnected` (delete from anywhere), the per-session
//! event pump, and the persisted connection flags. Every operation except
//! `create` runs the ownership guard first.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wagate_core::GateError;
use wagate_core::traits::{ClientFactory, ProtocolClient};
use wagate_core::types::{
    Attachment, ClientEvent, Identity, Location, MessageId, OutboundContent, ProxyConfig,
    SessionRecord,
};
use wagate_storage::{Database, now_utc, queries};

use crate::ownership;
use crate::pairing::PairingMessage;
use crate::registry::{Registry, SessionHandle};

/// How long a connection that closed before authenticating may linger before
/// the manager force-disconnects it.
const UNAUTHENTICATED_CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Attempts to find a free random session id before giving up.
const ID_GENERATION_ATTEMPTS: u32 = 5;

/// Input for session creation.
#[derive(Debug, Clone, Default)]
pub struct CreateSession {
    /// Caller-chosen id; generated when absent.
    pub id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub webhook_url: Option<String>,
    pub auto_reply: Option<String>,
    pub proxy: Option<ProxyConfig>,
}

/// Drives session lifecycles against the registry, storage, and the
/// protocol clients built by the injected factory.
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    registry: Registry,
    factory: Arc<dyn ClientFactory>,
}

impl SessionManager {
    pub fn new(db: Database, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            db,
            registry: Registry::new(),
            factory,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Rebuild registry entries for persisted sessions after a restart.
    ///
    /// Connections do not survive the process, so the stored flags are reset;
    /// a logged-in client silently reconnects on the next `connect`.
    pub async fn hydrate(&self) -> Result<usize, GateError> {
        let records = queries::sessions::list_sessions(&self.db, None).await?;
        let count = records.len();
        for mut record in records {
            if record.connected || record.logged_in {
                queries::sessions::set_connection_flags(&self.db, &record.id, false, false)
                    .await?;
                record.connected = false;
                record.logged_in = false;
            }
            let client = self.factory.create(&record.id, record.proxy.as_ref());
            self.registry
                .insert(Arc::new(SessionHandle::new(record, client)))
                .await;
        }
        tracing::info!(count, "sessions hydrated from storage");
        Ok(count)
    }

    /// Create a session owned by `identity`.
    pub async fn create(
        &self,
        identity: &Identity,
        input: CreateSession,
    ) -> Result<SessionRecord, GateError> {
        if input.name.trim().is_empty() {
            return Err(GateError::InvalidInput("session name is required".into()));
        }

        let id = match input.id {
            Some(id) => {
                if id.len() != 10 || !id.chars().all(|c| c.is_ascii_digit()) {
                    return Err(GateError::InvalidInput(
                        "session id must be 10 digits".into(),
                    ));
                }
                if queries::sessions::get_session(&self.db, &id).await?.is_some() {
                    return Err(GateError::Conflict);
                }
                id
            }
            None => self.allocate_id().await?,
        };

        let now = now_utc();
        let record = SessionRecord {
            id: id.clone(),
            owner_id: identity.user_id.clone(),
            name: input.name,
            phone: input.phone,
            actual_phone: None,
            webhook_url: input.webhook_url,
            auto_reply: input.auto_reply,
            proxy: input.proxy,
            connected: false,
            logged_in: false,
            created_at: now.clone(),
            updated_at: now,
        };
        queries::sessions::insert_session(&self.db, &record).await?;

        let client = self.factory.create(&id, record.proxy.as_ref());
        self.registry
            .insert(Arc::new(SessionHandle::new(record.clone(), client)))
            .await;

        tracing::info!(session_id = %id, owner = %record.owner_id, "session created");
        Ok(record)
    }

    async fn allocate_id(&self) -> Result<String, GateError> {
        for _ in 0..ID_GENERATION_ATTEMPTS {
            let id = {
                let mut rng = rand::thread_rng();
                rng.gen_range(1_000_000_000u64..10_000_000_000u64).to_string()
            };
            if queries::sessions::get_session(&self.db, &id).await?.is_none() {
                return Ok(id);
            }
        }
        Err(GateError::Internal("session id space exhausted".into()))
    }

    /// Get a session record, subject to the ownership guard.
    pub async fn get(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<SessionRecord, GateError> {
        let handle = self.guard(identity, id).await?;
        let record = handle.record.lock().await.clone();
        Ok(record)
    }

    /// List sessions: admins see all, users see their own.
    pub async fn list(&self, identity: &Identity) -> Result<Vec<SessionRecord>, GateError> {
        let owner = if identity.is_admin() {
            None
        } else {
            Some(identity.user_id.as_str())
        };
        queries::sessions::list_sessions(&self.db, owner).await
    }

    /// Open the protocol connection and start the event pump.
    ///
    /// A no-op on an authenticated session. A connected-but-unauthenticated
    /// session is cleanly disconnected first so the provider never sees two
    /// live connections. Transient connect errors propagate and leave the
    /// session reusable.
    pub async fn connect(&self, identity: &Identity, id: &str) -> Result<(), GateError> {
        let handle = self.guard(identity, id).await?;
        let _op = handle.ops.lock().await;
        // A delete may have finished between the guard and the lock; a
        // connection opened now would outlive its session unreachably.
        if !self.registry.contains(id).await {
            return Err(GateError::NotFound);
        }

        if handle.client.is_logged_in() {
            return Ok(());
        }

        handle.cancel_pump().await;
        if handle.client.is_connected() {
            handle.client.disconnect().await;
        }

        handle.client.connect().await?;
        let events = handle.client.events().await?;
        persist_flags(&self.db, &handle, true, false).await?;

        let token = CancellationToken::new();
        *handle.pump.lock().await = Some(token.clone());
        tokio::spawn(run_pump(self.db.clone(), handle.clone(), events, token));

        tracing::info!(session_id = %id, "session connecting");
        Ok(())
    }

    /// Close the connection, keeping stored credentials.
    pub async fn disconnect(&self, identity: &Identity, id: &str) -> Result<(), GateError> {
        let handle = self.guard(identity, id).await?;
        let _op = handle.ops.lock().await;
        handle.cancel_pump().await;
        handle.client.disconnect().await;
        handle.pairing.close().await;
        persist_flags(&self.db, &handle, false, false).await?;
        tracing::info!(session_id = %id, "session disconnected");
        Ok(())
    }

    /// Close the connection and invalidate credentials; the next connect
    /// re-pairs.
    pub async fn logout(&self, identity: &Identity, id: &str) -> Result<(), GateError> {
        let handle = self.guard(identity, id).await?;
        let _op = handle.ops.lock().await;
        handle.cancel_pump().await;
        handle.client.logout().await?;
        handle.pairing.close().await;
        persist_flags(&self.db, &handle, false, false).await?;
        tracing::info!(session_id = %id, "session logged out");
        Ok(())
    }

    /// Tear down the session entirely: connection, registry entry, and row.
    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<(), GateError> {
        let handle = self.guard(identity, id).await?;
        let _op = handle.ops.lock().await;
        handle.cancel_pump().await;
        handle.client.disconnect().await;
        handle.pairing.close().await;
        self.registry.remove(id).await;
        queries::sessions::delete_session(&self.db, id).await?;
        tracing::info!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Subscribe to the session's pairing channel, replacing any previous
    /// subscriber.
    pub async fn subscribe_pairing(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<mpsc::Receiver<PairingMessage>, GateError> {
        let handle = self.guard(identity, id).await?;
        Ok(handle.pairing.subscribe().await)
    }

    pub async fn send_text(
        &self,
        identity: &Identity,
        id: &str,
        to: &str,
        body: &str,
    ) -> Result<MessageId, GateError> {
        let handle = self.guard(identity, id).await?;
        ready(&handle)?;
        handle.client.send_text(to, body).await
    }

    pub async fn send_location(
        &self,
        identity: &Identity,
        id: &str,
        to: &str,
        location: &Location,
    ) -> Result<MessageId, GateError> {
        let handle = self.guard(identity, id).await?;
        ready(&handle)?;
        handle.client.send_location(to, location).await
    }

    pub async fn send_attachment(
        &self,
        identity: &Identity,
        id: &str,
        to: &str,
        attachment: &Attachment,
    ) -> Result<MessageId, GateError> {
        let handle = self.guard(identity, id).await?;
        ready(&handle)?;
        handle.client.send_attachment(to, attachment).await
    }

    /// Send on behalf of the job queue. Ownership was checked at enqueue;
    /// here only existence and auth state gate the send.
    pub async fn dispatch(
        &self,
        session_id: &str,
        to: &str,
        content: &OutboundContent,
    ) -> Result<MessageId, GateError> {
        let handle = self.registry.get(session_id).await.ok_or(GateError::NotFound)?;
        ready(&handle)?;
        match content {
            OutboundContent::Text { body } => handle.client.send_text(to, body).await,
            OutboundContent::Location(location) => {
                handle.client.send_location(to, location).await
            }
            OutboundContent::Attachment(attachment) => {
                handle.client.send_attachment(to, attachment).await
            }
        }
    }

    /// Whether the session exists and is authenticated.
    pub async fn is_ready(&self, session_id: &str) -> bool {
        match self.registry.get(session_id).await {
            Some(handle) => handle.client.is_logged_in(),
            None => false,
        }
    }

    /// Ownership lookup used by the job queue at enqueue time.
    pub async fn authorize(&self, identity: &Identity, session_id: &str) -> Result<(), GateError> {
        self.guard(identity, session_id).await.map(|_| ())
    }

    async fn guard(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<Arc<SessionHandle>, GateError> {
        let handle = self.registry.get(id).await.ok_or(GateError::NotFound)?;
        let owner = handle.record.lock().await.owner_id.clone();
        ownership::authorize(identity, &owner)?;
        Ok(handle)
    }
}

fn ready(handle: &SessionHandle) -> Result<(), GateError> {
    if handle.client.is_logged_in() {
        Ok(())
    } else {
        Err(GateError::NotReady)
    }
}

/// Update the in-memory flags and persist them under the same record lock.
async fn persist_flags(
    db: &Database,
    handle: &SessionHandle,
    connected: bool,
    logged_in: bool,
) -> Result<(), GateError> {
    let mut record = handle.record.lock().await;
    record.connected = connected;
    record.logged_in = logged_in;
    queries::sessions::set_connection_flags(db, &handle.id, connected, logged_in).await
}

/// Per-session event pump: consumes the client's event stream until it ends,
/// a terminal pairing event arrives, or the token cancels.
async fn run_pump(
    db: Database,
    handle: Arc<SessionHandle>,
    mut events: mpsc::Receiver<ClientEvent>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Some(ClientEvent::PairingCode {
                code,
                expires_in_secs,
            }) => {
                tracing::debug!(session_id = %handle.id, "pairing code issued");
                handle
                    .pairing
                    .publish(PairingMessage::Qr {
                        code,
                        expires_in_secs,
                    })
                    .await;
            }
            Some(ClientEvent::Authenticated { phone }) => {
                tracing::info!(session_id = %handle.id, "session authenticated");
                if let Err(error) = on_authenticated(&db, &handle, &phone).await {
                    tracing::warn!(session_id = %handle.id, %error, "failed to persist auth state");
                }
                handle
                    .pairing
                    .publish(PairingMessage::Success { phone })
                    .await;
            }
            Some(ClientEvent::PairingTimeout) => {
                tracing::info!(session_id = %handle.id, "pairing window expired");
                handle
                    .pairing
                    .publish(PairingMessage::Error {
                        message: "pairing timeout".into(),
                    })
                    .await;
                handle.client.disconnect().await;
                if let Err(error) = persist_flags(&db, &handle, false, false).await {
                    tracing::warn!(session_id = %handle.id, %error, "failed to persist flags");
                }
                break;
            }
            Some(ClientEvent::Disconnected) => {
                let was_logged_in = handle.record.lock().await.logged_in;
                if !was_logged_in {
                    // The connection closed before pairing finished. Give the
                    // client a grace window to recover, then force a clean
                    // disconnect of the stale session.
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(UNAUTHENTICATED_CLOSE_GRACE) => {}
                    }
                    if !handle.client.is_logged_in() {
                        tracing::info!(
                            session_id = %handle.id,
                            "unauthenticated session closed, forcing disconnect"
                        );
                        handle.client.disconnect().await;
                    }
                }
                if let Err(error) = persist_flags(
                    &db,
                    &handle,
                    handle.client.is_connected(),
                    handle.client.is_logged_in(),
                )
                .await
                {
                    tracing::warn!(session_id = %handle.id, %error, "failed to persist flags");
                }
                break;
            }
            None => {
                // Event stream ended; reconcile flags with the client.
                if let Err(error) = persist_flags(
                    &db,
                    &handle,
                    handle.client.is_connected(),
                    handle.client.is_logged_in(),
                )
                .await
                {
                    tracing::warn!(session_id = %handle.id, %error, "failed to persist flags");
                }
                break;
            }
        }
    }
}

async fn on_authenticated(
    db: &Database,
    handle: &SessionHandle,
    phone: &str,
) -> Result<(), GateError> {
    let mut record = handle.record.lock().await;
    record.connected = true;
    record.logged_in = true;
    record.actual_phone = Some(phone.to_string());
    queries::sessions::set_connection_flags(db, &handle.id, true, true).await?;
    queries::sessions::set_actual_phone(db, &handle.id, phone).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wagate_core::types::Role;
    use wagate_test_utils::MockClientFactory;

    async fn setup() -> (SessionManager, Arc<MockClientFactory>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let factory = Arc::new(MockClientFactory::new());
        let manager = SessionManager::new(db, factory.clone());
        (manager, factory, dir)
    }

    fn alice() -> Identity {
        Identity::new("alice", Role::User)
    }

    fn bob() -> Identity {
        Identity::new("bob", Role::User)
    }

    fn admin() -> Identity {
        Identity::new("root", Role::Admin)
    }

    fn named(name: &str) -> CreateSession {
        CreateSession {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_generates_ten_digit_id() {
        let (manager, _factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        assert_eq!(record.id.len(), 10);
        assert!(record.id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(record.owner_id, "alice");
        assert!(!record.connected);
        assert!(manager.registry().contains(&record.id).await);
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let (manager, _factory, _dir) = setup().await;
        assert!(matches!(
            manager.create(&alice(), named("  ")).await,
            Err(GateError::InvalidInput(_))
        ));
        let mut input = named("work");
        input.id = Some("12345".to_string());
        assert!(matches!(
            manager.create(&alice(), input).await,
            Err(GateError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn create_with_taken_id_conflicts() {
        let (manager, _factory, _dir) = setup().await;
        let mut input = named("one");
        input.id = Some("1234567890".to_string());
        manager.create(&alice(), input.clone()).await.unwrap();
        input.name = "two".to_string();
        assert!(matches!(
            manager.create(&alice(), input).await,
            Err(GateError::Conflict)
        ));
    }

    #[tokio::test]
    async fn guard_enforces_ownership() {
        let (manager, _factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();

        assert!(manager.get(&alice(), &record.id).await.is_ok());
        assert!(matches!(
            manager.get(&bob(), &record.id).await,
            Err(GateError::Forbidden)
        ));
        assert!(manager.get(&admin(), &record.id).await.is_ok());
        assert!(matches!(
            manager.get(&alice(), "0000000000").await,
            Err(GateError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_scopes_by_role() {
        let (manager, _factory, _dir) = setup().await;
        manager.create(&alice(), named("a1")).await.unwrap();
        manager.create(&alice(), named("a2")).await.unwrap();
        manager.create(&bob(), named("b1")).await.unwrap();

        assert_eq!(manager.list(&alice()).await.unwrap().len(), 2);
        assert_eq!(manager.list(&bob()).await.unwrap().len(), 1);
        assert_eq!(manager.list(&admin()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn pairing_flow_reaches_authenticated() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        let mut pairing = manager
            .subscribe_pairing(&alice(), &record.id)
            .await
            .unwrap();

        manager.connect(&alice(), &record.id).await.unwrap();
        let client = factory.client_for(&record.id).unwrap();

        client
            .emit(ClientEvent::PairingCode {
                code: "ABCD-1234".into(),
                expires_in_secs: 60,
            })
            .await;
        assert!(matches!(
            pairing.recv().await,
            Some(PairingMessage::Qr { .. })
        ));

        client
            .emit(ClientEvent::Authenticated {
                phone: "15559876543".into(),
            })
            .await;
        assert!(matches!(
            pairing.recv().await,
            Some(PairingMessage::Success { .. })
        ));
        // Terminal message closed the channel.
        assert!(pairing.recv().await.is_none());

        // Flags and verified phone were persisted.
        let loaded = manager.get(&alice(), &record.id).await.unwrap();
        assert!(loaded.connected);
        assert!(loaded.logged_in);
        assert_eq!(loaded.actual_phone.as_deref(), Some("15559876543"));
    }

    #[tokio::test]
    async fn pairing_timeout_disconnects() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        let mut pairing = manager
            .subscribe_pairing(&alice(), &record.id)
            .await
            .unwrap();
        manager.connect(&alice(), &record.id).await.unwrap();

        let client = factory.client_for(&record.id).unwrap();
        client.emit(ClientEvent::PairingTimeout).await;

        assert!(matches!(
            pairing.recv().await,
            Some(PairingMessage::Error { .. })
        ));
        assert!(pairing.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_requires_authentication() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        manager.connect(&alice(), &record.id).await.unwrap();

        assert!(matches!(
            manager
                .send_text(&alice(), &record.id, "15550001111", "hi")
                .await,
            Err(GateError::NotReady)
        ));

        let client = factory.client_for(&record.id).unwrap();
        client.set_authenticated(true, true);
        let id = manager
            .send_text(&alice(), &record.id, "15550001111", "hi")
            .await
            .unwrap();
        assert!(id.0.starts_with("mock-msg-"));
        assert_eq!(client.sent_count().await, 1);
    }

    #[tokio::test]
    async fn connect_is_noop_when_authenticated() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        manager.connect(&alice(), &record.id).await.unwrap();

        let client = factory.client_for(&record.id).unwrap();
        client
            .emit(ClientEvent::Authenticated {
                phone: "15559876543".into(),
            })
            .await;
        // Let the pump process the event.
        tokio::task::yield_now().await;

        client.fail_next_connect();
        // No reconnect happens, so the scripted failure is never consumed.
        manager.connect(&alice(), &record.id).await.unwrap();
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn transient_connect_error_leaves_session_usable() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        let client = factory.client_for(&record.id).unwrap();

        client.fail_next_connect();
        assert!(manager.connect(&alice(), &record.id).await.is_err());
        // Retry succeeds.
        manager.connect(&alice(), &record.id).await.unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn unauthenticated_close_forces_disconnect_after_grace() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        manager.connect(&alice(), &record.id).await.unwrap();

        let client = factory.client_for(&record.id).unwrap();
        client.emit(ClientEvent::Disconnected).await;

        tokio::time::sleep(UNAUTHENTICATED_CLOSE_GRACE + Duration::from_secs(1)).await;

        let loaded = manager.get(&alice(), &record.id).await.unwrap();
        assert!(!loaded.connected);
        assert!(!loaded.logged_in);
    }

    #[tokio::test]
    async fn disconnect_and_logout_clear_flags() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        manager.connect(&alice(), &record.id).await.unwrap();
        let client = factory.client_for(&record.id).unwrap();
        client
            .emit(ClientEvent::Authenticated {
                phone: "15559876543".into(),
            })
            .await;
        tokio::task::yield_now().await;

        manager.disconnect(&alice(), &record.id).await.unwrap();
        let loaded = manager.get(&alice(), &record.id).await.unwrap();
        assert!(!loaded.connected);
        assert!(!loaded.logged_in);
        // Credentials kept: verified phone survives a disconnect.
        assert_eq!(loaded.actual_phone.as_deref(), Some("15559876543"));

        manager.logout(&alice(), &record.id).await.unwrap();
        assert!(!manager.is_ready(&record.id).await);
    }

    #[tokio::test]
    async fn delete_removes_row_and_registry_entry() {
        let (manager, _factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        manager.delete(&alice(), &record.id).await.unwrap();

        assert!(!manager.registry().contains(&record.id).await);
        assert!(matches!(
            manager.get(&alice(), &record.id).await,
            Err(GateError::NotFound)
        ));
        assert_eq!(manager.list(&alice()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn delete_waits_for_inflight_connect_and_tears_it_down() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();
        let client = factory.client_for(&record.id).unwrap();
        let gate = client.gate_next_connect().await;

        let connecting = {
            let manager = manager.clone();
            let id = record.id.clone();
            tokio::spawn(async move { manager.connect(&alice(), &id).await })
        };
        // Let the connect task block inside the client call.
        tokio::task::yield_now().await;

        let deleting = {
            let manager = manager.clone();
            let id = record.id.clone();
            tokio::spawn(async move { manager.delete(&alice(), &id).await })
        };
        tokio::task::yield_now().await;

        gate.notify_one();
        connecting.await.unwrap().unwrap();
        deleting.await.unwrap().unwrap();

        // The delete ran after the in-flight connect finished, so the
        // connection it opened is closed and nothing lingers.
        assert!(!client.is_connected());
        assert!(!manager.registry().contains(&record.id).await);
        assert!(matches!(
            manager.get(&alice(), &record.id).await,
            Err(GateError::NotFound)
        ));
    }

    #[tokio::test]
    async fn hydrate_resets_flags_and_rebuilds_registry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let factory = Arc::new(MockClientFactory::new());
        let session_id;
        {
            let db = Database::open(path.to_str().unwrap()).await.unwrap();
            let manager = SessionManager::new(db.clone(), factory.clone());
            let record = manager.create(&alice(), named("work")).await.unwrap();
            session_id = record.id.clone();
            manager.connect(&alice(), &session_id).await.unwrap();
            let client = factory.client_for(&session_id).unwrap();
            client
                .emit(ClientEvent::Authenticated {
                    phone: "15559876543".into(),
                })
                .await;
            tokio::task::yield_now().await;
            db.close().await.unwrap();
        }

        // New process: fresh manager over the same database file.
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let manager = SessionManager::new(db, Arc::new(MockClientFactory::new()));
        assert_eq!(manager.hydrate().await.unwrap(), 1);

        let loaded = manager.get(&alice(), &session_id).await.unwrap();
        assert!(!loaded.connected);
        assert!(!loaded.logged_in);
        assert_eq!(loaded.actual_phone.as_deref(), Some("15559876543"));
    }

    #[tokio::test]
    async fn dispatch_skips_guard_but_checks_readiness() {
        let (manager, factory, _dir) = setup().await;
        let record = manager.create(&alice(), named("work")).await.unwrap();

        let content = OutboundContent::Text { body: "hi".into() };
        assert!(matches!(
            manager.dispatch(&record.id, "15550001111", &content).await,
            Err(GateError::NotReady)
        ));

        factory
            .client_for(&record.id)
            .unwrap()
            .set_authenticated(true, true);
        assert!(manager.dispatch(&record.id, "15550001111", &content).await.is_ok());
        assert!(matches!(
            manager.dispatch("0000000000", "15550001111", &content).await,
            Err(GateError::NotFound)
        ));
    }
}
