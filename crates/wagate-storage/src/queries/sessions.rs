// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session record CRUD operations.

use rusqlite::params;
use wagate_core::GateError;

use crate::database::{Database, map_tr_err, now_utc};
use crate::models::{ProxyConfig, SessionRecord};

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let proxy_json: Option<String> = row.get(7)?;
    let proxy: Option<ProxyConfig> = match proxy_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?),
        None => None,
    };
    Ok(SessionRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        actual_phone: row.get(4)?,
        webhook_url: row.get(5)?,
        auto_reply: row.get(6)?,
        proxy,
        connected: row.get::<_, i64>(8)? != 0,
        logged_in: row.get::<_, i64>(9)? != 0,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const SESSION_COLUMNS: &str = "id, owner_id, name, phone, actual_phone, webhook_url, \
     auto_reply, proxy, connected, logged_in, created_at, updated_at";

/// Insert a new session record. Fails with a constraint error on id collision.
pub async fn insert_session(db: &Database, record: &SessionRecord) -> Result<(), GateError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let proxy_json = record
                .proxy
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            conn.execute(
                "INSERT INTO sessions (id, owner_id, name, phone, actual_phone, webhook_url,
                                       auto_reply, proxy, connected, logged_in, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.id,
                    record.owner_id,
                    record.name,
                    record.phone,
                    record.actual_phone,
                    record.webhook_url,
                    record.auto_reply,
                    proxy_json,
                    record.connected as i64,
                    record.logged_in as i64,
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<SessionRecord>, GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_session) {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List sessions, optionally restricted to one owner.
pub async fn list_sessions(
    db: &Database,
    owner_id: Option<&str>,
) -> Result<Vec<SessionRecord>, GateError> {
    let owner_id = owner_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut out = Vec::new();
            match owner_id {
                Some(owner) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions
                         WHERE owner_id = ?1 ORDER BY created_at ASC"
                    ))?;
                    let rows = stmt.query_map(params![owner], row_to_session)?;
                    for row in rows {
                        out.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at ASC"
                    ))?;
                    let rows = stmt.query_map([], row_to_session)?;
                    for row in rows {
                        out.push(row?);
                    }
                }
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Update the connection/auth flags. The caller maintains the
/// `logged_in ⇒ connected` invariant.
pub async fn set_connection_flags(
    db: &Database,
    id: &str,
    connected: bool,
    logged_in: bool,
) -> Result<(), GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET connected = ?1, logged_in = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![connected as i64, logged_in as i64, now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the verified phone identifier after successful pairing.
pub async fn set_actual_phone(db: &Database, id: &str, phone: &str) -> Result<(), GateError> {
    let id = id.to_string();
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET actual_phone = ?1, updated_at = ?2 WHERE id = ?3",
                params![phone, now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a session record. Returns true if a row was removed.
pub async fn delete_session(db: &Database, id: &str) -> Result<bool, GateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_session(id: &str, owner: &str) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: format!("session {id}"),
            phone: Some("15551234567".to_string()),
            actual_phone: None,
            webhook_url: None,
            auto_reply: None,
            proxy: None,
            connected: false,
            logged_in: false,
            created_at: now_utc(),
            updated_at: now_utc(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let (db, _dir) = setup_db().await;
        let record = make_session("1234567890", "alice");
        insert_session(&db, &record).await.unwrap();

        let loaded = get_session(&db, "1234567890").await.unwrap().unwrap();
        assert_eq!(loaded, record);

        assert!(get_session(&db, "0000000000").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_id_fails() {
        let (db, _dir) = setup_db().await;
        let record = make_session("1234567890", "alice");
        insert_session(&db, &record).await.unwrap();
        assert!(insert_session(&db, &record).await.is_err());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_by_owner() {
        let (db, _dir) = setup_db().await;
        insert_session(&db, &make_session("1111111111", "alice")).await.unwrap();
        insert_session(&db, &make_session("2222222222", "bob")).await.unwrap();
        insert_session(&db, &make_session("3333333333", "alice")).await.unwrap();

        let all = list_sessions(&db, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let alices = list_sessions(&db, Some("alice")).await.unwrap();
        assert_eq!(alices.len(), 2);
        assert!(alices.iter().all(|s| s.owner_id == "alice"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn flags_and_phone_update() {
        let (db, _dir) = setup_db().await;
        insert_session(&db, &make_session("1111111111", "alice")).await.unwrap();

        set_connection_flags(&db, "1111111111", true, true).await.unwrap();
        set_actual_phone(&db, "1111111111", "15559876543").await.unwrap();

        let loaded = get_session(&db, "1111111111").await.unwrap().unwrap();
        assert!(loaded.connected);
        assert!(loaded.logged_in);
        assert_eq!(loaded.actual_phone.as_deref(), Some("15559876543"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn proxy_round_trips_as_json() {
        let (db, _dir) = setup_db().await;
        let mut record = make_session("1111111111", "alice");
        record.proxy = Some(ProxyConfig {
            enabled: true,
            kind: "socks5".to_string(),
            host: "10.0.0.1".to_string(),
            port: 1080,
            username: Some("u".to_string()),
            password: Some("p".to_string()),
        });
        insert_session(&db, &record).await.unwrap();
        let loaded = get_session(&db, "1111111111").await.unwrap().unwrap();
        assert_eq!(loaded.proxy, record.proxy);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let (db, _dir) = setup_db().await;
        insert_session(&db, &make_session("1111111111", "alice")).await.unwrap();
        assert!(delete_session(&db, "1111111111").await.unwrap());
        assert!(!delete_session(&db, "1111111111").await.unwrap());
        assert!(get_session(&db, "1111111111").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
