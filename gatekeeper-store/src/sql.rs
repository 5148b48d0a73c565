//! SQL credential store over `sqlx`.
//!
//! Uses the `Any` driver so the same queries run against MySQL in
//! production and SQLite in tests. All values are bound as parameters.

use crate::error::{StoreError, StoreResult};
use crate::store::{parse_allow_list, CredentialStore, StoreSession, MAX_USER_PAGE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatekeeper_model::{
    AccessEvent, AccessEventFilter, CredentialKind, CredentialRecord, Decision, DecisionReason, Door, NewUser, User,
    UserId, UserPatch,
};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Connection, QueryBuilder, Row};
use tracing::info;
use uuid::Uuid;

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGINT PRIMARY KEY,
        full_name VARCHAR(255) NOT NULL,
        active SMALLINT NOT NULL DEFAULT 1,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doors (
        id VARCHAR(64) PRIMARY KEY,
        allowed_user_ids TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rfid_cards (
        uid VARCHAR(64) PRIMARY KEY,
        user_id BIGINT NOT NULL,
        active SMALLINT NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pins (
        id BIGINT PRIMARY KEY,
        user_id BIGINT NOT NULL,
        pin_hash VARCHAR(255) NOT NULL,
        active SMALLINT NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id VARCHAR(36) PRIMARY KEY,
        ts BIGINT NOT NULL,
        door_id VARCHAR(64) NOT NULL,
        user_id BIGINT NULL,
        credential_type VARCHAR(16) NOT NULL,
        presented_uid VARCHAR(255) NULL,
        pin_sha VARCHAR(255) NULL,
        result VARCHAR(16) NOT NULL,
        reason VARCHAR(64) NULL
    )
    "#,
];

/// Credential store backed by a SQL connection pool.
#[derive(Debug, Clone)]
pub struct SqlCredentialStore {
    pool: AnyPool,
}

impl SqlCredentialStore {
    /// Wrap an existing pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Connect to a database URL (`mysql://...`, `sqlite://...`).
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!(max_connections, "Credential store pool connected");
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    pub async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Credential store schema ready");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqlCredentialStore {
    async fn checkout(&self) -> StoreResult<Box<dyn StoreSession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqlSession { conn }))
    }
}

/// One pooled connection; returned to the pool on drop.
struct SqlSession {
    conn: PoolConnection<Any>,
}

#[async_trait]
impl StoreSession for SqlSession {
    async fn door_allow_list(&mut self, door_id: &str) -> StoreResult<Vec<UserId>> {
        let row = sqlx::query("SELECT allowed_user_ids FROM doors WHERE id = ?")
            .bind(door_id.to_string())
            .fetch_optional(&mut *self.conn)
            .await?;

        match row {
            Some(row) => parse_allow_list(&row.try_get::<String, _>("allowed_user_ids")?),
            None => Ok(Vec::new()),
        }
    }

    async fn find_active_rfid(&mut self, uid: &str) -> StoreResult<Option<CredentialRecord>> {
        let row = sqlx::query(
            r#"
            SELECT c.uid, c.user_id FROM rfid_cards c
            JOIN users u ON u.id = c.user_id
            WHERE c.uid = ? AND c.active = 1 AND u.active = 1
            LIMIT 1
            "#,
        )
        .bind(uid.to_string())
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(|row| -> StoreResult<CredentialRecord> {
            Ok(CredentialRecord::rfid(
                row.try_get::<String, _>("uid")?,
                row.try_get::<i64, _>("user_id")?,
            ))
        })
        .transpose()
    }

    async fn list_active_pins(&mut self) -> StoreResult<Vec<CredentialRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT p.pin_hash, p.user_id FROM pins p
            JOIN users u ON u.id = p.user_id
            WHERE p.active = 1 AND u.active = 1
            ORDER BY p.id
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<CredentialRecord> {
                Ok(CredentialRecord::pin(
                    row.try_get::<String, _>("pin_hash")?,
                    row.try_get::<i64, _>("user_id")?,
                ))
            })
            .collect()
    }

    async fn insert_access_event(&mut self, event: &AccessEvent) -> StoreResult<()> {
        let (presented_uid, pin_sha) = match event.credential_kind {
            CredentialKind::Rfid => (Some(event.credential_payload.clone()), None),
            CredentialKind::Pin => (None, Some(event.credential_payload.clone())),
        };

        sqlx::query(
            r#"
            INSERT INTO events (id, ts, door_id, user_id, credential_type, presented_uid, pin_sha, result, reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.timestamp.timestamp_millis())
        .bind(event.door_id.clone())
        .bind(event.user_id)
        .bind(event.credential_kind.as_str().to_string())
        .bind(presented_uid)
        .bind(pin_sha)
        .bind(event.decision.as_str().to_string())
        .bind(event.reason.map(|r| r.as_str().to_string()))
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    async fn list_access_events(&mut self, filter: &AccessEventFilter) -> StoreResult<Vec<AccessEvent>> {
        let mut query = QueryBuilder::<Any>::new(
            "SELECT id, ts, door_id, user_id, credential_type, presented_uid, pin_sha, result, reason FROM events WHERE 1 = 1",
        );
        if let Some(decision) = filter.decision {
            query.push(" AND result = ").push_bind(decision.as_str().to_string());
        }
        if let Some(kind) = filter.credential_kind {
            query.push(" AND credential_type = ").push_bind(kind.as_str().to_string());
        }
        if let Some(from) = filter.from {
            query.push(" AND ts >= ").push_bind(from.timestamp_millis());
        }
        if let Some(to) = filter.to {
            query.push(" AND ts <= ").push_bind(to.timestamp_millis());
        }
        query
            .push(" ORDER BY ts DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.effective_limit()));

        let rows = query.build().fetch_all(&mut *self.conn).await?;
        rows.iter().map(decode_event).collect()
    }

    async fn list_users(&mut self, limit: u32) -> StoreResult<Vec<User>> {
        let rows = sqlx::query("SELECT id, full_name, active, created_at FROM users ORDER BY id DESC LIMIT ?")
            .bind(i64::from(limit.clamp(1, MAX_USER_PAGE)))
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(decode_user).collect()
    }

    async fn insert_user(&mut self, new_user: &NewUser) -> StoreResult<User> {
        let id = match new_user.id {
            Some(id) => {
                if select_user(&mut self.conn, id).await?.is_some() {
                    return Err(StoreError::Conflict(format!("user {} already exists", id)));
                }
                id
            }
            None => {
                sqlx::query("SELECT COALESCE(MAX(id), 0) + 1 AS next_id FROM users")
                    .fetch_one(&mut *self.conn)
                    .await?
                    .try_get::<i64, _>("next_id")?
            }
        };

        sqlx::query("INSERT INTO users (id, full_name, active, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(new_user.full_name.clone())
            .bind(i64::from(new_user.active))
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *self.conn)
            .await?;

        select_user(&mut self.conn, id)
            .await?
            .ok_or_else(|| StoreError::Query(format!("user {} vanished after insert", id)))
    }

    async fn update_user(&mut self, id: UserId, patch: &UserPatch) -> StoreResult<Option<User>> {
        if !patch.is_empty() {
            let mut query = QueryBuilder::<Any>::new("UPDATE users SET ");
            let mut fields = query.separated(", ");
            if let Some(full_name) = &patch.full_name {
                fields.push("full_name = ").push_bind_unseparated(full_name.clone());
            }
            if let Some(active) = patch.active {
                fields.push("active = ").push_bind_unseparated(i64::from(active));
            }
            query.push(" WHERE id = ").push_bind(id);
            query.build().execute(&mut *self.conn).await?;
        }

        select_user(&mut self.conn, id).await
    }

    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_doors(&mut self) -> StoreResult<Vec<Door>> {
        let rows = sqlx::query("SELECT id, allowed_user_ids FROM doors ORDER BY id")
            .fetch_all(&mut *self.conn)
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<Door> {
                Ok(Door::new(
                    row.try_get::<String, _>("id")?,
                    parse_allow_list(&row.try_get::<String, _>("allowed_user_ids")?)?,
                ))
            })
            .collect()
    }

    async fn put_door(&mut self, door: &Door) -> StoreResult<()> {
        let allowed = serde_json::to_string(&door.allowed_user_ids).map_err(|e| StoreError::Decode(e.to_string()))?;

        let mut tx = self.conn.begin().await?;
        sqlx::query("DELETE FROM doors WHERE id = ?")
            .bind(door.id.clone())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO doors (id, allowed_user_ids) VALUES (?, ?)")
            .bind(door.id.clone())
            .bind(allowed)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn delete_door(&mut self, door_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM doors WHERE id = ?")
            .bind(door_id.to_string())
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn select_user(conn: &mut AnyConnection, id: UserId) -> StoreResult<Option<User>> {
    let row = sqlx::query("SELECT id, full_name, active, created_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(decode_user).transpose()
}

fn decode_user(row: &AnyRow) -> StoreResult<User> {
    let created_at: i64 = row.try_get("created_at")?;
    Ok(User {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        active: row.try_get::<i64, _>("active")? != 0,
        created_at: DateTime::from_timestamp_millis(created_at)
            .ok_or_else(|| StoreError::Decode(format!("created_at {}", created_at)))?,
    })
}

fn decode_event(row: &AnyRow) -> StoreResult<AccessEvent> {
    let id: String = row.try_get("id")?;
    let ts: i64 = row.try_get("ts")?;
    let kind: String = row.try_get("credential_type")?;
    let result: String = row.try_get("result")?;
    let reason: Option<String> = row.try_get("reason")?;
    let presented_uid: Option<String> = row.try_get("presented_uid")?;
    let pin_sha: Option<String> = row.try_get("pin_sha")?;

    let credential_kind = CredentialKind::parse(&kind)
        .ok_or_else(|| StoreError::Decode(format!("credential_type {:?}", kind)))?;

    Ok(AccessEvent {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Decode(e.to_string()))?,
        door_id: row.try_get("door_id")?,
        user_id: row.try_get("user_id")?,
        credential_kind,
        credential_payload: match credential_kind {
            CredentialKind::Rfid => presented_uid,
            CredentialKind::Pin => pin_sha,
        }
        .unwrap_or_default(),
        decision: Decision::parse(&result)
            .ok_or_else(|| StoreError::Decode(format!("result {:?}", result)))?,
        reason: reason.as_deref().and_then(DecisionReason::parse),
        timestamp: DateTime::from_timestamp_millis(ts)
            .ok_or_else(|| StoreError::Decode(format!("timestamp {}", ts)))?,
    })
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use gatekeeper_model::ResolvedIdentity;

    async fn sqlite_store() -> SqlCredentialStore {
        sqlx::any::install_default_drivers();
        // One connection that never expires keeps the in-memory database alive.
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqlCredentialStore::new(pool);
        store.init_schema().await.unwrap();

        for statement in [
            "INSERT INTO users (id, full_name, active, created_at) VALUES (10, 'Ada', 1, 0)",
            "INSERT INTO users (id, full_name, active, created_at) VALUES (11, 'Brian', 1, 0)",
            "INSERT INTO users (id, full_name, active, created_at) VALUES (22, 'Carla', 1, 0)",
            "INSERT INTO users (id, full_name, active, created_at) VALUES (30, 'Dmitri', 0, 0)",
            "INSERT INTO doors (id, allowed_user_ids) VALUES ('3', '[10,22]')",
            "INSERT INTO doors (id, allowed_user_ids) VALUES ('4', 'not-a-list')",
            "INSERT INTO rfid_cards (uid, user_id, active) VALUES ('AB12', 22, 1)",
            "INSERT INTO rfid_cards (uid, user_id, active) VALUES ('DEAD', 10, 0)",
            "INSERT INTO pins (id, user_id, pin_hash, active) VALUES (3, 22, 'hash-c', 1)",
            "INSERT INTO pins (id, user_id, pin_hash, active) VALUES (1, 10, 'hash-a', 1)",
            "INSERT INTO pins (id, user_id, pin_hash, active) VALUES (2, 11, 'hash-b', 0)",
            "INSERT INTO rfid_cards (uid, user_id, active) VALUES ('GONE', 30, 1)",
            "INSERT INTO rfid_cards (uid, user_id, active) VALUES ('ORPHAN', 99, 1)",
            "INSERT INTO pins (id, user_id, pin_hash, active) VALUES (4, 30, 'hash-d', 1)",
            "INSERT INTO pins (id, user_id, pin_hash, active) VALUES (5, 99, 'hash-e', 1)",
        ] {
            sqlx::query(statement).execute(&store.pool).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_door_allow_list() {
        let store = sqlite_store().await;
        let mut session = store.checkout().await.unwrap();

        assert_eq!(session.door_allow_list("3").await.unwrap(), vec![10, 22]);
        assert!(session.door_allow_list("404").await.unwrap().is_empty());
        assert!(matches!(
            session.door_allow_list("4").await,
            Err(StoreError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_init_schema_twice_keeps_rows() {
        let store = sqlite_store().await;
        store.init_schema().await.unwrap();

        let mut session = store.checkout().await.unwrap();
        assert_eq!(session.door_allow_list("3").await.unwrap(), vec![10, 22]);
        assert_eq!(session.list_users(MAX_USER_PAGE).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_find_active_rfid() {
        let store = sqlite_store().await;
        let mut session = store.checkout().await.unwrap();

        let record = session.find_active_rfid("AB12").await.unwrap().unwrap();
        assert_eq!(record.user_id, 22);
        assert_eq!(record.secret, "AB12");

        assert!(session.find_active_rfid("DEAD").await.unwrap().is_none());
        assert!(session.find_active_rfid("' OR '1'='1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_or_missing_user_never_resolves() {
        let store = sqlite_store().await;
        let mut session = store.checkout().await.unwrap();

        assert!(session.find_active_rfid("GONE").await.unwrap().is_none());
        assert!(session.find_active_rfid("ORPHAN").await.unwrap().is_none());

        session
            .update_user(30, &UserPatch { full_name: None, active: Some(true) })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.find_active_rfid("GONE").await.unwrap().unwrap().user_id, 30);

        session
            .update_user(22, &UserPatch { full_name: None, active: Some(false) })
            .await
            .unwrap()
            .unwrap();
        let hashes: Vec<String> = session
            .list_active_pins()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.secret)
            .collect();
        assert_eq!(hashes, vec!["hash-a", "hash-d"]);
    }

    #[tokio::test]
    async fn test_user_admin() {
        let store = sqlite_store().await;
        let mut session = store.checkout().await.unwrap();

        let created = session
            .insert_user(&NewUser { id: None, full_name: "Edith".to_string(), active: true })
            .await
            .unwrap();
        assert_eq!(created.id, 31);
        assert!(created.active);

        let duplicate = session
            .insert_user(&NewUser { id: Some(10), full_name: "Dup".to_string(), active: true })
            .await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

        let renamed = session
            .update_user(31, &UserPatch { full_name: Some("Edith W.".to_string()), active: None })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.full_name, "Edith W.");
        assert!(session.update_user(404, &UserPatch::default()).await.unwrap().is_none());

        let ids: Vec<UserId> = session.list_users(3).await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![31, 30, 22]);

        assert!(session.delete_user(31).await.unwrap());
        assert!(!session.delete_user(31).await.unwrap());
    }

    #[tokio::test]
    async fn test_door_admin() {
        let store = sqlite_store().await;
        let mut session = store.checkout().await.unwrap();

        session.put_door(&Door::new("3", vec![11])).await.unwrap();
        session.put_door(&Door::new("5", Vec::new())).await.unwrap();
        assert_eq!(session.door_allow_list("3").await.unwrap(), vec![11]);

        assert!(session.delete_door("4").await.unwrap());
        let doors = session.list_doors().await.unwrap();
        assert_eq!(doors, vec![Door::new("3", vec![11]), Door::new("5", Vec::new())]);

        assert!(!session.delete_door("4").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_active_pins_in_id_order() {
        let store = sqlite_store().await;
        let mut session = store.checkout().await.unwrap();

        let pins = session.list_active_pins().await.unwrap();
        let hashes: Vec<&str> = pins.iter().map(|p| p.secret.as_str()).collect();
        assert_eq!(hashes, vec!["hash-a", "hash-c"]);
        assert!(pins.iter().all(|p| p.active && p.kind == CredentialKind::Pin));
    }

    #[tokio::test]
    async fn test_insert_and_list_events() {
        let store = sqlite_store().await;
        let mut session = store.checkout().await.unwrap();

        let granted = AccessEvent::new("3", ResolvedIdentity::User(22), CredentialKind::Rfid, "AB12", Decision::Granted);
        let denied = AccessEvent::new("3", ResolvedIdentity::Unknown, CredentialKind::Pin, "$argon2id$stub", Decision::Denied)
            .with_reason(Some(DecisionReason::PinNoMatch));
        session.insert_access_event(&granted).await.unwrap();
        session.insert_access_event(&denied).await.unwrap();

        let all = session.list_access_events(&AccessEventFilter::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let pins = session
            .list_access_events(&AccessEventFilter::new().with_credential_kind(CredentialKind::Pin))
            .await
            .unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].id, denied.id);
        assert_eq!(pins[0].user_id, None);
        assert_eq!(pins[0].credential_payload, "$argon2id$stub");
        assert_eq!(pins[0].reason, Some(DecisionReason::PinNoMatch));

        let granted_rows = session
            .list_access_events(&AccessEventFilter::new().with_decision(Decision::Granted))
            .await
            .unwrap();
        assert_eq!(granted_rows.len(), 1);
        assert_eq!(granted_rows[0].user_id, Some(22));
        assert_eq!(granted_rows[0].credential_payload, "AB12");
        assert_eq!(granted_rows[0].reason, None);
    }
}
