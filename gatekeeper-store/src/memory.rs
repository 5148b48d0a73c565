//! In-memory credential store.
//!
//! Suitable for tests and single-process demos. Tracks how many sessions are
//! checked out so callers can assert that every exit path releases its
//! connection, and can be switched into failure modes.

use crate::error::{StoreError, StoreResult};
use crate::store::{CredentialStore, StoreSession, MAX_USER_PAGE};
use async_trait::async_trait;
use gatekeeper_model::{AccessEvent, AccessEventFilter, CredentialRecord, Door, NewUser, User, UserId, UserPatch};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryData {
    doors: HashMap<String, Vec<UserId>>,
    users: BTreeMap<UserId, User>,
    rfid_cards: Vec<CredentialRecord>,
    pins: Vec<CredentialRecord>,
    events: Vec<AccessEvent>,
}

impl MemoryData {
    fn resolvable(&self, record: &CredentialRecord) -> bool {
        record.active && self.users.get(&record.user_id).is_some_and(|u| u.active)
    }
}

#[derive(Debug, Default)]
struct Switches {
    unavailable: AtomicBool,
    reject_inserts: AtomicBool,
    fail_allow_list: AtomicBool,
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    data: Arc<RwLock<MemoryData>>,
    switches: Arc<Switches>,
    open_sessions: Arc<AtomicUsize>,
    checkouts: Arc<AtomicU64>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a door allow-list.
    pub async fn put_door(&self, door_id: impl Into<String>, allowed_user_ids: Vec<UserId>) {
        self.data
            .write()
            .await
            .doors
            .insert(door_id.into(), allowed_user_ids);
    }

    /// Insert or replace a user.
    pub async fn add_user(&self, user: User) {
        self.data.write().await.users.insert(user.id, user);
    }

    /// Add an RFID record.
    pub async fn add_rfid(&self, record: CredentialRecord) {
        self.data.write().await.rfid_cards.push(record);
    }

    /// Add a PIN record. Records are scanned in insertion order.
    pub async fn add_pin(&self, record: CredentialRecord) {
        self.data.write().await.pins.push(record);
    }

    /// Snapshot of every stored audit event, oldest first.
    pub async fn events(&self) -> Vec<AccessEvent> {
        self.data.read().await.events.clone()
    }

    /// Number of sessions currently checked out.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of sessions ever checked out.
    pub fn total_checkouts(&self) -> u64 {
        self.checkouts.load(Ordering::SeqCst)
    }

    /// Make every call (including checkout) fail as if the store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.switches.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make audit inserts fail while reads keep working.
    pub fn set_reject_inserts(&self, reject: bool) {
        self.switches.reject_inserts.store(reject, Ordering::SeqCst);
    }

    /// Make door allow-list lookups fail while credential lookups keep
    /// working.
    pub fn set_fail_allow_list(&self, fail: bool) {
        self.switches.fail_allow_list.store(fail, Ordering::SeqCst);
    }

    fn check_available(switches: &Switches) -> StoreResult<()> {
        if switches.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn checkout(&self) -> StoreResult<Box<dyn StoreSession>> {
        Self::check_available(&self.switches)?;

        self.checkouts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            data: self.data.clone(),
            switches: self.switches.clone(),
            _guard: SessionGuard::acquire(self.open_sessions.clone()),
        }))
    }
}

/// Decrements the open-session count when the session goes away.
struct SessionGuard(Arc<AtomicUsize>);

impl SessionGuard {
    fn acquire(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemorySession {
    data: Arc<RwLock<MemoryData>>,
    switches: Arc<Switches>,
    _guard: SessionGuard,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn door_allow_list(&mut self, door_id: &str) -> StoreResult<Vec<UserId>> {
        MemoryCredentialStore::check_available(&self.switches)?;
        if self.switches.fail_allow_list.load(Ordering::SeqCst) {
            return Err(StoreError::Query("doors table unreadable".to_string()));
        }
        Ok(self
            .data
            .read()
            .await
            .doors
            .get(door_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_active_rfid(&mut self, uid: &str) -> StoreResult<Option<CredentialRecord>> {
        MemoryCredentialStore::check_available(&self.switches)?;
        let data = self.data.read().await;
        Ok(data
            .rfid_cards
            .iter()
            .find(|r| r.secret == uid && data.resolvable(r))
            .cloned())
    }

    async fn list_active_pins(&mut self) -> StoreResult<Vec<CredentialRecord>> {
        MemoryCredentialStore::check_available(&self.switches)?;
        let data = self.data.read().await;
        Ok(data
            .pins
            .iter()
            .filter(|r| data.resolvable(r))
            .cloned()
            .collect())
    }

    async fn insert_access_event(&mut self, event: &AccessEvent) -> StoreResult<()> {
        MemoryCredentialStore::check_available(&self.switches)?;
        if self.switches.reject_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Query("events table is read-only".to_string()));
        }
        self.data.write().await.events.push(event.clone());
        Ok(())
    }

    async fn list_access_events(&mut self, filter: &AccessEventFilter) -> StoreResult<Vec<AccessEvent>> {
        MemoryCredentialStore::check_available(&self.switches)?;
        let data = self.data.read().await;
        let mut events: Vec<AccessEvent> = data
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        events.truncate(filter.effective_limit() as usize);
        Ok(events)
    }

    async fn list_users(&mut self, limit: u32) -> StoreResult<Vec<User>> {
        MemoryCredentialStore::check_available(&self.switches)?;
        let limit = limit.clamp(1, MAX_USER_PAGE) as usize;
        Ok(self
            .data
            .read()
            .await
            .users
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_user(&mut self, new_user: &NewUser) -> StoreResult<User> {
        MemoryCredentialStore::check_available(&self.switches)?;
        let mut data = self.data.write().await;

        let id = match new_user.id {
            Some(id) if data.users.contains_key(&id) => {
                return Err(StoreError::Conflict(format!("user {} already exists", id)));
            }
            Some(id) => id,
            None => data.users.keys().next_back().map_or(1, |max| max + 1),
        };

        let mut user = User::new(id, new_user.full_name.clone());
        user.active = new_user.active;
        data.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&mut self, id: UserId, patch: &UserPatch) -> StoreResult<Option<User>> {
        MemoryCredentialStore::check_available(&self.switches)?;
        let mut data = self.data.write().await;
        Ok(data.users.get_mut(&id).map(|user| {
            user.apply(patch);
            user.clone()
        }))
    }

    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool> {
        MemoryCredentialStore::check_available(&self.switches)?;
        Ok(self.data.write().await.users.remove(&id).is_some())
    }

    async fn list_doors(&mut self) -> StoreResult<Vec<Door>> {
        MemoryCredentialStore::check_available(&self.switches)?;
        let data = self.data.read().await;
        let mut doors: Vec<Door> = data
            .doors
            .iter()
            .map(|(id, allowed)| Door::new(id.clone(), allowed.clone()))
            .collect();
        doors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(doors)
    }

    async fn put_door(&mut self, door: &Door) -> StoreResult<()> {
        MemoryCredentialStore::check_available(&self.switches)?;
        self.data
            .write()
            .await
            .doors
            .insert(door.id.clone(), door.allowed_user_ids.clone());
        Ok(())
    }

    async fn delete_door(&mut self, door_id: &str) -> StoreResult<bool> {
        MemoryCredentialStore::check_available(&self.switches)?;
        Ok(self.data.write().await.doors.remove(door_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_model::{CredentialKind, Decision, ResolvedIdentity};

    async fn seeded() -> MemoryCredentialStore {
        let store = MemoryCredentialStore::new();
        store.put_door("3", vec![10, 22]).await;
        for id in [10, 11, 22] {
            store.add_user(User::new(id, format!("user-{}", id))).await;
        }
        store.add_rfid(CredentialRecord::rfid("AB12", 22)).await;
        store.add_rfid(CredentialRecord::rfid("DEAD", 10).deactivated()).await;
        store.add_pin(CredentialRecord::pin("h1", 10)).await;
        store.add_pin(CredentialRecord::pin("h2", 11).deactivated()).await;
        store.add_pin(CredentialRecord::pin("h3", 22)).await;
        store
    }

    #[tokio::test]
    async fn test_lookups() {
        let store = seeded().await;
        let mut session = store.checkout().await.unwrap();

        assert_eq!(session.door_allow_list("3").await.unwrap(), vec![10, 22]);
        assert!(session.door_allow_list("99").await.unwrap().is_empty());

        let record = session.find_active_rfid("AB12").await.unwrap().unwrap();
        assert_eq!(record.user_id, 22);
        assert!(session.find_active_rfid("DEAD").await.unwrap().is_none());

        let pins = session.list_active_pins().await.unwrap();
        let owners: Vec<UserId> = pins.iter().map(|p| p.user_id).collect();
        assert_eq!(owners, vec![10, 22]);
    }

    #[tokio::test]
    async fn test_inactive_or_missing_user_never_resolves() {
        let store = seeded().await;
        store.add_user(User::new(22, "user-22").deactivated()).await;
        store.add_rfid(CredentialRecord::rfid("NOUSER", 99)).await;
        store.add_pin(CredentialRecord::pin("h9", 99)).await;
        let mut session = store.checkout().await.unwrap();

        assert!(session.find_active_rfid("AB12").await.unwrap().is_none());
        assert!(session.find_active_rfid("NOUSER").await.unwrap().is_none());

        let owners: Vec<UserId> = session
            .list_active_pins()
            .await
            .unwrap()
            .iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(owners, vec![10]);

        session
            .update_user(22, &UserPatch { full_name: None, active: Some(true) })
            .await
            .unwrap()
            .unwrap();
        assert!(session.find_active_rfid("AB12").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fail_allow_list_mode() {
        let store = seeded().await;
        store.set_fail_allow_list(true);
        let mut session = store.checkout().await.unwrap();

        assert!(matches!(session.door_allow_list("3").await, Err(StoreError::Query(_))));
        assert!(session.find_active_rfid("AB12").await.unwrap().is_some());
        assert_eq!(session.list_active_pins().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_user_admin() {
        let store = seeded().await;
        let mut session = store.checkout().await.unwrap();

        let created = session
            .insert_user(&NewUser { id: None, full_name: "Grace".to_string(), active: true })
            .await
            .unwrap();
        assert_eq!(created.id, 23);

        let conflict = session
            .insert_user(&NewUser { id: Some(10), full_name: "Dup".to_string(), active: true })
            .await;
        assert!(matches!(conflict, Err(StoreError::Conflict(_))));

        let ids: Vec<UserId> = session.list_users(2).await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![23, 22]);

        assert!(session.update_user(404, &UserPatch::default()).await.unwrap().is_none());
        assert!(session.delete_user(23).await.unwrap());
        assert!(!session.delete_user(23).await.unwrap());
    }

    #[tokio::test]
    async fn test_door_admin() {
        let store = seeded().await;
        let mut session = store.checkout().await.unwrap();

        session.put_door(&Door::new("1", vec![22])).await.unwrap();
        session.put_door(&Door::new("3", vec![11])).await.unwrap();

        let doors = session.list_doors().await.unwrap();
        assert_eq!(doors, vec![Door::new("1", vec![22]), Door::new("3", vec![11])]);
        assert_eq!(session.door_allow_list("3").await.unwrap(), vec![11]);

        assert!(session.delete_door("1").await.unwrap());
        assert!(!session.delete_door("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_sessions_released_on_drop() {
        let store = seeded().await;
        {
            let _a = store.checkout().await.unwrap();
            let _b = store.checkout().await.unwrap();
            assert_eq!(store.open_sessions(), 2);
        }
        assert_eq!(store.open_sessions(), 0);
        assert_eq!(store.total_checkouts(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_mode() {
        let store = seeded().await;
        let mut session = store.checkout().await.unwrap();

        store.set_unavailable(true);
        assert!(matches!(
            session.door_allow_list("3").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.checkout().await.is_err());

        drop(session);
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_events_listing() {
        let store = seeded().await;
        store.set_reject_inserts(true);

        let mut session = store.checkout().await.unwrap();
        let granted = AccessEvent::new("3", ResolvedIdentity::User(22), CredentialKind::Rfid, "AB12", Decision::Granted);
        assert!(session.insert_access_event(&granted).await.is_err());

        store.set_reject_inserts(false);
        session.insert_access_event(&granted).await.unwrap();
        let denied = AccessEvent::new("3", ResolvedIdentity::Unknown, CredentialKind::Pin, "hash", Decision::Denied);
        session.insert_access_event(&denied).await.unwrap();

        let all = session.list_access_events(&AccessEventFilter::new()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, denied.id);

        let only_granted = session
            .list_access_events(&AccessEventFilter::new().with_decision(Decision::Granted))
            .await
            .unwrap();
        assert_eq!(only_granted, vec![granted]);

        let limited = session
            .list_access_events(&AccessEventFilter::new().with_limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
