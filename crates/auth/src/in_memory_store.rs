use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use timetable_core::{Clock, SystemClock};

use crate::store::{SessionStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-memory session store.
///
/// Intended for tests/dev. Expiry is evaluated against the injected clock, so
/// a `ManualClock` makes physical expiry deterministic. The store can be
/// switched "offline" to exercise outage handling.
#[derive(Debug)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys (sessions and index entries).
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .map(|e| e.values().filter(|v| v.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining physical lifetime of `key`, if it exists and has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key).filter(|e| e.is_live(now))?;
        (entry.expires_at? - now).to_std().ok()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        }
    }

    fn deadline(&self, ttl: Duration) -> Option<DateTime<Utc>> {
        TimeDelta::from_std(ttl)
            .ok()
            .and_then(|d| self.clock.now().checked_add_signed(d))
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.check_available()?;
        self.entries
            .read()
            .map_err(|_| StoreError::Command("lock poisoned".to_string()))
    }

    /// Write access with expired entries already purged.
    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.check_available()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Command("lock poisoned".to_string()))?;
        let now = self.clock.now();
        entries.retain(|_, e| e.is_live(now));
        Ok(entries)
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Command(format!("WRONGTYPE operation against key '{key}'"))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        let entries = self.read()?;
        match entries.get(key).filter(|e| e.is_live(now)) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(v),
                ..
            }) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = self.deadline(ttl);
        let mut entries = self.write()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn replace(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let expires_at = self.deadline(ttl);
        let mut entries = self.write()?;
        match entries.get_mut(key) {
            None => Ok(false),
            Some(entry) => {
                *entry = Entry {
                    value: Value::Text(value.to_string()),
                    expires_at,
                };
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.write()?;
        Ok(entries.remove(key).is_some())
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut entries = self.write()?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            Value::Text(_) => Err(wrong_type(key)),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut entries = self.write()?;
        let now_empty = match entries.get_mut(key) {
            None => return Ok(()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let entries = self.read()?;
        match entries.get(key).filter(|e| e.is_live(now)) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = self.deadline(ttl);
        let mut entries = self.write()?;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = expires_at;
        }
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let entries = self.read()?;
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use timetable_core::ManualClock;

    use super::*;

    fn store() -> (Arc<ManualClock>, InMemorySessionStore) {
        let clock = Arc::new(ManualClock::default());
        let store = InMemorySessionStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn values_expire_with_the_clock() {
        let (clock, store) = store();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(TimeDelta::seconds(10));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn replace_only_writes_existing_keys() {
        let (_clock, store) = store();
        assert!(!store.replace("k", "v", Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "old", Duration::from_secs(5)).await.unwrap();
        assert!(store.replace("k", "new", Duration::from_secs(50)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(50)));
    }

    #[tokio::test]
    async fn replace_does_not_resurrect_expired_keys() {
        let (clock, store) = store();
        store.set("k", "v", Duration::from_secs(1)).await.unwrap();
        clock.advance(TimeDelta::seconds(2));
        assert!(!store.replace("k", "v2", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn empty_sets_disappear() {
        let (_clock, store) = store();
        store.set_add("idx", "a").await.unwrap();
        store.set_add("idx", "b").await.unwrap();
        assert_eq!(store.set_members("idx").await.unwrap(), vec!["a", "b"]);

        store.set_remove("idx", "a").await.unwrap();
        store.set_remove("idx", "b").await.unwrap();
        assert!(store.set_members("idx").await.unwrap().is_empty());
        assert!(store.scan_prefix("idx").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn type_mismatch_is_a_command_error() {
        let (_clock, store) = store();
        store.set("k", "v", Duration::from_secs(5)).await.unwrap();
        assert!(matches!(
            store.set_add("k", "m").await,
            Err(StoreError::Command(_))
        ));
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let (_clock, store) = store();
        store.set_available(false);
        assert!(matches!(store.get("k").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.set("k", "v", Duration::from_secs(1)).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_available(true);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_matches_prefix_only() {
        let (_clock, store) = store();
        store.set("session:a", "1", Duration::from_secs(5)).await.unwrap();
        store.set_add("principal-sessions:TEACHER:t1", "a").await.unwrap();

        let keys = store.scan_prefix("principal-sessions:").await.unwrap();
        assert_eq!(keys, vec!["principal-sessions:TEACHER:t1".to_string()]);
    }
}
