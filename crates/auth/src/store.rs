use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Session store operation error.
///
/// These are **infrastructure errors**; the session manager decides whether
/// they propagate (write paths) or degrade to "not authenticated" (read paths).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store command failed: {0}")]
    Command(String),
}

/// Shared key-value store backing sessions.
///
/// Two kinds of values live in the store: plain strings (serialized session
/// records) and string sets (reverse index entries).
///
/// ## Atomicity
///
/// Each method is expected to be atomic on its own. Nothing is assumed about
/// a *sequence* of calls; callers must tolerate interleavings.
///
/// ## Expiry
///
/// Keys written with a time-to-live disappear once it elapses, exactly as if
/// they had been deleted.
///
/// ## Sets
///
/// A set whose last member is removed ceases to exist.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Unconditional write, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Write only if `key` currently exists. Returns whether the write happened.
    async fn replace(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()>;

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Members of the set at `key` (empty when absent).
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// (Re)arm the time-to-live of an existing key. No-op when absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;

    /// All live keys starting with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

#[async_trait]
impl<S> SessionStore for Arc<S>
where
    S: SessionStore + ?Sized,
{
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn replace(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        (**self).replace(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        (**self).set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        (**self).set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        (**self).set_members(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        (**self).expire(key, ttl).await
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).scan_prefix(prefix).await
    }
}
