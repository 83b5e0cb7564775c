//! Session store backends.
//!
//! The `SessionStore` contract and the in-memory backend live in
//! `timetable-auth` as pure mechanics. This module provides
//! infrastructure-backed implementations (e.g. Redis).

pub use timetable_auth::{InMemorySessionStore, SessionStore, StoreError};

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisSessionStore;
