//! Session issuance and lifecycle (the token issuer).
//!
//! ## Key layout
//!
//! - `{store_key_prefix}{token}` → JSON-encoded [`SessionRecord`]
//! - `{index_key_prefix}{ROLE}:{principal_id}` → set of tokens (reverse index)
//!
//! ## Consistency
//!
//! Every store primitive is assumed atomic; sequences of them are not. The
//! reverse index is therefore best-effort: it may hold tokens whose record is
//! gone (pruned lazily, or by [`SessionManager::sweep_index`]) and, if a
//! process dies between the two writes of [`SessionManager::issue`], it may
//! miss a token that does have a record. Such a record stays resolvable until
//! it expires but is invisible to [`SessionManager::revoke_all`].
//!
//! ## Expiry
//!
//! `expires_at` in the record is authoritative and checked on every resolve.
//! The same deadline is also applied as the physical store TTL at issue and on
//! every refresh, so abandoned sessions leave the store on their own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use timetable_core::{Clock, PrincipalId, Role, SystemClock};

use crate::config::{ConfigError, SessionConfig};
use crate::store::{SessionStore, StoreError, StoreResult};
use crate::token::{SessionToken, fingerprint};

/// Stored proof that a principal authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: SessionToken,
    pub principal_id: PrincipalId,
    pub principal_role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A session is dead from `expires_at` onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Resolution failed. Deliberately carries no detail: "never existed",
/// "expired" and "store unreachable" all look the same to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("session not found")]
pub struct SessionNotFound;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    /// Retryable infrastructure failure.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("session record encoding failed: {0}")]
    Encoding(String),
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        Self::StoreUnavailable(value.to_string())
    }
}

impl From<SessionNotFound> for SessionError {
    fn from(_: SessionNotFound) -> Self {
        Self::NotFound
    }
}

/// Outcome of a reverse-index sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub indexes_scanned: usize,
    pub members_pruned: usize,
    pub expired_records_deleted: usize,
}

/// What a reverse-index member points at.
enum MemberState {
    Live(SessionRecord),
    Expired(SessionRecord),
    Stale,
}

/// Issues, resolves, refreshes and revokes session tokens.
///
/// Holds no session state of its own; the store is the single source of truth,
/// so one instance can be shared (`Arc`) across all concurrent requests.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    ttl: TimeDelta,
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let ttl = config.ttl_delta()?;
        Ok(Self {
            store,
            clock,
            config,
            ttl,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn session_key(&self, token: &str) -> String {
        format!("{}{}", self.config.store_key_prefix, token)
    }

    fn index_key(&self, principal_id: &PrincipalId, role: Role) -> String {
        format!("{}{}:{}", self.config.index_key_prefix, role, principal_id)
    }

    /// Bound a store call by the configured timeout.
    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.store_timeout)),
        }
    }

    /// Remaining lifetime of a record as a physical TTL (at least one second).
    fn physical_ttl(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (expires_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(Duration::from_secs(1))
    }

    /// Load and decode a record. Undecodable or mismatched records read as absent.
    async fn load(&self, token: &str) -> StoreResult<Option<SessionRecord>> {
        let Some(raw) = self.bounded(self.store.get(&self.session_key(token))).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) if record.token.as_str() == token => Ok(Some(record)),
            Ok(_) => {
                warn!(token = %fingerprint(token), "session record token mismatch; ignoring");
                Ok(None)
            }
            Err(err) => {
                warn!(token = %fingerprint(token), error = %err, "undecodable session record; ignoring");
                Ok(None)
            }
        }
    }

    fn encode(record: &SessionRecord) -> Result<String, SessionError> {
        serde_json::to_string(record).map_err(|e| SessionError::Encoding(e.to_string()))
    }

    /// Delete an expired record and drop it from its index entry. Failures are logged only.
    async fn reclaim(&self, record: &SessionRecord) {
        let token = record.token.as_str();
        if let Err(err) = self.bounded(self.store.delete(&self.session_key(token))).await {
            warn!(token = %record.token.fingerprint(), error = %err, "failed to delete expired session");
        }
        self.unindex(record).await;
    }

    async fn unindex(&self, record: &SessionRecord) {
        let index = self.index_key(&record.principal_id, record.principal_role);
        if let Err(err) = self
            .bounded(self.store.set_remove(&index, record.token.as_str()))
            .await
        {
            warn!(
                principal_id = %record.principal_id,
                role = %record.principal_role,
                error = %err,
                "failed to remove token from reverse index"
            );
        }
    }

    /// Issue a fresh session for `principal_id` acting as `role`.
    ///
    /// Does not revoke existing sessions: one principal may hold many (one per
    /// device). Callers wanting a single session revoke first.
    #[instrument(skip(self), fields(principal_id = %principal_id, role = %role), err)]
    pub async fn issue(
        &self,
        principal_id: &PrincipalId,
        role: Role,
    ) -> Result<SessionRecord, SessionError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| SessionError::Encoding("expiry out of range".to_string()))?;

        let record = SessionRecord {
            token: SessionToken::generate(self.config.token_byte_length),
            principal_id: principal_id.clone(),
            principal_role: role,
            issued_at: now,
            expires_at,
        };
        let payload = Self::encode(&record)?;

        self.bounded(self.store.set(
            &self.session_key(record.token.as_str()),
            &payload,
            self.config.session_ttl,
        ))
        .await?;

        if self.config.multi_device_enabled {
            let index = self.index_key(principal_id, role);
            let indexed = async {
                self.bounded(self.store.set_add(&index, record.token.as_str()))
                    .await?;
                self.bounded(self.store.expire(&index, self.config.session_ttl))
                    .await
            }
            .await;

            if let Err(err) = indexed {
                // A record the index cannot see would survive revoke_all; take it back.
                if let Err(cleanup) = self
                    .bounded(self.store.delete(&self.session_key(record.token.as_str())))
                    .await
                {
                    warn!(error = %cleanup, "failed to roll back unindexed session");
                }
                return Err(err.into());
            }
        }

        debug!(token = %record.token.fingerprint(), expires_at = %record.expires_at, "session issued");
        Ok(record)
    }

    /// Whether `token` names a live session. Never fails; problems read as `false`.
    pub async fn validate(&self, token: &SessionToken) -> bool {
        self.resolve(token).await.is_ok()
    }

    /// Look up the live session behind `token`.
    ///
    /// An expired record is deleted on the spot. Store failures are logged and
    /// reported as [`SessionNotFound`] so this path can never fail open.
    pub async fn resolve(&self, token: &SessionToken) -> Result<SessionRecord, SessionNotFound> {
        if token.as_str().is_empty() {
            return Err(SessionNotFound);
        }

        let record = match self.load(token.as_str()).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(SessionNotFound),
            Err(err) => {
                warn!(token = %token.fingerprint(), error = %err, "session lookup failed; treating as unauthenticated");
                return Err(SessionNotFound);
            }
        };

        if record.is_expired_at(self.clock.now()) {
            debug!(token = %token.fingerprint(), "session expired");
            self.reclaim(&record).await;
            return Err(SessionNotFound);
        }

        Ok(record)
    }

    /// Extend a live session to `now + session_ttl`. Never shortens it.
    ///
    /// Returns the new `expires_at`.
    #[instrument(skip(self), fields(token = %token.fingerprint()), err)]
    pub async fn refresh(&self, token: &SessionToken) -> Result<DateTime<Utc>, SessionError> {
        let record = self
            .load(token.as_str())
            .await?
            .ok_or(SessionError::NotFound)?;

        let now = self.clock.now();
        if record.is_expired_at(now) {
            self.reclaim(&record).await;
            return Err(SessionError::NotFound);
        }

        let candidate = now.checked_add_signed(self.ttl).unwrap_or(record.expires_at);
        let refreshed = SessionRecord {
            expires_at: record.expires_at.max(candidate),
            ..record
        };
        let payload = Self::encode(&refreshed)?;
        let physical_ttl = self.physical_ttl(refreshed.expires_at, now);

        // Conditional write: a concurrent revoke must not be undone.
        let written = self
            .bounded(self.store.replace(
                &self.session_key(token.as_str()),
                &payload,
                physical_ttl,
            ))
            .await?;
        if !written {
            return Err(SessionError::NotFound);
        }

        if self.config.multi_device_enabled {
            let index = self.index_key(&refreshed.principal_id, refreshed.principal_role);
            let index_ttl = physical_ttl.max(self.config.session_ttl);
            if let Err(err) = self.bounded(self.store.expire(&index, index_ttl)).await {
                warn!(error = %err, "failed to extend reverse index lifetime");
            }
        }

        debug!(expires_at = %refreshed.expires_at, "session refreshed");
        Ok(refreshed.expires_at)
    }

    /// End one session. Idempotent: unknown tokens are a no-op.
    #[instrument(skip(self), fields(token = %token.fingerprint()), err)]
    pub async fn revoke(&self, token: &SessionToken) -> Result<(), SessionError> {
        let record = self.load(token.as_str()).await?;
        let deleted = self
            .bounded(self.store.delete(&self.session_key(token.as_str())))
            .await?;

        match record {
            Some(record) => {
                if self.config.multi_device_enabled {
                    self.unindex(&record).await;
                }
                debug!(principal_id = %record.principal_id, role = %record.principal_role, "session revoked");
            }
            None => debug!(deleted, "revoke of unknown session"),
        }
        Ok(())
    }

    /// End every indexed session of a principal, then drop the index entry.
    #[instrument(skip(self), fields(principal_id = %principal_id, role = %role), err)]
    pub async fn revoke_all(&self, principal_id: &PrincipalId, role: Role) -> Result<(), SessionError> {
        let index = self.index_key(principal_id, role);
        let tokens = self.bounded(self.store.set_members(&index)).await?;

        for token in &tokens {
            self.bounded(self.store.delete(&self.session_key(token)))
                .await?;
        }
        self.bounded(self.store.delete(&index)).await?;

        debug!(count = tokens.len(), "all sessions revoked");
        Ok(())
    }

    /// Classify one reverse-index member.
    async fn member_state(
        &self,
        token: &str,
        principal_id: &PrincipalId,
        role: Role,
        now: DateTime<Utc>,
    ) -> StoreResult<MemberState> {
        Ok(match self.load(token).await? {
            None => MemberState::Stale,
            Some(record) if record.principal_id != *principal_id || record.principal_role != role => {
                MemberState::Stale
            }
            Some(record) if record.is_expired_at(now) => MemberState::Expired(record),
            Some(record) => MemberState::Live(record),
        })
    }

    /// Live sessions of a principal (one per device), oldest first.
    ///
    /// Index members that no longer point at a live record are pruned on the way.
    pub async fn list_sessions(
        &self,
        principal_id: &PrincipalId,
        role: Role,
    ) -> Result<Vec<SessionRecord>, SessionError> {
        let index = self.index_key(principal_id, role);
        let tokens = self.bounded(self.store.set_members(&index)).await?;
        let now = self.clock.now();

        let mut live = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.member_state(&token, principal_id, role, now).await? {
                MemberState::Live(record) => live.push(record),
                MemberState::Expired(record) => self.reclaim(&record).await,
                MemberState::Stale => {
                    if let Err(err) = self.bounded(self.store.set_remove(&index, &token)).await {
                        warn!(error = %err, "failed to prune stale reverse index member");
                    }
                }
            }
        }

        live.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(live)
    }

    /// Walk every reverse-index entry and drop members whose record is gone.
    ///
    /// Purely hygienic: resolve/validate are correct without it.
    pub async fn sweep_index(&self) -> Result<SweepReport, SessionError> {
        let prefix = &self.config.index_key_prefix;
        let keys = self.bounded(self.store.scan_prefix(prefix)).await?;
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for key in keys {
            let Some((role, principal_id)) = key.strip_prefix(prefix.as_str()).and_then(parse_index_key)
            else {
                warn!(key = %key, "unrecognized reverse index key; skipping");
                continue;
            };
            report.indexes_scanned += 1;

            let tokens = self.bounded(self.store.set_members(&key)).await?;
            for token in tokens {
                match self.member_state(&token, &principal_id, role, now).await? {
                    MemberState::Live(_) => {}
                    MemberState::Expired(record) => {
                        self.bounded(self.store.delete(&self.session_key(&token)))
                            .await?;
                        self.bounded(self.store.set_remove(&key, record.token.as_str()))
                            .await?;
                        report.expired_records_deleted += 1;
                        report.members_pruned += 1;
                    }
                    MemberState::Stale => {
                        self.bounded(self.store.set_remove(&key, &token)).await?;
                        report.members_pruned += 1;
                    }
                }
            }
        }

        debug!(?report, "reverse index sweep finished");
        Ok(report)
    }
}

/// `{ROLE}:{principal_id}` → parts.
fn parse_index_key(rest: &str) -> Option<(Role, PrincipalId)> {
    let (role, principal_id) = rest.split_once(':')?;
    Some((role.parse().ok()?, principal_id.parse().ok()?))
}
