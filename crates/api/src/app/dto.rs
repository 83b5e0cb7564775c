use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use timetable_auth::{SessionRecord, SessionToken};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Revoke the principal's other sessions before issuing this one.
    #[serde(default)]
    pub single_session: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub principal_id: String,
    pub role: String,
}

impl From<SessionRecord> for LoginResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            token: record.token.as_str().to_string(),
            token_type: "Bearer",
            expires_at: record.expires_at,
            principal_id: record.principal_id.to_string(),
            role: record.principal_role.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub expires_at: DateTime<Utc>,
}

/// A session as shown to clients: never the full token.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub token_fingerprint: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub current: bool,
}

impl SessionView {
    pub fn new(record: &SessionRecord, current: Option<&SessionToken>) -> Self {
        Self {
            token_fingerprint: record.token.fingerprint().to_string(),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            current: current.is_some_and(|t| t == &record.token),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub principal_id: String,
    pub role: String,
    pub sessions: Vec<SessionView>,
}
