//! Credential verification seam used by the login flow.
//!
//! Checking a password against a stored hash belongs to the identity/persistence
//! side of the system; this module only defines the contract the login flow
//! calls before issuing a session.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::principal::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` means the credentials were checked and rejected.
    async fn verify(&self, username: &str, secret: &str) -> Result<Option<Principal>, CredentialError>;
}

/// Fixed username → (secret, principal) table.
///
/// Dev/test fixture only: secrets are kept in memory as given.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<String, (String, Principal)>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(
        mut self,
        username: impl Into<String>,
        secret: impl Into<String>,
        principal: Principal,
    ) -> Self {
        self.entries
            .insert(username.into(), (secret.into(), principal));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, username: &str, secret: &str) -> Result<Option<Principal>, CredentialError> {
        Ok(self
            .entries
            .get(username)
            .filter(|(expected, _)| expected == secret)
            .map(|(_, principal)| principal.clone()))
    }
}

#[cfg(test)]
mod tests {
    use timetable_core::{PrincipalId, Role};

    use super::*;

    #[tokio::test]
    async fn static_credentials_match_exactly() {
        let alice = Principal::new(PrincipalId::new("s-1").unwrap(), Role::Student);
        let creds = StaticCredentials::new().with_user("alice", "pw", alice.clone());

        assert_eq!(creds.verify("alice", "pw").await, Ok(Some(alice)));
        assert_eq!(creds.verify("alice", "PW").await, Ok(None));
        assert_eq!(creds.verify("bob", "pw").await, Ok(None));
    }
}
