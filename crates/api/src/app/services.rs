use std::sync::Arc;

use anyhow::Context;

use timetable_auth::{CredentialVerifier, SessionManager, SessionStore, StaticCredentials};
use timetable_infra::session_store::{InMemorySessionStore, RedisSessionStore};

use crate::config::ApiConfig;

/// Shared handles available to every handler through an `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub sessions: Arc<SessionManager>,
    pub credentials: Arc<dyn CredentialVerifier>,
}

impl AppServices {
    pub fn new(sessions: Arc<SessionManager>, credentials: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            sessions,
            credentials,
        }
    }
}

/// Wire the session store and credential source from configuration.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisSessionStore::connect(url)
                .await
                .context("connecting to the redis session store")?;
            tracing::info!("using redis session store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("using in-memory session store; sessions are lost on restart");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let sessions = SessionManager::new(store, config.session.clone())
        .context("invalid session configuration")?;

    let credentials = config
        .dev_users
        .iter()
        .fold(StaticCredentials::new(), |creds, user| {
            creds.with_user(&user.username, &user.secret, user.principal.clone())
        });
    if credentials.is_empty() {
        tracing::warn!("no credentials configured; logins will be rejected");
    }

    Ok(AppServices::new(Arc::new(sessions), Arc::new(credentials)))
}
