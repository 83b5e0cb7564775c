use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::policy::{RouteKey, RoutePolicy, RoutePolicyTable};
use crate::principal::AuthenticatedPrincipal;
use crate::session::SessionManager;
use crate::token::SessionToken;

/// Outcome of a successful gate pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Route is public; no principal was (or needed to be) established.
    Public,
    /// Route is protected and the caller holds a session with an admitted role.
    Granted(AuthenticatedPrincipal),
}

impl Access {
    pub fn principal(&self) -> Option<&AuthenticatedPrincipal> {
        match self {
            Access::Public => None,
            Access::Granted(p) => Some(p),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Missing/malformed bearer token, or no live session behind it.
    /// The message never says which.
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: role not permitted on this route")]
    Forbidden,

    /// The path is registered, but not for this method (caller error).
    #[error("method not allowed for route {route}")]
    MethodNotAllowed { route: RouteKey, allowed: Vec<String> },

    /// The route has no registration in the policy table (wiring bug).
    #[error("no policy registered for route {0}")]
    UnknownRoute(RouteKey),
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts exactly `Bearer <token>`: case-sensitive scheme, a single space,
/// and a non-empty token containing no whitespace.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Per-request gate: route policy → bearer token → session → role.
///
/// - Policy lookup first, no I/O; public routes pass without looking at the header
/// - Single pass, no retries
/// - Store trouble on the lookup path reads as "unauthenticated", never as allow
#[derive(Debug, Clone)]
pub struct RequestAuthorizer {
    sessions: Arc<SessionManager>,
    policies: Arc<RoutePolicyTable>,
}

impl RequestAuthorizer {
    pub fn new(sessions: Arc<SessionManager>, policies: Arc<RoutePolicyTable>) -> Self {
        Self { sessions, policies }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn policies(&self) -> &Arc<RoutePolicyTable> {
        &self.policies
    }

    /// Authorize one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    pub async fn authorize(
        &self,
        route: &RouteKey,
        authorization: Option<&str>,
    ) -> Result<Access, AuthzError> {
        let allowed = match self.policies.resolve(route) {
            Some(RoutePolicy::Public) => return Ok(Access::Public),
            Some(RoutePolicy::Restricted(roles)) => roles,
            None => {
                let allowed = self.policies.methods_for(route.path());
                if allowed.is_empty() {
                    return Err(AuthzError::UnknownRoute(route.clone()));
                }
                return Err(AuthzError::MethodNotAllowed {
                    route: route.clone(),
                    allowed: allowed.to_vec(),
                });
            }
        };

        let Some(raw) = authorization.and_then(parse_bearer) else {
            debug!(%route, "missing or malformed bearer token");
            return Err(AuthzError::Unauthenticated);
        };
        let token = SessionToken::new(raw);

        let session = self.sessions.resolve(&token).await.map_err(|_| {
            debug!(%route, token = %token.fingerprint(), "bearer token did not resolve");
            AuthzError::Unauthenticated
        })?;

        if !allowed.contains(session.principal_role) {
            debug!(
                %route,
                principal_id = %session.principal_id,
                role = %session.principal_role,
                "role not permitted"
            );
            return Err(AuthzError::Forbidden);
        }

        Ok(Access::Granted(AuthenticatedPrincipal {
            principal_id: session.principal_id,
            role: session.principal_role,
            token,
        }))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use timetable_core::{PrincipalId, Role};

    use super::*;
    use crate::config::SessionConfig;
    use crate::in_memory_store::InMemorySessionStore;

    fn authorizer() -> (Arc<InMemorySessionStore>, RequestAuthorizer) {
        let store = Arc::new(InMemorySessionStore::new());
        let sessions =
            Arc::new(SessionManager::new(store.clone(), SessionConfig::default()).unwrap());
        let policies = RoutePolicyTable::builder()
            .group("courses", [Role::Teacher, Role::AcademicAdmin])
            .public(RouteKey::get("/health"))
            .in_group(RouteKey::get("/courses"), "courses")
            .build()
            .unwrap();
        (store, RequestAuthorizer::new(sessions, Arc::new(policies)))
    }

    async fn login(authz: &RequestAuthorizer, id: &str, role: Role) -> String {
        let record = authz
            .sessions()
            .issue(&PrincipalId::new(id).unwrap(), role)
            .await
            .unwrap();
        format!("Bearer {}", record.token.as_str())
    }

    #[tokio::test]
    async fn public_route_needs_no_header() {
        let (_, authz) = authorizer();
        assert_eq!(
            authz.authorize(&RouteKey::get("/health"), None).await,
            Ok(Access::Public)
        );
    }

    #[tokio::test]
    async fn public_route_ignores_garbage_headers() {
        let (_, authz) = authorizer();
        assert_eq!(
            authz
                .authorize(&RouteKey::get("/health"), Some("Bearer not-a-session"))
                .await,
            Ok(Access::Public)
        );
    }

    #[tokio::test]
    async fn admitted_role_is_granted_with_principal() {
        let (_, authz) = authorizer();
        let header = login(&authz, "t1", Role::Teacher).await;

        let access = authz
            .authorize(&RouteKey::get("/courses"), Some(&header))
            .await
            .unwrap();

        let principal = access.principal().unwrap();
        assert_eq!(principal.principal_id.as_str(), "t1");
        assert_eq!(principal.role, Role::Teacher);
        assert_eq!(format!("Bearer {}", principal.token.as_str()), header);
    }

    #[tokio::test]
    async fn other_role_is_forbidden() {
        let (_, authz) = authorizer();
        let header = login(&authz, "s1", Role::Student).await;

        assert_eq!(
            authz.authorize(&RouteKey::get("/courses"), Some(&header)).await,
            Err(AuthzError::Forbidden)
        );
    }

    #[tokio::test]
    async fn missing_or_wrong_scheme_is_unauthenticated_not_forbidden() {
        let (_, authz) = authorizer();
        let route = RouteKey::get("/courses");

        assert_eq!(authz.authorize(&route, None).await, Err(AuthzError::Unauthenticated));
        assert_eq!(
            authz.authorize(&route, Some("Token abc123")).await,
            Err(AuthzError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn unknown_and_revoked_tokens_look_the_same() {
        let (_, authz) = authorizer();
        let route = RouteKey::get("/courses");
        let header = login(&authz, "t1", Role::Teacher).await;
        let token = SessionToken::new(parse_bearer(&header).unwrap());
        authz.sessions().revoke(&token).await.unwrap();

        let revoked = authz.authorize(&route, Some(&header)).await;
        let unknown = authz.authorize(&route, Some("Bearer deadbeef")).await;
        assert_eq!(revoked, Err(AuthzError::Unauthenticated));
        assert_eq!(revoked, unknown);
    }

    #[tokio::test]
    async fn store_outage_never_fails_open() {
        let (store, authz) = authorizer();
        let header = login(&authz, "t1", Role::Teacher).await;
        store.set_available(false);

        assert_eq!(
            authz.authorize(&RouteKey::get("/courses"), Some(&header)).await,
            Err(AuthzError::Unauthenticated)
        );
        // Public routes do not touch the store at all.
        assert_eq!(
            authz.authorize(&RouteKey::get("/health"), None).await,
            Ok(Access::Public)
        );
    }

    #[tokio::test]
    async fn unregistered_route_is_reported() {
        let (_, authz) = authorizer();
        assert_eq!(
            authz.authorize(&RouteKey::get("/nowhere"), None).await,
            Err(AuthzError::UnknownRoute(RouteKey::get("/nowhere")))
        );
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_not_a_wiring_bug() {
        let (_, authz) = authorizer();
        let header = login(&authz, "t1", Role::Teacher).await;

        assert_eq!(
            authz.authorize(&RouteKey::post("/courses"), Some(&header)).await,
            Err(AuthzError::MethodNotAllowed {
                route: RouteKey::post("/courses"),
                allowed: vec!["GET".to_string()],
            })
        );
        assert!(matches!(
            authz.authorize(&RouteKey::delete("/health"), None).await,
            Err(AuthzError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn bearer_format_is_strict() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("bearer abc"), None);
        assert_eq!(parse_bearer("Bearer  abc"), None);
        assert_eq!(parse_bearer("Bearer abc "), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
    }

    proptest! {
        #[test]
        fn any_whitespace_free_token_round_trips(token in "[!-~]{1,128}") {
            let header = format!("Bearer {token}");
            prop_assert_eq!(parse_bearer(&header), Some(token.as_str()));
        }

        #[test]
        fn other_schemes_never_parse(scheme in "[A-Za-z]{1,10}", token in "[a-f0-9]{1,64}") {
            prop_assume!(scheme != "Bearer");
            let header = format!("{scheme} {token}");
            prop_assert_eq!(parse_bearer(&header), None);
        }
    }
}
