//! Admin routes for session management.
//!
//! Lets an academic administrator inspect and force-terminate the sessions of
//! any principal (e.g. after a password reset or a lost device).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use timetable_auth::{PrincipalId, Role, RouteKey, RoutePolicyBuilder};

use crate::app::dto::{SessionList, SessionView};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

use super::ADMIN_GROUP;

const SESSIONS_PATH: &str = "/admin/sessions/:role/:principal_id";

pub fn router() -> Router {
    Router::new().route(SESSIONS_PATH, get(list_sessions).delete(revoke_sessions))
}

pub fn declare(builder: RoutePolicyBuilder) -> RoutePolicyBuilder {
    builder
        .in_group(RouteKey::get(SESSIONS_PATH), ADMIN_GROUP)
        .in_group(RouteKey::delete(SESSIONS_PATH), ADMIN_GROUP)
}

fn parse_target(role: &str, principal_id: &str) -> Result<(Role, PrincipalId), Response> {
    let role = role
        .parse::<Role>()
        .map_err(|e| errors::bad_request(e.to_string()))?;
    let principal_id = principal_id
        .parse::<PrincipalId>()
        .map_err(|e| errors::bad_request(e.to_string()))?;
    Ok((role, principal_id))
}

/// GET /admin/sessions/:role/:principal_id - live sessions of any principal
pub async fn list_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<PrincipalContext>,
    Path((role, principal_id)): Path<(String, String)>,
) -> Response {
    let (role, principal_id) = match parse_target(&role, &principal_id) {
        Ok(target) => target,
        Err(res) => return res,
    };

    match services.sessions.list_sessions(&principal_id, role).await {
        Ok(records) => Json(SessionList {
            principal_id: principal_id.to_string(),
            role: role.to_string(),
            sessions: records
                .iter()
                .map(|r| SessionView::new(r, Some(admin.token())))
                .collect(),
        })
        .into_response(),
        Err(err) => errors::session_error_to_response(err),
    }
}

/// DELETE /admin/sessions/:role/:principal_id - revoke all sessions of a principal
pub async fn revoke_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<PrincipalContext>,
    Path((role, principal_id)): Path<(String, String)>,
) -> Response {
    let (role, principal_id) = match parse_target(&role, &principal_id) {
        Ok(target) => target,
        Err(res) => return res,
    };

    match services.sessions.revoke_all(&principal_id, role).await {
        Ok(()) => {
            tracing::info!(
                admin = %admin.principal_id(),
                target = %principal_id,
                role = %role,
                "sessions revoked by administrator"
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => errors::session_error_to_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_targets_are_rejected() {
        assert!(parse_target("TEACHER", "t-1").is_ok());
        assert_eq!(
            parse_target("teacher", "t-1").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            parse_target("TEACHER", "t 1").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
