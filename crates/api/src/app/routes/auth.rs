//! Session lifecycle endpoints: login, logout, refresh and the caller's own
//! session list.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use timetable_auth::{RouteKey, RoutePolicyBuilder};

use crate::app::dto::{LoginRequest, LoginResponse, RefreshResponse, SessionList, SessionView};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

use super::SESSION_GROUP;

pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
        .route("/auth/refresh", post(refresh))
        .route("/auth/sessions", get(sessions))
}

pub fn declare(builder: RoutePolicyBuilder) -> RoutePolicyBuilder {
    builder
        .public(RouteKey::post("/auth/login"))
        .in_group(RouteKey::post("/auth/logout"), SESSION_GROUP)
        .in_group(RouteKey::post("/auth/logout-all"), SESSION_GROUP)
        .in_group(RouteKey::post("/auth/refresh"), SESSION_GROUP)
        .in_group(RouteKey::get("/auth/sessions"), SESSION_GROUP)
}

/// POST /auth/login - verify credentials and issue a session token
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };

    let principal = match services
        .credentials
        .verify(&body.username, &body.password)
        .await
    {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            tracing::info!(username = %body.username, "login rejected");
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "invalid username or password",
            );
        }
        Err(err) => {
            tracing::warn!(error = %err, "credential check failed");
            return errors::json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "credential backend unavailable, retry later",
            );
        }
    };

    if body.single_session == Some(true) {
        if let Err(err) = services
            .sessions
            .revoke_all(&principal.principal_id, principal.role)
            .await
        {
            return errors::session_error_to_response(err);
        }
    }

    match services
        .sessions
        .issue(&principal.principal_id, principal.role)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(LoginResponse::from(record))).into_response(),
        Err(err) => errors::session_error_to_response(err),
    }
}

/// POST /auth/logout - revoke the presented token
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.sessions.revoke(principal.token()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => errors::session_error_to_response(err),
    }
}

/// POST /auth/logout-all - revoke every session of the caller (all devices)
pub async fn logout_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services
        .sessions
        .revoke_all(principal.principal_id(), principal.role())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => errors::session_error_to_response(err),
    }
}

/// POST /auth/refresh - extend the presented session
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.sessions.refresh(principal.token()).await {
        Ok(expires_at) => Json(RefreshResponse { expires_at }).into_response(),
        Err(err) => errors::session_error_to_response(err),
    }
}

/// GET /auth/sessions - the caller's live sessions, oldest first
pub async fn sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services
        .sessions
        .list_sessions(principal.principal_id(), principal.role())
        .await
    {
        Ok(records) => Json(SessionList {
            principal_id: principal.principal_id().to_string(),
            role: principal.role().to_string(),
            sessions: records
                .iter()
                .map(|r| SessionView::new(r, Some(principal.token())))
                .collect(),
        })
        .into_response(),
        Err(err) => errors::session_error_to_response(err),
    }
}
