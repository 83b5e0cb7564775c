use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::get};

use timetable_auth::{RouteKey, RoutePolicyBuilder, RoleSet};

use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/whoami", get(whoami))
}

pub fn declare(builder: RoutePolicyBuilder) -> RoutePolicyBuilder {
    builder
        .public(RouteKey::get("/health"))
        .with_roles(RouteKey::get("/whoami"), None, RoleSet::all())
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "principal_id": principal.principal_id().to_string(),
        "role": principal.role().as_str(),
        "token_fingerprint": principal.token().fingerprint(),
    }))
}
