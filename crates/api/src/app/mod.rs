//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: session store, session manager and credential wiring
//! - `routes/`: HTTP routes + handlers and their authorization declarations
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, http::StatusCode, response::Response};
use tower::ServiceBuilder;

use timetable_auth::{PolicyError, RequestAuthorizer};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
///
/// Fails if the route policy declarations are inconsistent.
pub fn build_app(services: Arc<AppServices>) -> Result<Router, PolicyError> {
    let policies = Arc::new(routes::policies()?);
    let auth_state = middleware::AuthState {
        authorizer: RequestAuthorizer::new(services.sessions.clone(), policies),
    };

    Ok(routes::router()
        .layer(Extension(services))
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(
            middleware::trace_middleware,
        ))))
}

async fn not_found() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "no such route")
}
