use axum::{
    extract::{MatchedPath, State},
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use timetable_auth::{Access, AuthzError, RequestAuthorizer, RouteKey};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AuthState {
    pub authorizer: RequestAuthorizer,
}

/// Authorization gate for every matched route.
///
/// Installed with `Router::route_layer`, so the matched path template is
/// always available and unmatched paths fall through to the 404 fallback.
/// A known path called with an undeclared method answers 405 with `Allow`.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let route = route_key(&req);

    // A non-UTF-8 header can never be a well-formed bearer token.
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    match state.authorizer.authorize(&route, authorization).await {
        Ok(Access::Public) => next.run(req).await,
        Ok(Access::Granted(principal)) => {
            req.extensions_mut().insert(PrincipalContext::from(principal));
            next.run(req).await
        }
        Err(AuthzError::Unauthenticated) => {
            let mut res = json_error(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "missing, malformed, expired or revoked session token",
            );
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            res
        }
        Err(AuthzError::Forbidden) => json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "role not permitted on this route",
        ),
        Err(AuthzError::MethodNotAllowed { allowed, .. }) => {
            let mut res = json_error(
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                "method not allowed on this route",
            );
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                res.headers_mut().insert(header::ALLOW, value);
            }
            res
        }
        Err(AuthzError::UnknownRoute(key)) => {
            tracing::error!(route = %key, "route has no authorization policy");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "route_policy_missing",
                "route has no authorization policy",
            )
        }
    }
}

fn route_key<B>(req: &Request<B>) -> RouteKey {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    // axum answers HEAD with the GET handler, so it shares the GET policy.
    let method = if req.method() == Method::HEAD {
        &Method::GET
    } else {
        req.method()
    };
    RouteKey::new(method.as_str(), path)
}

/// Per-request span carrying a fresh request id, echoed back as `x-request-id`.
pub async fn trace_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = Uuid::now_v7();
    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let mut res = next.run(req).await;
        tracing::info!(status = res.status().as_u16(), "request completed");
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            res.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        res
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_key_falls_back_to_the_raw_path() {
        let req = Request::builder()
            .method(Method::DELETE)
            .uri("/admin/sessions/TEACHER/t-1?x=1")
            .body(())
            .unwrap();
        assert_eq!(route_key(&req), RouteKey::delete("/admin/sessions/TEACHER/t-1"));
    }

    #[test]
    fn head_requests_use_the_get_policy() {
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/health")
            .body(())
            .unwrap();
        assert_eq!(route_key(&req), RouteKey::get("/health"));
    }
}
