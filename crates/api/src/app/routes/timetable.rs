//! Timetable endpoints. Scheduling itself lives elsewhere; these handlers
//! only occupy the routes so their access rules are enforced and testable.

use axum::{Router, http::StatusCode, response::Response, routing::get};

use timetable_auth::{RouteKey, RoutePolicyBuilder, RoleSet};

use crate::app::errors;

use super::TIMETABLE_GROUP;

pub fn router() -> Router {
    Router::new()
        .route("/timetable/overview", get(not_implemented))
        .route("/timetable/conflicts", get(not_implemented))
}

pub fn declare(builder: RoutePolicyBuilder) -> RoutePolicyBuilder {
    builder
        // Students may see the overview even though the group is staff-only.
        .with_roles(
            RouteKey::get("/timetable/overview"),
            Some(TIMETABLE_GROUP),
            RoleSet::all(),
        )
        .in_group(RouteKey::get("/timetable/conflicts"), TIMETABLE_GROUP)
}

async fn not_implemented() -> Response {
    errors::json_error(
        StatusCode::NOT_IMPLEMENTED,
        "not_implemented",
        "timetable data is not served by this service",
    )
}
