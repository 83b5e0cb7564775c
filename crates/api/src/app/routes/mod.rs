use axum::Router;

use timetable_auth::{PolicyError, Role, RoleSet, RoutePolicyTable};

pub mod admin;
pub mod auth;
pub mod system;
pub mod timetable;

/// Any signed-in principal.
pub const SESSION_GROUP: &str = "session";
/// Academic administration.
pub const ADMIN_GROUP: &str = "admin";
/// Timetable views for staff.
pub const TIMETABLE_GROUP: &str = "timetable";

/// Every endpoint the service exposes. Each one must also be declared in
/// [`policies`]; an undeclared route answers 500.
pub fn router() -> Router {
    Router::new()
        .merge(system::router())
        .merge(auth::router())
        .merge(admin::router())
        .merge(timetable::router())
}

/// Authorization table for [`router`].
pub fn policies() -> Result<RoutePolicyTable, PolicyError> {
    let builder = RoutePolicyTable::builder()
        .group(SESSION_GROUP, RoleSet::all())
        .group(ADMIN_GROUP, [Role::AcademicAdmin])
        .group(TIMETABLE_GROUP, [Role::Teacher, Role::AcademicAdmin]);

    let builder = system::declare(builder);
    let builder = auth::declare(builder);
    let builder = admin::declare(builder);
    let builder = timetable::declare(builder);
    builder.build()
}
