//! `timetable-auth` — session authentication and route authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and from any concrete
//! storage backend: the session store is a trait, and the request gate takes
//! a route key plus the raw `Authorization` header value.

pub mod authorize;
pub mod config;
pub mod credentials;
pub mod in_memory_store;
pub mod policy;
pub mod principal;
pub mod session;
pub mod store;
pub mod token;

pub use authorize::{Access, AuthzError, RequestAuthorizer, parse_bearer};
pub use config::{ConfigError, SessionConfig};
pub use credentials::{CredentialError, CredentialVerifier, StaticCredentials};
pub use in_memory_store::InMemorySessionStore;
pub use policy::{PolicyError, RouteKey, RoutePolicy, RoutePolicyBuilder, RoutePolicyTable};
pub use principal::{AuthenticatedPrincipal, Principal};
pub use session::{SessionError, SessionManager, SessionNotFound, SessionRecord, SweepReport};
pub use store::{SessionStore, StoreError, StoreResult};
pub use token::SessionToken;

pub use timetable_core::{PrincipalId, Role, RoleSet};
