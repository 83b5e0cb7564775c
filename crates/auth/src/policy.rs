//! Static route → allowed-roles table.
//!
//! Routes and route groups declare their permitted roles once, at startup.
//! Resolution order for a route:
//!
//! 1. route-level roles, if declared (they **replace** the group's roles; no merge);
//! 2. otherwise the group's roles, if the route belongs to a group that declares any;
//! 3. otherwise the route is public.
//!
//! The table is resolved eagerly at `build()`, so lookups are a single map
//! access with no I/O.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use timetable_core::{Role, RoleSet};

/// Identifies a route: HTTP method plus the path *template* it was registered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    method: String,
    path: String,
}

impl RouteKey {
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.into(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl core::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Effective policy of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePolicy {
    /// No token required.
    Public,
    /// A live session whose role is in the set.
    Restricted(RoleSet),
}

impl RoutePolicy {
    pub fn is_public(&self) -> bool {
        matches!(self, RoutePolicy::Public)
    }

    /// Flat membership; public routes admit everyone.
    pub fn admits(&self, role: Role) -> bool {
        match self {
            RoutePolicy::Public => true,
            RoutePolicy::Restricted(roles) => roles.contains(role),
        }
    }
}

/// Inconsistent route declarations, reported by [`RoutePolicyBuilder::build`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("route registered twice: {0}")]
    DuplicateRoute(RouteKey),

    #[error("route {route} references undeclared group '{group}'")]
    UnknownGroup { route: RouteKey, group: String },

    #[error("group declared twice: '{0}'")]
    DuplicateGroup(String),

    /// A declared role list must name at least one role; omit it for a public route.
    #[error("empty role list declared for {0}")]
    EmptyRoleSet(String),
}

#[derive(Debug, Clone)]
struct RouteDeclaration {
    key: RouteKey,
    group: Option<String>,
    roles: Option<RoleSet>,
}

/// Collects group and route declarations; validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct RoutePolicyBuilder {
    groups: Vec<(String, RoleSet)>,
    routes: Vec<RouteDeclaration>,
}

impl RoutePolicyBuilder {
    /// Declare a route group whose routes default to `roles`.
    pub fn group(mut self, name: impl Into<String>, roles: impl Into<RoleSet>) -> Self {
        self.groups.push((name.into(), roles.into()));
        self
    }

    /// Register a route with no declared roles outside any group (public).
    pub fn public(self, key: RouteKey) -> Self {
        self.route(key, None, None)
    }

    /// Register a route that inherits its group's roles.
    pub fn in_group(self, key: RouteKey, group: &str) -> Self {
        self.route(key, Some(group), None)
    }

    /// Register a route with its own roles (authoritative over any group roles).
    pub fn with_roles(self, key: RouteKey, group: Option<&str>, roles: impl Into<RoleSet>) -> Self {
        self.route(key, group, Some(roles.into()))
    }

    /// General registration.
    pub fn route(mut self, key: RouteKey, group: Option<&str>, roles: Option<RoleSet>) -> Self {
        self.routes.push(RouteDeclaration {
            key,
            group: group.map(str::to_string),
            roles,
        });
        self
    }

    pub fn build(self) -> Result<RoutePolicyTable, PolicyError> {
        let mut groups: HashMap<String, RoleSet> = HashMap::with_capacity(self.groups.len());
        for (name, roles) in self.groups {
            if roles.is_empty() {
                return Err(PolicyError::EmptyRoleSet(format!("group '{name}'")));
            }
            if groups.insert(name.clone(), roles).is_some() {
                return Err(PolicyError::DuplicateGroup(name));
            }
        }

        let mut seen: HashSet<RouteKey> = HashSet::with_capacity(self.routes.len());
        let mut routes: HashMap<RouteKey, RoutePolicy> = HashMap::with_capacity(self.routes.len());

        for decl in self.routes {
            if !seen.insert(decl.key.clone()) {
                return Err(PolicyError::DuplicateRoute(decl.key));
            }

            let group_roles = match &decl.group {
                None => None,
                Some(name) => match groups.get(name) {
                    Some(roles) => Some(roles.clone()),
                    None => {
                        return Err(PolicyError::UnknownGroup {
                            route: decl.key,
                            group: name.clone(),
                        });
                    }
                },
            };

            let policy = match (decl.roles, group_roles) {
                (Some(roles), _) if roles.is_empty() => {
                    return Err(PolicyError::EmptyRoleSet(format!("route {}", decl.key)));
                }
                (Some(roles), _) => RoutePolicy::Restricted(roles),
                (None, Some(roles)) => RoutePolicy::Restricted(roles),
                (None, None) => RoutePolicy::Public,
            };

            routes.insert(decl.key, policy);
        }

        let mut methods: HashMap<String, Vec<String>> = HashMap::new();
        for key in routes.keys() {
            methods
                .entry(key.path().to_string())
                .or_default()
                .push(key.method().to_string());
        }
        for list in methods.values_mut() {
            list.sort();
        }

        Ok(RoutePolicyTable { routes, methods })
    }
}

/// Resolved, immutable route policy table.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicyTable {
    routes: HashMap<RouteKey, RoutePolicy>,
    /// path template → registered methods, sorted
    methods: HashMap<String, Vec<String>>,
}

impl RoutePolicyTable {
    pub fn builder() -> RoutePolicyBuilder {
        RoutePolicyBuilder::default()
    }

    /// Effective policy of a registered route; `None` if it was never registered.
    pub fn resolve(&self, route: &RouteKey) -> Option<&RoutePolicy> {
        self.routes.get(route)
    }

    /// Methods registered for a path template (empty if the path is unknown).
    pub fn methods_for(&self, path: &str) -> &[String] {
        self.methods.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All registered routes, sorted (for startup logging and audits).
    pub fn routes(&self) -> Vec<(&RouteKey, &RoutePolicy)> {
        let mut all: Vec<_> = self.routes.iter().collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RoutePolicyTable {
        RoutePolicyTable::builder()
            .group("timetable", [Role::Teacher, Role::AcademicAdmin])
            .public(RouteKey::get("/health"))
            .in_group(RouteKey::get("/timetable/conflicts"), "timetable")
            .with_roles(
                RouteKey::get("/timetable/overview"),
                Some("timetable"),
                [Role::Student],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn route_without_any_declaration_is_public() {
        let t = table();
        assert_eq!(t.resolve(&RouteKey::get("/health")), Some(&RoutePolicy::Public));
    }

    #[test]
    fn group_roles_apply_when_route_declares_none() {
        let t = table();
        let policy = t.resolve(&RouteKey::get("/timetable/conflicts")).unwrap();
        assert!(policy.admits(Role::Teacher));
        assert!(policy.admits(Role::AcademicAdmin));
        assert!(!policy.admits(Role::Student));
    }

    #[test]
    fn route_roles_replace_group_roles_without_merging() {
        let t = table();
        let policy = t.resolve(&RouteKey::get("/timetable/overview")).unwrap();
        assert_eq!(policy, &RoutePolicy::Restricted(RoleSet::from([Role::Student])));
        assert!(!policy.admits(Role::Teacher));
    }

    #[test]
    fn method_is_part_of_the_route_identity() {
        let t = table();
        assert_eq!(t.resolve(&RouteKey::post("/health")), None);
        assert!(t.resolve(&RouteKey::new("get", "/health")).is_some());
    }

    #[test]
    fn methods_are_indexed_by_path() {
        let t = RoutePolicyTable::builder()
            .public(RouteKey::post("/sessions"))
            .public(RouteKey::delete("/sessions"))
            .public(RouteKey::get("/sessions"))
            .build()
            .unwrap();
        assert_eq!(t.methods_for("/sessions"), ["DELETE", "GET", "POST"]);
        assert!(t.methods_for("/nowhere").is_empty());
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let err = RoutePolicyTable::builder()
            .public(RouteKey::get("/a"))
            .public(RouteKey::get("/a"))
            .build()
            .unwrap_err();
        assert_eq!(err, PolicyError::DuplicateRoute(RouteKey::get("/a")));
    }

    #[test]
    fn undeclared_group_is_rejected() {
        let err = RoutePolicyTable::builder()
            .in_group(RouteKey::get("/a"), "missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnknownGroup { .. }));
    }

    #[test]
    fn empty_role_lists_are_rejected() {
        let err = RoutePolicyTable::builder()
            .with_roles(RouteKey::get("/a"), None, RoleSet::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::EmptyRoleSet(_)));

        let err = RoutePolicyTable::builder()
            .group("g", RoleSet::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::EmptyRoleSet(_)));
    }

    #[test]
    fn routes_are_listed_in_order() {
        let t = table();
        let listed: Vec<String> = t.routes().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(
            listed,
            vec![
                "GET /health",
                "GET /timetable/conflicts",
                "GET /timetable/overview",
            ]
        );
    }
}
