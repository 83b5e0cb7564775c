use serde::{Deserialize, Serialize};

use timetable_core::{PrincipalId, Role};

use crate::SessionToken;

/// The authenticated actor: who, and in which single role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub role: Role,
}

impl Principal {
    pub fn new(principal_id: PrincipalId, role: Role) -> Self {
        Self { principal_id, role }
    }
}

/// A principal that passed the request gate, together with the token it used.
///
/// This is what downstream handlers see in request-scoped context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub token: SessionToken,
}
