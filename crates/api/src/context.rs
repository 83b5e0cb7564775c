use timetable_auth::{AuthenticatedPrincipal, SessionToken};
use timetable_core::{PrincipalId, Role};

/// Principal context for a request (authenticated identity + role + the token used).
///
/// Inserted by the auth middleware on protected routes only; handlers on
/// public routes must not extract it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    role: Role,
    token: SessionToken,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, role: Role, token: SessionToken) -> Self {
        Self {
            principal_id,
            role,
            token,
        }
    }

    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }
}

impl From<AuthenticatedPrincipal> for PrincipalContext {
    fn from(value: AuthenticatedPrincipal) -> Self {
        Self::new(value.principal_id, value.role, value.token)
    }
}
