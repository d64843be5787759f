use tokopos_auth::{PrincipalId, Role};
use tokopos_core::UserId;

/// Principal context for a request (authenticated identity + roles).
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self {
            principal_id,
            roles,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// The principal as a domain-level actor identity, recorded on events
    /// (e.g. `performed_by`).
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(*self.principal_id.as_uuid())
    }

    /// Admins see everything; other principals get listings scoped to
    /// their own records.
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| *r == Role::admin())
    }
}
