//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic.

use tokopos_auth::{authorize, AccessGrant, AuthzError, Permission, Principal, Role};

use crate::context::PrincipalContext;

/// Check that the request principal holds a permission.
///
/// This is intended to be called **before** dispatching a command.
pub fn require(principal: &PrincipalContext, required: &Permission) -> Result<(), AuthzError> {
    let principal = Principal {
        principal_id: principal.principal_id(),
        grant: AccessGrant {
            roles: principal.roles().to_vec(),
            permissions: permissions_from_roles(principal.roles()),
        },
    };

    authorize(&principal, required)
}

/// Built-in role→permission policy.
///
/// The POS ships two roles: `admin` (everything) and `cashier` (the hand-off
/// endpoints a till operator needs). Anything else gets no command access.
fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut permissions = Vec::new();

    for role in roles {
        match role.as_str() {
            "admin" => return vec![Permission::new("*")],
            "cashier" => {
                permissions.push(Permission::new("distribution.advance"));
                permissions.push(Permission::new("catalog.adjust.return"));
            }
            _ => {}
        }
    }

    permissions
}
