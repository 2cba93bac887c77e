//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before the service
//! runs), while keeping the custody engine and infra auth-agnostic.

use custodia_auth::{AuthzError, CommandAuthorization, authorize};

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** handing the command to a service.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = principal.principal();
    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}
