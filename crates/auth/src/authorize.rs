use thiserror::Error;

use custodia_core::DomainError;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(perm) => {
                DomainError::permission_denied(format!("missing permission '{perm}'"))
            }
        }
    }
}

/// Command-side authorization contract (checked at the command boundary).
///
/// The API layer checks these requirements before handing a command to a
/// service.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal for a single permission.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.can(required) {
        Ok(())
    } else {
        tracing::debug!(
            principal_id = %principal.principal_id,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use custodia_core::UserId;

    #[test]
    fn general_user_cannot_manage_assets() {
        let p = Principal::from_roles(UserId::new(), vec![Role::GENERAL]);
        let err = authorize(&p, &Permission::ASSETS_MANAGE).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("assets.manage".to_string()));
        assert!(authorize(&p, &Permission::ASSETS_READ).is_ok());
    }

    #[test]
    fn forbidden_maps_to_permission_denied() {
        let err: DomainError = AuthzError::Forbidden("users.manage".into()).into();
        assert!(matches!(err, DomainError::PermissionDenied(_)));
    }
}
