use std::collections::BTreeSet;

use serde::Serialize;

use custodia_core::UserId;

use crate::{Permission, Role, permissions_for_role};

/// A fully resolved principal for authorization decisions.
///
/// Built from verified token claims; the permission set is derived from the
/// roles through the static policy, plus any explicit grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub principal_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_roles(principal_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = roles.iter().flat_map(permissions_for_role).collect();
        Self {
            principal_id,
            roles,
            permissions,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::ADMIN)
    }

    /// True when the principal holds `permission` directly or through `*`.
    pub fn can(&self, permission: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == permission)
    }

    /// Sorted, de-duplicated permission names (for `whoami` style output).
    pub fn effective_permissions(&self) -> Vec<String> {
        self.permissions
            .iter()
            .map(|p| p.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_resolve_to_permissions() {
        let p = Principal::from_roles(UserId::new(), vec![Role::LIBRARIAN, Role::GENERAL]);
        assert!(p.can(&Permission::LIBRARY_MANAGE));
        assert!(!p.can(&Permission::USERS_MANAGE));
        assert_eq!(
            p.effective_permissions(),
            vec!["activity.read", "assets.read", "library.manage", "library.read"]
        );
    }

    #[test]
    fn wildcard_allows_everything() {
        let p = Principal::from_roles(UserId::new(), vec![Role::ADMIN]);
        assert!(p.is_admin());
        assert!(p.can(&Permission::CUSTODY_FORCE_DELETE));
    }
}
