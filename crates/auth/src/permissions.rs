use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "assets.manage"). The wildcard `"*"`
/// grants everything and is handed to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const ASSETS_READ: Permission = Permission(Cow::Borrowed("assets.read"));
    pub const ASSETS_MANAGE: Permission = Permission(Cow::Borrowed("assets.manage"));
    pub const LIBRARY_READ: Permission = Permission(Cow::Borrowed("library.read"));
    pub const LIBRARY_MANAGE: Permission = Permission(Cow::Borrowed("library.manage"));
    pub const USERS_MANAGE: Permission = Permission(Cow::Borrowed("users.manage"));
    /// Delete resources (or bulk-remove units) while custody records are active.
    pub const CUSTODY_FORCE_DELETE: Permission = Permission(Cow::Borrowed("custody.force_delete"));
    pub const ACTIVITY_READ: Permission = Permission(Cow::Borrowed("activity.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission policy.
///
/// Unknown roles grant nothing.
pub fn permissions_for_role(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "admin" => vec![Permission::WILDCARD],
        "assets_manager" => vec![
            Permission::ASSETS_READ,
            Permission::ASSETS_MANAGE,
            Permission::LIBRARY_READ,
            Permission::ACTIVITY_READ,
        ],
        "librarian" => vec![
            Permission::LIBRARY_READ,
            Permission::LIBRARY_MANAGE,
            Permission::ASSETS_READ,
            Permission::ACTIVITY_READ,
        ],
        "general" => vec![Permission::ASSETS_READ, Permission::LIBRARY_READ],
        _ => Vec::new(),
    }
}
