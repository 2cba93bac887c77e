use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles travel as opaque strings inside tokens; the school recognises four of
/// them, exposed as constants. Mapping roles to permissions is done by
/// [`crate::permissions_for_role`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Full access, including user administration and forced deletions.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    /// Responsible for the asset inventory.
    pub const ASSETS_MANAGER: Role = Role(Cow::Borrowed("assets_manager"));
    /// Responsible for the library.
    pub const LIBRARIAN: Role = Role(Cow::Borrowed("librarian"));
    /// Everyone else: staff, teachers.
    pub const GENERAL: Role = Role(Cow::Borrowed("general"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The roles the school recognises.
    pub fn known() -> [Role; 4] {
        [Self::ADMIN, Self::ASSETS_MANAGER, Self::LIBRARIAN, Self::GENERAL]
    }

    /// Parse a role name, accepting only the recognised roles
    /// (case-insensitive).
    pub fn parse(name: &str) -> Option<Role> {
        let name = name.trim().to_ascii_lowercase();
        Self::known().into_iter().find(|r| r.as_str() == name)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::GENERAL
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
