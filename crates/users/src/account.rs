//! Account lifecycle: registration, profile updates and the access rules
//! around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_auth::{Permission, Principal, Role};
use custodia_core::{DomainError, DomainResult, UserId};

use crate::user::{Level, Shift, TeacherProfile, User, non_blank, validate_password};

/// Open self-registration; new accounts always start as `general`.
#[derive(Clone, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub dni: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_teacher: bool,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub shift: Option<Shift>,
    #[serde(default)]
    pub level: Option<Level>,
}

impl core::fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterUser")
            .field("username", &self.username)
            .field("is_teacher", &self.is_teacher)
            .finish_non_exhaustive()
    }
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub dni: Option<String>,
    #[serde(default)]
    pub is_teacher: Option<bool>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub shift: Option<Shift>,
    #[serde(default)]
    pub level: Option<Level>,
    /// Admin-only.
    #[serde(default)]
    pub role: Option<String>,
}

impl UserPatch {
    fn touches_teacher_fields(&self) -> bool {
        self.grade.is_some() || self.section.is_some() || self.shift.is_some() || self.level.is_some()
    }
}

#[derive(Clone, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

impl core::fmt::Debug for ChangePassword {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChangePassword").finish_non_exhaustive()
    }
}

/// Build a new account from a registration request. The password must
/// already have been checked with [`validate_password`] and hashed.
pub fn new_user(
    cmd: RegisterUser,
    id: UserId,
    password_hash: String,
    at: DateTime<Utc>,
) -> DomainResult<User> {
    let teacher = cmd.is_teacher.then(|| TeacherProfile {
        grade: non_blank(cmd.grade),
        section: non_blank(cmd.section),
        shift: cmd.shift,
        level: cmd.level,
    });
    let user = User {
        id,
        username: cmd.username.trim().to_string(),
        email: non_blank(cmd.email),
        first_name: cmd.first_name.trim().to_string(),
        last_name: cmd.last_name.trim().to_string(),
        dni: non_blank(cmd.dni),
        phone: non_blank(cmd.phone),
        role: Role::GENERAL,
        teacher,
        password_hash,
        registered_at: at,
        updated_at: at,
    };
    user.validate()?;
    Ok(user)
}

/// Check the registration password before spending time on hashing.
pub fn check_registration(cmd: &RegisterUser) -> DomainResult<()> {
    validate_password(&cmd.password)?;
    crate::user::validate_username(cmd.username.trim())
}

/// Apply a profile patch on behalf of `actor`.
///
/// Users may edit themselves; editing others or changing a role requires
/// `users.manage`.
pub fn apply_patch(
    user: &mut User,
    patch: UserPatch,
    actor: &Principal,
    at: DateTime<Utc>,
) -> DomainResult<()> {
    ensure_self_or_manager(actor, user.id, "update this user")?;
    if patch.role.is_some() && !actor.can(&Permission::USERS_MANAGE) {
        return Err(DomainError::permission_denied(
            "only administrators can change roles",
        ));
    }

    let touches_teacher = patch.touches_teacher_fields();
    let mut next = user.clone();
    if let Some(v) = patch.first_name {
        next.first_name = v.trim().to_string();
    }
    if let Some(v) = patch.last_name {
        next.last_name = v.trim().to_string();
    }
    if patch.email.is_some() {
        next.email = non_blank(patch.email);
    }
    if patch.phone.is_some() {
        next.phone = non_blank(patch.phone);
    }
    if patch.dni.is_some() {
        next.dni = non_blank(patch.dni);
    }
    if let Some(role) = &patch.role {
        next.role = Role::parse(role)
            .ok_or_else(|| DomainError::validation(format!("unknown role '{role}'")))?;
    }

    match patch.is_teacher {
        Some(false) => next.teacher = None,
        Some(true) if next.teacher.is_none() => next.teacher = Some(TeacherProfile::default()),
        _ => {}
    }
    if touches_teacher {
        if let Some(profile) = next.teacher.as_mut() {
            if patch.grade.is_some() {
                profile.grade = non_blank(patch.grade);
            }
            if patch.section.is_some() {
                profile.section = non_blank(patch.section);
            }
            if patch.shift.is_some() {
                profile.shift = patch.shift;
            }
            if patch.level.is_some() {
                profile.level = patch.level;
            }
        }
    }

    next.validate()?;
    next.updated_at = at;
    *user = next;
    Ok(())
}

pub fn ensure_self_or_manager(actor: &Principal, target: UserId, action: &str) -> DomainResult<()> {
    if actor.principal_id == target || actor.can(&Permission::USERS_MANAGE) {
        Ok(())
    } else {
        Err(DomainError::permission_denied(format!(
            "you are not allowed to {action}"
        )))
    }
}

pub fn ensure_manager(actor: &Principal, action: &str) -> DomainResult<()> {
    if actor.can(&Permission::USERS_MANAGE) {
        Ok(())
    } else {
        Err(DomainError::permission_denied(format!(
            "only administrators can {action}"
        )))
    }
}

/// Administrators may delete anyone but themselves.
pub fn ensure_can_delete(actor: &Principal, target: UserId) -> DomainResult<()> {
    ensure_manager(actor, "delete users")?;
    if actor.principal_id == target {
        return Err(DomainError::validation("you cannot delete your own account"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterUser {
        RegisterUser {
            username: " jperez ".to_string(),
            password: "clave-segura".to_string(),
            email: Some(String::new()),
            first_name: "Juan".to_string(),
            last_name: "Pérez".to_string(),
            dni: Some("12345678".to_string()),
            phone: None,
            is_teacher: false,
            grade: Some("5".to_string()),
            section: Some("B".to_string()),
            shift: Some(Shift::Morning),
            level: Some(Level::Primary),
        }
    }

    fn registered() -> User {
        new_user(registration(), UserId::new(), "hash".to_string(), Utc::now()).unwrap()
    }

    #[test]
    fn registration_defaults_and_drops_teacher_fields() {
        let user = registered();
        assert_eq!(user.username, "jperez");
        assert_eq!(user.role, Role::GENERAL);
        assert_eq!(user.email, None);
        assert!(user.teacher.is_none());

        let mut cmd = registration();
        cmd.is_teacher = true;
        let teacher = new_user(cmd, UserId::new(), "hash".into(), Utc::now()).unwrap();
        assert_eq!(teacher.teacher.unwrap().level, Some(Level::Primary));
    }

    #[test]
    fn blank_password_is_rejected() {
        let mut cmd = registration();
        cmd.password = "   ".to_string();
        assert!(matches!(check_registration(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn users_edit_themselves_but_not_their_role() {
        let mut user = registered();
        let me = Principal::from_roles(user.id, vec![Role::GENERAL]);

        let patch = UserPatch {
            phone: Some("987654321".to_string()),
            ..UserPatch::default()
        };
        apply_patch(&mut user, patch, &me, Utc::now()).unwrap();
        assert_eq!(user.phone.as_deref(), Some("987654321"));

        let patch = UserPatch {
            role: Some("admin".to_string()),
            ..UserPatch::default()
        };
        let err = apply_patch(&mut user, patch, &me, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied(_)));
        assert_eq!(user.role, Role::GENERAL);
    }

    #[test]
    fn admin_changes_roles_and_teacher_profile() {
        let mut user = registered();
        let admin = Principal::from_roles(UserId::new(), vec![Role::ADMIN]);

        let patch = UserPatch {
            role: Some("Librarian".to_string()),
            is_teacher: Some(true),
            shift: Some(Shift::Afternoon),
            ..UserPatch::default()
        };
        apply_patch(&mut user, patch, &admin, Utc::now()).unwrap();
        assert_eq!(user.role, Role::LIBRARIAN);
        assert_eq!(user.teacher.as_ref().unwrap().shift, Some(Shift::Afternoon));

        let bad = UserPatch {
            role: Some("janitor".to_string()),
            ..UserPatch::default()
        };
        assert!(matches!(
            apply_patch(&mut user, bad, &admin, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn strangers_cannot_edit_and_admins_cannot_delete_themselves() {
        let mut user = registered();
        let other = Principal::from_roles(UserId::new(), vec![Role::LIBRARIAN]);
        assert!(apply_patch(&mut user, UserPatch::default(), &other, Utc::now()).is_err());

        let admin = Principal::from_roles(UserId::new(), vec![Role::ADMIN]);
        assert!(ensure_can_delete(&admin, user.id).is_ok());
        assert!(ensure_can_delete(&admin, admin.principal_id).is_err());
        assert!(ensure_can_delete(&other, user.id).is_err());
    }
}
