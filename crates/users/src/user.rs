use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_auth::Role;
use custodia_core::{DomainError, DomainResult, Entity, UserId};

const USERNAME_MAX: usize = 150;
const NAME_MAX: usize = 100;
const PHONE_MAX: usize = 15;
const DNI_LEN: usize = 8;
const PROFILE_FIELD_MAX: usize = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Afternoon,
}

impl FromStr for Shift {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(Shift::Morning),
            "afternoon" => Ok(Shift::Afternoon),
            other => Err(DomainError::validation(format!(
                "invalid shift '{other}': must be one of morning, afternoon"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Initial,
    Primary,
    Secondary,
}

impl FromStr for Level {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initial" => Ok(Level::Initial),
            "primary" => Ok(Level::Primary),
            "secondary" => Ok(Level::Secondary),
            other => Err(DomainError::validation(format!(
                "invalid level '{other}': must be one of initial, primary, secondary"
            ))),
        }
    }
}

/// Teaching assignment; present only for teachers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherProfile {
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub shift: Option<Shift>,
    #[serde(default)]
    pub level: Option<Level>,
}

/// A person who can log in and hold resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// National identity number, exactly eight digits.
    pub dni: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub teacher: Option<TeacherProfile>,
    /// Argon2 PHC string; never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_teacher(&self) -> bool {
        self.teacher.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::ADMIN
    }

    pub fn can_manage_assets(&self) -> bool {
        self.role == Role::ADMIN || self.role == Role::ASSETS_MANAGER
    }

    pub fn can_manage_library(&self) -> bool {
        self.role == Role::ADMIN || self.role == Role::LIBRARIAN
    }

    /// Check every field rule; uniqueness is the store's job.
    pub fn validate(&self) -> DomainResult<()> {
        validate_username(&self.username)?;
        required("first name", &self.first_name, NAME_MAX)?;
        required("last name", &self.last_name, NAME_MAX)?;
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(dni) = &self.dni {
            validate_dni(dni)?;
        }
        if let Some(phone) = &self.phone {
            if phone.chars().count() > PHONE_MAX {
                return Err(DomainError::validation(format!(
                    "phone cannot exceed {PHONE_MAX} characters"
                )));
            }
        }
        if let Some(profile) = &self.teacher {
            for (field, value) in [("grade", &profile.grade), ("section", &profile.section)] {
                if value.as_ref().is_some_and(|v| v.chars().count() > PROFILE_FIELD_MAX) {
                    return Err(DomainError::validation(format!(
                        "{field} cannot exceed {PROFILE_FIELD_MAX} characters"
                    )));
                }
            }
        }
        if Role::parse(self.role.as_str()).is_none() {
            return Err(DomainError::validation(format!("unknown role '{}'", self.role)));
        }
        Ok(())
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn required(field: &str, value: &str, max: usize) -> DomainResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(())
}

/// Letters, digits and `@ . + - _`, like most login systems.
pub fn validate_username(username: &str) -> DomainResult<()> {
    required("username", username, USERNAME_MAX)?;
    let ok = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !ok {
        return Err(DomainError::validation(
            "username may only contain letters, digits and @ . + - _",
        ));
    }
    Ok(())
}

pub fn validate_dni(dni: &str) -> DomainResult<()> {
    if dni.len() != DNI_LEN || !dni.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation("DNI must be exactly 8 digits"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> DomainResult<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(DomainError::validation(format!("invalid email '{email}'")));
    }
    Ok(())
}

/// Passwords must be present and not only whitespace.
pub fn validate_password(password: &str) -> DomainResult<()> {
    if password.trim().is_empty() {
        return Err(DomainError::validation("password is required and cannot be blank"));
    }
    Ok(())
}

/// Blank optional strings are stored as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
