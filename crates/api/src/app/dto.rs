use chrono::NaiveDate;
use serde::Deserialize;

use custodia_core::{ResourceId, UserId};
use custodia_custody::{Condition, CustodyKind, CustodyState, ResourceStatus};

// -------------------------
// Auth
// -------------------------

#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

// -------------------------
// Resources
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest<D> {
    pub code: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    pub details: D,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest<P> {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(flatten)]
    pub patch: P,
}

/// Common list filters; kind-specific ones are read from the same query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    #[serde(default)]
    pub available_only: bool,
    #[serde(default)]
    pub holder_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub holder_id: UserId,
    #[serde(default)]
    pub quantity: Option<i64>,
    /// `loan` or `assignment`; parsed by the handler.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnByHolderRequest {
    pub holder_id: UserId,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnRecordRequest {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to_holder_id: UserId,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddUnitsRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveUnitsRequest {
    pub units: i64,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConditionRequest {
    pub condition: Condition,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub holder_id: Option<UserId>,
    #[serde(default)]
    pub state: Option<CustodyState>,
    #[serde(default)]
    pub kind: Option<CustodyKind>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverdueQuery {
    /// Defaults to today (UTC).
    #[serde(default)]
    pub on: Option<NaiveDate>,
}

// -------------------------
// Users
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub role: Option<String>,
}
