//! Commands accepted by the engine.
//!
//! Every command carries the acting user and the business timestamp; nothing
//! in the engine reads the clock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{CustodyId, Quantity, ResourceId, UserId};

use crate::kind::{CustodyKind, ResourceKind};
use crate::resource::ResourceStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RegisterResource<K: ResourceKind> {
    pub resource_id: ResourceId,
    pub code: String,
    /// Defaults to one unit. Zero is allowed (registered before stock arrives).
    pub quantity: Option<u32>,
    pub details: K::Details,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct UpdateResource<K: ResourceKind> {
    pub resource_id: ResourceId,
    pub code: Option<String>,
    pub patch: K::Patch,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantCustody {
    pub resource_id: ResourceId,
    pub holder: UserId,
    pub quantity: Quantity,
    pub kind: CustodyKind,
    pub due_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Which active record a return applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnTarget {
    Record(CustodyId),
    Holder {
        resource_id: ResourceId,
        holder: UserId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnCustody {
    pub target: ReturnTarget,
    /// `None` returns everything the record holds.
    pub quantity: Option<Quantity>,
    pub notes: Option<String>,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCustody {
    pub record_id: CustodyId,
    pub to_holder: UserId,
    pub notes: Option<String>,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Signed stock adjustment; the result is clamped at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUnits {
    pub resource_id: ResourceId,
    pub delta: i64,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Remove units from stock; removing all of them deletes the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveUnits {
    pub resource_id: ResourceId,
    pub units: i64,
    pub force: bool,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Conditions an operator can set explicitly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Available,
    Damaged,
    Retired,
}

impl From<Condition> for ResourceStatus {
    fn from(value: Condition) -> Self {
        match value {
            Condition::Available => ResourceStatus::Available,
            Condition::Damaged => ResourceStatus::Damaged,
            Condition::Retired => ResourceStatus::Retired,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCondition {
    pub resource_id: ResourceId,
    pub condition: Condition,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResource {
    pub resource_id: ResourceId,
    pub force: bool,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}
