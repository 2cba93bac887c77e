use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{DomainError, DomainResult, Entity, ResourceId, UserId};

use crate::kind::ResourceKind;

/// Resource status lifecycle.
///
/// `Available` and `InUse` are derived from the holder; `Damaged` and
/// `Retired` are set explicitly and survive custody operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    InUse,
    Damaged,
    Retired,
}

impl ResourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceStatus::Available => "available",
            ResourceStatus::InUse => "in_use",
            ResourceStatus::Damaged => "damaged",
            ResourceStatus::Retired => "retired",
        }
    }

    /// Damaged and retired are never overridden by custody operations.
    pub fn is_terminal(self) -> bool {
        matches!(self, ResourceStatus::Damaged | ResourceStatus::Retired)
    }
}

impl FromStr for ResourceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(ResourceStatus::Available),
            "in_use" => Ok(ResourceStatus::InUse),
            "damaged" => Ok(ResourceStatus::Damaged),
            "retired" => Ok(ResourceStatus::Retired),
            other => Err(DomainError::validation(format!(
                "invalid status '{other}': must be one of available, in_use, damaged, retired"
            ))),
        }
    }
}

/// Recompute the status from scratch.
///
/// With no holder and zero stock the status stays `Available`;
/// [`Resource::is_available`] and the `available` list filter also require
/// stock.
pub fn derive_status(current: ResourceStatus, holder: Option<UserId>) -> ResourceStatus {
    if current.is_terminal() {
        return current;
    }
    match holder {
        Some(_) => ResourceStatus::InUse,
        None => ResourceStatus::Available,
    }
}

/// Every stored field of a resource, used by stores to rebuild one.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceParts<K: ResourceKind> {
    pub id: ResourceId,
    pub code: String,
    pub quantity: u32,
    pub status: ResourceStatus,
    pub holder: Option<UserId>,
    pub details: K::Details,
    pub registered_by: Option<UserId>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tracked, quantity-bearing item: an asset group or a book title.
///
/// `quantity` is the stock on the shelf; units out on custody live in the
/// custody records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Resource<K: ResourceKind> {
    id: ResourceId,
    code: String,
    quantity: u32,
    status: ResourceStatus,
    holder: Option<UserId>,
    details: K::Details,
    registered_by: Option<UserId>,
    registered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<K: ResourceKind> Resource<K> {
    /// A freshly registered resource. Inputs are validated by the caller.
    pub(crate) fn registered(
        id: ResourceId,
        code: String,
        quantity: u32,
        details: K::Details,
        registered_by: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            code,
            quantity,
            status: ResourceStatus::Available,
            holder: None,
            details,
            registered_by,
            registered_at: at,
            updated_at: at,
        }
    }

    pub fn from_parts(parts: ResourceParts<K>) -> Self {
        Self {
            id: parts.id,
            code: parts.code,
            quantity: parts.quantity,
            status: parts.status,
            holder: parts.holder,
            details: parts.details,
            registered_by: parts.registered_by,
            registered_at: parts.registered_at,
            updated_at: parts.updated_at,
        }
    }

    pub fn into_parts(self) -> ResourceParts<K> {
        ResourceParts {
            id: self.id,
            code: self.code,
            quantity: self.quantity,
            status: self.status,
            holder: self.holder,
            details: self.details,
            registered_by: self.registered_by,
            registered_at: self.registered_at,
            updated_at: self.updated_at,
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    pub fn holder(&self) -> Option<UserId> {
        self.holder
    }

    pub fn details(&self) -> &K::Details {
        &self.details
    }

    pub fn label(&self) -> &str {
        K::label(&self.details)
    }

    pub fn registered_by(&self) -> Option<UserId> {
        self.registered_by
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Ready to be handed to a new holder.
    pub fn is_available(&self) -> bool {
        self.holder.is_none() && self.status == ResourceStatus::Available && self.quantity > 0
    }

    pub(crate) fn take_units(&mut self, units: u32) -> DomainResult<()> {
        if units > self.quantity {
            return Err(DomainError::insufficient_stock(units, self.quantity));
        }
        self.quantity -= units;
        Ok(())
    }

    pub(crate) fn put_back_units(&mut self, units: u32) -> DomainResult<()> {
        self.quantity = self
            .quantity
            .checked_add(units)
            .ok_or_else(|| DomainError::invariant("stock counter overflow"))?;
        Ok(())
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    pub(crate) fn set_holder(&mut self, holder: Option<UserId>) {
        self.holder = holder;
    }

    pub(crate) fn set_status(&mut self, status: ResourceStatus) {
        self.status = status;
    }

    pub(crate) fn set_code(&mut self, code: String) {
        self.code = code;
    }

    pub(crate) fn details_mut(&mut self) -> &mut K::Details {
        &mut self.details
    }

    /// Recompute the derived status; only single-holder kinds attach holders.
    pub(crate) fn refresh_status(&mut self) {
        self.status = derive_status(self.status, self.holder);
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl<K: ResourceKind> Entity for Resource<K> {
    type Id = ResourceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
