//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A strictly positive number of units.
///
/// Every grant, return and removal moves at least one unit, so a zero or
/// negative amount never reaches the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(units: u32) -> DomainResult<Self> {
        if units == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        Ok(Self(units))
    }

    /// Accepts the signed integers that arrive from transports.
    pub fn from_signed(units: i64) -> DomainResult<Self> {
        if units <= 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        let units = u32::try_from(units)
            .map_err(|_| DomainError::validation(format!("quantity {units} is too large")))?;
        Ok(Self(units))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_signed(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
