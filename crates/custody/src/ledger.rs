//! The locked view of one resource and the change an operation produces.
//!
//! Stores load a [`ResourceLedger`] while holding the resource's row lock, hand
//! it to an operation, and commit the returned [`LedgerChange`] as one unit.

use serde::{Deserialize, Serialize};

use custodia_core::{CustodyId, DomainError, DomainResult, ResourceId, UserId};

use crate::event::CustodyEvent;
use crate::kind::ResourceKind;
use crate::record::CustodyRecord;
use crate::resource::{Resource, derive_status};

/// A resource together with its active custody records.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLedger<K: ResourceKind> {
    pub resource: Resource<K>,
    pub active: Vec<CustodyRecord>,
}

impl<K: ResourceKind> ResourceLedger<K> {
    pub fn new(resource: Resource<K>, active: Vec<CustodyRecord>) -> Self {
        Self { resource, active }
    }

    pub fn active_for(&self, holder: UserId) -> Option<&CustodyRecord> {
        self.active.iter().find(|r| r.holder == holder)
    }

    pub fn active_by_id(&self, id: CustodyId) -> Option<&CustodyRecord> {
        self.active.iter().find(|r| r.id == id)
    }

    pub fn units_in_custody(&self) -> u32 {
        self.active.iter().map(|r| r.quantity).sum()
    }

    pub fn summary(&self) -> StockSummary {
        StockSummary::new(self.resource.quantity(), self.units_in_custody())
    }

    /// Structural invariants that must hold after every committed change.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let resource_id = self.resource.resource_id();
        let mut holders: Vec<UserId> = Vec::with_capacity(self.active.len());

        for record in &self.active {
            if record.resource_id != resource_id {
                return Err(DomainError::invariant("custody record belongs to another resource"));
            }
            if !record.is_active() {
                return Err(DomainError::invariant("closed record in the active set"));
            }
            if record.quantity == 0 {
                return Err(DomainError::invariant("active custody record with zero units"));
            }
            if holders.contains(&record.holder) {
                return Err(DomainError::invariant(
                    "more than one active record for the same holder",
                ));
            }
            holders.push(record.holder);
        }

        if K::SINGLE_HOLDER {
            if holders.len() > 1 {
                return Err(DomainError::invariant("single-holder resource has several holders"));
            }
            if self.resource.holder() != holders.first().copied() {
                return Err(DomainError::invariant(
                    "resource holder does not match its active custody",
                ));
            }
        } else if self.resource.holder().is_some() {
            return Err(DomainError::invariant("multi-holder resource points at a holder"));
        }

        let expected = derive_status(self.resource.status(), self.resource.holder());
        if self.resource.status() != expected {
            return Err(DomainError::invariant(format!(
                "status {} inconsistent with holder",
                self.resource.status().as_str()
            )));
        }
        if !K::TRACKS_CONDITION && self.resource.status().is_terminal() {
            return Err(DomainError::invariant(format!(
                "{} resources do not track condition",
                K::NAME
            )));
        }
        Ok(())
    }

    /// Apply a change to this snapshot, as a store would.
    ///
    /// Returns `None` when the change deleted the resource.
    pub fn apply(mut self, change: &LedgerChange<K>) -> Option<Self> {
        let resource = match &change.resource {
            ResourceWrite::Update(r) => r.clone(),
            ResourceWrite::Delete(_) => return None,
        };
        self.resource = resource;

        for write in &change.records {
            match write {
                RecordWrite::Insert(r) | RecordWrite::Update(r) => {
                    self.active.retain(|a| a.id != r.id);
                    if r.is_active() {
                        self.active.push(r.clone());
                    }
                }
                RecordWrite::Delete(id) => self.active.retain(|a| a.id != *id),
            }
        }
        Some(self)
    }
}

/// What happens to the resource row.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceWrite<K: ResourceKind> {
    Update(Resource<K>),
    /// Deleting a resource drops every record that references it.
    Delete(ResourceId),
}

/// What happens to one custody record row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite {
    Insert(CustodyRecord),
    Update(CustodyRecord),
    Delete(CustodyId),
}

/// The outcome of an operation: every row write plus the event to publish
/// once they are committed.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerChange<K: ResourceKind> {
    pub resource: ResourceWrite<K>,
    pub records: Vec<RecordWrite>,
    pub event: CustodyEvent,
    /// The record the operation was about, in its final state (also when the
    /// row itself was deleted).
    pub record: Option<CustodyRecord>,
    /// Human-readable summary for the caller.
    pub message: String,
}

impl<K: ResourceKind> LedgerChange<K> {
    pub fn resource_after(&self) -> Option<&Resource<K>> {
        match &self.resource {
            ResourceWrite::Update(r) => Some(r),
            ResourceWrite::Delete(_) => None,
        }
    }
}

/// Units on the shelf versus units out with holders.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub available: u32,
    pub in_custody: u32,
    pub total: u64,
}

impl StockSummary {
    pub fn new(available: u32, in_custody: u32) -> Self {
        Self {
            available,
            in_custody,
            total: u64::from(available) + u64::from(in_custody),
        }
    }
}

