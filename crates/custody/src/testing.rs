//! Minimal resource kinds for exercising the engine in isolation.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{DomainError, DomainResult, Quantity, ResourceId, UserId};

use crate::commands::{GrantCustody, RegisterResource, ReturnCustody, ReturnTarget};
use crate::kind::{CustodyKind, ExhaustionPolicy, ResourceKind};
use crate::ledger::{LedgerChange, ResourceLedger};
use crate::ops;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelPatch {
    pub name: Option<String>,
}

fn check(details: &Label) -> DomainResult<()> {
    if details.name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(())
}

fn code(code: &str) -> DomainResult<String> {
    let code = code.trim();
    if code.is_empty() {
        return Err(DomainError::validation("code cannot be empty"));
    }
    Ok(code.to_uppercase())
}

/// Shared, loan-only, records deleted on full return (like books).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Shelf;

impl ResourceKind for Shelf {
    const NAME: &'static str = "shelf";
    const SINGLE_HOLDER: bool = false;
    const TRACKS_CONDITION: bool = false;
    const EXHAUSTION: ExhaustionPolicy = ExhaustionPolicy::DeleteRecord;

    type Details = Label;
    type Patch = LabelPatch;
    type Filter = LabelPatch;

    fn accepts(kind: CustodyKind) -> bool {
        kind == CustodyKind::Loan
    }

    fn normalize_code(c: &str) -> DomainResult<String> {
        code(c)
    }

    fn validate(details: &Label) -> DomainResult<()> {
        check(details)
    }

    fn apply_patch(details: &mut Label, patch: LabelPatch) {
        if let Some(name) = patch.name {
            details.name = name;
        }
    }

    fn matches(_: &Label, _: &LabelPatch) -> bool {
        true
    }

    fn search_fields(details: &Label) -> Vec<&str> {
        vec![details.name.as_str()]
    }

    fn label(details: &Label) -> &str {
        &details.name
    }
}

/// Single holder, condition tracked, records kept on return (like assets).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Desk;

impl ResourceKind for Desk {
    const NAME: &'static str = "desk";
    const SINGLE_HOLDER: bool = true;
    const TRACKS_CONDITION: bool = true;
    const EXHAUSTION: ExhaustionPolicy = ExhaustionPolicy::FlagReturned;

    type Details = Label;
    type Patch = LabelPatch;
    type Filter = LabelPatch;

    fn accepts(_: CustodyKind) -> bool {
        true
    }

    fn normalize_code(c: &str) -> DomainResult<String> {
        code(c)
    }

    fn validate(details: &Label) -> DomainResult<()> {
        check(details)
    }

    fn apply_patch(details: &mut Label, patch: LabelPatch) {
        if let Some(name) = patch.name {
            details.name = name;
        }
    }

    fn matches(_: &Label, _: &LabelPatch) -> bool {
        true
    }

    fn search_fields(details: &Label) -> Vec<&str> {
        vec![details.name.as_str()]
    }

    fn label(details: &Label) -> &str {
        &details.name
    }
}

pub fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

pub fn ledger<K: ResourceKind<Details = Label>>(quantity: u32) -> ResourceLedger<K> {
    let registration = ops::register::<K>(RegisterResource {
        resource_id: ResourceId::new(),
        code: "r-001".to_string(),
        quantity: Some(quantity),
        details: Label {
            name: "Projector".to_string(),
        },
        actor: None,
        occurred_at: at(),
    })
    .unwrap();
    ResourceLedger::new(registration.resource, Vec::new())
}

pub fn grant_cmd<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    holder: UserId,
    units: u32,
) -> GrantCustody {
    GrantCustody {
        resource_id: ledger.resource.resource_id(),
        holder,
        quantity: Quantity::new(units).unwrap(),
        kind: CustodyKind::Loan,
        due_on: None,
        notes: None,
        actor: None,
        occurred_at: at(),
    }
}

pub fn return_cmd<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    holder: UserId,
    units: Option<u32>,
) -> ReturnCustody {
    ReturnCustody {
        target: ReturnTarget::Holder {
            resource_id: ledger.resource.resource_id(),
            holder,
        },
        quantity: units.map(|u| Quantity::new(u).unwrap()),
        notes: None,
        actor: None,
        occurred_at: at(),
    }
}

/// Apply a change, asserting the resource survives and invariants hold.
pub fn commit<K: ResourceKind>(ledger: ResourceLedger<K>, change: &LedgerChange<K>) -> ResourceLedger<K> {
    let next = ledger.apply(change).expect("resource deleted");
    next.check_invariants().unwrap();
    next
}
