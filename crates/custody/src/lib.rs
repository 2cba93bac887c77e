//! `custodia-custody`: the inventory conservation engine.
//!
//! One engine, written against [`ResourceKind`], decides every stock and
//! custody mutation for assets and books:
//!
//! - units move between a resource's stock and its holders' custody records,
//!   never appear or vanish outside explicit adjustments;
//! - a holder has at most one active record per resource (repeat grants merge);
//! - resource status is derived from whether a holder is attached.
//!
//! Operations are pure: they take a locked [`ResourceLedger`] snapshot and a
//! command and return a [`LedgerChange`] that the store commits atomically.

pub mod commands;
pub mod event;
pub mod filter;
pub mod kind;
pub mod ledger;
pub mod ops;
pub mod record;
pub mod resource;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod properties;

pub use commands::{
    AddUnits, Condition, DeleteResource, GrantCustody, RegisterResource, RemoveUnits,
    ReturnCustody, ReturnTarget, SetCondition, TransferCustody, UpdateResource,
};
pub use event::CustodyEvent;
pub use filter::{RecordFilter, ResourceFilter, sort_records};
pub use kind::{CustodyKind, ExhaustionPolicy, ResourceKind};
pub use ledger::{LedgerChange, RecordWrite, ResourceLedger, ResourceWrite, StockSummary};
pub use ops::Registration;
pub use record::{CustodyRecord, CustodyState};
pub use resource::{Resource, ResourceParts, ResourceStatus, derive_status};
