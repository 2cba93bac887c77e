//! Pure operations over a locked [`ResourceLedger`](crate::ResourceLedger).
//!
//! Each operation validates against the snapshot and returns the full set of
//! writes; none of them touch a store or the clock.

mod grant;
mod register;
mod returns;
mod stock;
mod transfer;

pub use grant::grant;
pub use register::{Registration, register, update};
pub use returns::return_custody;
pub use stock::{add_units, delete, remove_units, set_condition};
pub use transfer::transfer;

fn ensure_resource<K: crate::ResourceKind>(
    ledger: &crate::ResourceLedger<K>,
    resource_id: custodia_core::ResourceId,
) -> custodia_core::DomainResult<()> {
    if ledger.resource.resource_id() != resource_id {
        return Err(custodia_core::DomainError::invariant("resource_id mismatch"));
    }
    Ok(())
}

fn units(n: u32) -> &'static str {
    if n == 1 { "unit" } else { "units" }
}
