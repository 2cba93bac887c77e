use custodia_core::{DomainError, DomainResult};

use crate::commands::{AddUnits, DeleteResource, RemoveUnits, SetCondition};
use crate::event::CustodyEvent;
use crate::kind::ResourceKind;
use crate::ledger::{LedgerChange, ResourceLedger, ResourceWrite};
use crate::resource::ResourceStatus;

use super::{ensure_resource, units};

/// Signed stock adjustment, clamped at zero.
pub fn add_units<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: &AddUnits,
) -> DomainResult<LedgerChange<K>> {
    ensure_resource(ledger, cmd.resource_id)?;
    if cmd.delta == 0 {
        return Err(DomainError::validation("stock adjustment must not be zero"));
    }

    let mut resource = ledger.resource.clone();
    let target = (i64::from(resource.quantity()) + cmd.delta).max(0);
    let target = u32::try_from(target)
        .map_err(|_| DomainError::validation(format!("stock of {target} is too large")))?;
    let applied = i64::from(target) - i64::from(resource.quantity());
    resource.set_quantity(target);
    resource.touch(cmd.occurred_at);

    let message = format!(
        "stock of '{}' adjusted by {applied}; {target} {} available",
        resource.label(),
        units(target)
    );
    Ok(LedgerChange {
        event: CustodyEvent::StockAdjusted {
            resource_id: resource.resource_id(),
            delta: applied,
            stock_after: target,
            occurred_at: cmd.occurred_at,
        },
        resource: ResourceWrite::Update(resource),
        records: Vec::new(),
        record: None,
        message,
    })
}

/// Take units out of stock. Removing at least the whole stock deletes the
/// resource, subject to the active-custody guard.
pub fn remove_units<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: &RemoveUnits,
) -> DomainResult<LedgerChange<K>> {
    ensure_resource(ledger, cmd.resource_id)?;
    if cmd.units <= 0 {
        return Err(DomainError::validation("units to remove must be at least 1"));
    }

    let stock = i64::from(ledger.resource.quantity());
    if cmd.units >= stock {
        return removal(ledger, cmd.force, cmd.occurred_at);
    }

    let removed = u32::try_from(cmd.units)
        .map_err(|_| DomainError::invariant("removal exceeds the stock counter"))?;
    let mut resource = ledger.resource.clone();
    resource.take_units(removed)?;
    resource.touch(cmd.occurred_at);

    let message = format!(
        "{removed} {} of '{}' removed; {} left",
        units(removed),
        resource.label(),
        resource.quantity()
    );
    Ok(LedgerChange {
        event: CustodyEvent::StockAdjusted {
            resource_id: resource.resource_id(),
            delta: -i64::from(removed),
            stock_after: resource.quantity(),
            occurred_at: cmd.occurred_at,
        },
        resource: ResourceWrite::Update(resource),
        records: Vec::new(),
        record: None,
        message,
    })
}

pub fn delete<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: &DeleteResource,
) -> DomainResult<LedgerChange<K>> {
    ensure_resource(ledger, cmd.resource_id)?;
    removal(ledger, cmd.force, cmd.occurred_at)
}

fn removal<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    force: bool,
    occurred_at: chrono::DateTime<chrono::Utc>,
) -> DomainResult<LedgerChange<K>> {
    let resource = &ledger.resource;
    let in_custody = ledger.units_in_custody();
    if !ledger.active.is_empty() && !force {
        return Err(DomainError::conflict(format!(
            "'{}' has {in_custody} {} in active custody",
            resource.label(),
            units(in_custody)
        )));
    }

    let message = if in_custody > 0 {
        format!(
            "'{}' removed together with {in_custody} {} in custody",
            resource.label(),
            units(in_custody)
        )
    } else {
        format!("'{}' removed", resource.label())
    };
    Ok(LedgerChange {
        resource: ResourceWrite::Delete(resource.resource_id()),
        records: Vec::new(),
        event: CustodyEvent::ResourceRemoved {
            resource_id: resource.resource_id(),
            code: resource.code().to_string(),
            units_in_stock: resource.quantity(),
            units_in_custody: in_custody,
            forced: force && in_custody > 0,
            occurred_at,
        },
        record: None,
        message,
    })
}

/// Mark a resource damaged, retired or available again.
pub fn set_condition<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: &SetCondition,
) -> DomainResult<LedgerChange<K>> {
    ensure_resource(ledger, cmd.resource_id)?;
    if !K::TRACKS_CONDITION {
        return Err(DomainError::validation(format!(
            "{} resources do not track condition",
            K::NAME
        )));
    }
    let resource = &ledger.resource;
    if resource.holder().is_some() || !ledger.active.is_empty() {
        return Err(DomainError::conflict(format!(
            "'{}' is in custody; return it before changing its condition",
            resource.label()
        )));
    }

    let status = ResourceStatus::from(cmd.condition);
    let mut resource = resource.clone();
    resource.set_status(status);
    resource.refresh_status();
    resource.touch(cmd.occurred_at);

    let message = format!("'{}' marked {}", resource.label(), status.as_str());
    Ok(LedgerChange {
        event: CustodyEvent::ConditionChanged {
            resource_id: resource.resource_id(),
            status: resource.status(),
            occurred_at: cmd.occurred_at,
        },
        resource: ResourceWrite::Update(resource),
        records: Vec::new(),
        record: None,
        message,
    })
}
