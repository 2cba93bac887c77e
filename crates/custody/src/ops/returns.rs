use custodia_core::{DomainError, DomainResult};

use crate::commands::{ReturnCustody, ReturnTarget};
use crate::event::CustodyEvent;
use crate::kind::{ExhaustionPolicy, ResourceKind};
use crate::ledger::{LedgerChange, RecordWrite, ResourceLedger, ResourceWrite};
use crate::record::CustodyState;

use super::{ensure_resource, units};

/// Move units from a holder's custody back into stock.
pub fn return_custody<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: &ReturnCustody,
) -> DomainResult<LedgerChange<K>> {
    let existing = match cmd.target {
        ReturnTarget::Record(id) => ledger.active_by_id(id),
        ReturnTarget::Holder {
            resource_id,
            holder,
        } => {
            ensure_resource(ledger, resource_id)?;
            ledger.active_for(holder)
        }
    }
    .ok_or_else(|| DomainError::not_found("active custody record"))?;

    let held = existing.quantity;
    let returned = cmd.quantity.map_or(held, |q| q.get());
    if returned > held {
        return Err(DomainError::validation(format!(
            "cannot return {returned} {}: only {held} held",
            units(returned)
        )));
    }

    let mut resource = ledger.resource.clone();
    resource.put_back_units(returned)?;

    let mut record = existing.clone();
    if let Some(notes) = &cmd.notes {
        record.append_note(notes);
    }

    let (write, event, message) = if returned == held {
        record.state = CustodyState::Returned;
        record.returned_at = Some(cmd.occurred_at);
        record.received_by = cmd.actor;
        if K::SINGLE_HOLDER {
            resource.set_holder(None);
        }

        let record_deleted = K::EXHAUSTION == ExhaustionPolicy::DeleteRecord;
        let write = if record_deleted {
            RecordWrite::Delete(record.id)
        } else {
            RecordWrite::Update(record.clone())
        };
        let event = CustodyEvent::CustodyReturned {
            resource_id: resource.resource_id(),
            record_id: record.id,
            holder: record.holder,
            returned,
            stock_after: resource.quantity(),
            record_deleted,
            occurred_at: cmd.occurred_at,
        };
        let message = format!(
            "'{}' returned in full ({returned} {})",
            resource.label(),
            units(returned)
        );
        (write, event, message)
    } else {
        record.quantity = held - returned;
        record.append_note(&format!(
            "[{}] partial return of {returned} {}",
            cmd.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            units(returned)
        ));
        let event = CustodyEvent::CustodyPartiallyReturned {
            resource_id: resource.resource_id(),
            record_id: record.id,
            holder: record.holder,
            returned,
            remaining: record.quantity,
            stock_after: resource.quantity(),
            occurred_at: cmd.occurred_at,
        };
        let message = format!(
            "{returned} {} of '{}' returned; {} still held",
            units(returned),
            resource.label(),
            record.quantity
        );
        (RecordWrite::Update(record.clone()), event, message)
    };

    resource.refresh_status();
    resource.touch(cmd.occurred_at);

    Ok(LedgerChange {
        resource: ResourceWrite::Update(resource),
        records: vec![write],
        event,
        record: Some(record),
        message,
    })
}
