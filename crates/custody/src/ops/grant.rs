use custodia_core::{CustodyId, DomainError, DomainResult};

use crate::commands::GrantCustody;
use crate::event::CustodyEvent;
use crate::kind::ResourceKind;
use crate::ledger::{LedgerChange, RecordWrite, ResourceLedger, ResourceWrite};
use crate::record::{CustodyRecord, CustodyState};

use super::{ensure_resource, units};

/// Move units from stock into a holder's custody.
///
/// Merges into the holder's active record when there is one. The holder's
/// existence is the caller's concern (checked before the lock is taken).
pub fn grant<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: &GrantCustody,
) -> DomainResult<LedgerChange<K>> {
    ensure_resource(ledger, cmd.resource_id)?;
    let requested = cmd.quantity.get();
    let resource = &ledger.resource;

    if !K::accepts(cmd.kind) {
        return Err(DomainError::validation(format!(
            "{} resources cannot be handed out as {}",
            K::NAME,
            cmd.kind.as_str()
        )));
    }
    if let Some(due) = cmd.due_on {
        if due < cmd.occurred_at.date_naive() {
            return Err(DomainError::validation("due date is before the grant date"));
        }
    }
    if resource.status().is_terminal() {
        return Err(DomainError::validation(format!(
            "'{}' is {} and cannot be handed out",
            resource.label(),
            resource.status().as_str()
        )));
    }
    if K::SINGLE_HOLDER {
        if let Some(current) = resource.holder() {
            if current != cmd.holder {
                return Err(DomainError::conflict(format!(
                    "'{}' is already held by another user",
                    resource.label()
                )));
            }
        }
    }
    if requested > resource.quantity() {
        return Err(DomainError::insufficient_stock(requested, resource.quantity()));
    }

    let mut resource = resource.clone();
    resource.take_units(requested)?;
    if K::SINGLE_HOLDER {
        resource.set_holder(Some(cmd.holder));
    }
    resource.refresh_status();
    resource.touch(cmd.occurred_at);

    let (record, write, event, message) = match ledger.active_for(cmd.holder) {
        Some(existing) => {
            let mut record = existing.clone();
            record.quantity = record
                .quantity
                .checked_add(requested)
                .ok_or_else(|| DomainError::invariant("custody counter overflow"))?;
            if let Some(notes) = &cmd.notes {
                record.append_note(notes);
            }
            if cmd.due_on.is_some() {
                record.due_on = cmd.due_on;
            }
            let event = CustodyEvent::CustodyMerged {
                resource_id: resource.resource_id(),
                record_id: record.id,
                holder: record.holder,
                added: requested,
                held: record.quantity,
                stock_after: resource.quantity(),
                occurred_at: cmd.occurred_at,
            };
            let message = format!(
                "{requested} more {} of '{}' added to the existing {}; {} now held",
                units(requested),
                resource.label(),
                record.kind.as_str(),
                record.quantity
            );
            (record.clone(), RecordWrite::Update(record), event, message)
        }
        None => {
            let mut record = CustodyRecord {
                id: CustodyId::new(),
                resource_id: resource.resource_id(),
                holder: cmd.holder,
                kind: cmd.kind,
                quantity: requested,
                state: CustodyState::Active,
                notes: String::new(),
                granted_at: cmd.occurred_at,
                due_on: cmd.due_on,
                returned_at: None,
                granted_by: cmd.actor,
                received_by: None,
            };
            if let Some(notes) = &cmd.notes {
                record.append_note(notes);
            }
            let event = CustodyEvent::CustodyGranted {
                resource_id: resource.resource_id(),
                record_id: record.id,
                holder: record.holder,
                kind: record.kind,
                quantity: requested,
                stock_after: resource.quantity(),
                occurred_at: cmd.occurred_at,
            };
            let message = format!(
                "{requested} {} of '{}' granted as {}",
                units(requested),
                resource.label(),
                record.kind.as_str()
            );
            (record.clone(), RecordWrite::Insert(record), event, message)
        }
    };

    Ok(LedgerChange {
        resource: ResourceWrite::Update(resource),
        records: vec![write],
        event,
        record: Some(record),
        message,
    })
}
