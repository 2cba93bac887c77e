use custodia_core::{CustodyId, DomainError, DomainResult};

use crate::commands::TransferCustody;
use crate::event::CustodyEvent;
use crate::kind::ResourceKind;
use crate::ledger::{LedgerChange, RecordWrite, ResourceLedger, ResourceWrite};
use crate::record::{CustodyRecord, CustodyState};

use super::units;

/// Hand an active record, whole, to another holder. Stock is unchanged.
pub fn transfer<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: &TransferCustody,
) -> DomainResult<LedgerChange<K>> {
    let source = ledger
        .active_by_id(cmd.record_id)
        .ok_or_else(|| DomainError::not_found("active custody record"))?;
    if source.holder == cmd.to_holder {
        return Err(DomainError::validation("record already belongs to that holder"));
    }

    let moved = source.quantity;
    let mut closed = source.clone();
    closed.state = CustodyState::Transferred;
    closed.returned_at = Some(cmd.occurred_at);
    closed.received_by = cmd.actor;
    closed.append_note(&format!("transferred to {}", cmd.to_holder));
    if let Some(notes) = &cmd.notes {
        closed.append_note(notes);
    }

    let (destination, destination_write) = match ledger.active_for(cmd.to_holder) {
        Some(existing) => {
            let mut merged = existing.clone();
            merged.quantity = merged
                .quantity
                .checked_add(moved)
                .ok_or_else(|| DomainError::invariant("custody counter overflow"))?;
            merged.append_note(&format!("received {moved} {} by transfer", units(moved)));
            (merged.clone(), RecordWrite::Update(merged))
        }
        None => {
            let mut fresh = CustodyRecord {
                id: CustodyId::new(),
                resource_id: source.resource_id,
                holder: cmd.to_holder,
                kind: source.kind,
                quantity: moved,
                state: CustodyState::Active,
                notes: String::new(),
                granted_at: cmd.occurred_at,
                due_on: source.due_on,
                returned_at: None,
                granted_by: cmd.actor,
                received_by: None,
            };
            fresh.append_note(&format!("transferred from {}", source.holder));
            (fresh.clone(), RecordWrite::Insert(fresh))
        }
    };

    let mut resource = ledger.resource.clone();
    if K::SINGLE_HOLDER {
        resource.set_holder(Some(cmd.to_holder));
    }
    resource.refresh_status();
    resource.touch(cmd.occurred_at);

    let event = CustodyEvent::CustodyTransferred {
        resource_id: resource.resource_id(),
        from_record: closed.id,
        to_record: destination.id,
        from_holder: closed.holder,
        to_holder: destination.holder,
        quantity: moved,
        occurred_at: cmd.occurred_at,
    };
    let message = format!(
        "{moved} {} of '{}' transferred to another holder",
        units(moved),
        resource.label()
    );

    Ok(LedgerChange {
        resource: ResourceWrite::Update(resource),
        records: vec![RecordWrite::Update(closed), destination_write],
        event,
        record: Some(destination),
        message,
    })
}
