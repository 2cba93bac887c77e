use custodia_core::DomainResult;

use crate::commands::{RegisterResource, UpdateResource};
use crate::event::CustodyEvent;
use crate::kind::ResourceKind;
use crate::ledger::{LedgerChange, ResourceLedger, ResourceWrite};
use crate::resource::Resource;

use super::{ensure_resource, units};

/// A validated resource ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration<K: ResourceKind> {
    pub resource: Resource<K>,
    pub event: CustodyEvent,
    pub message: String,
}

/// Build a new resource. Code uniqueness is enforced by the store on insert.
pub fn register<K: ResourceKind>(cmd: RegisterResource<K>) -> DomainResult<Registration<K>> {
    let code = K::normalize_code(&cmd.code)?;
    K::validate(&cmd.details)?;
    let quantity = cmd.quantity.unwrap_or(1);

    let resource = Resource::registered(
        cmd.resource_id,
        code,
        quantity,
        cmd.details,
        cmd.actor,
        cmd.occurred_at,
    );
    let event = CustodyEvent::ResourceRegistered {
        resource_id: resource.resource_id(),
        code: resource.code().to_string(),
        quantity,
        occurred_at: cmd.occurred_at,
    };
    let message = format!(
        "'{}' registered with {quantity} {}",
        resource.label(),
        units(quantity)
    );
    Ok(Registration {
        resource,
        event,
        message,
    })
}

/// Patch descriptive fields and, optionally, the code.
pub fn update<K: ResourceKind>(
    ledger: &ResourceLedger<K>,
    cmd: UpdateResource<K>,
) -> DomainResult<LedgerChange<K>> {
    ensure_resource(ledger, cmd.resource_id)?;

    let mut resource = ledger.resource.clone();
    if let Some(code) = &cmd.code {
        resource.set_code(K::normalize_code(code)?);
    }
    K::apply_patch(resource.details_mut(), cmd.patch);
    K::validate(resource.details())?;
    resource.touch(cmd.occurred_at);

    let message = format!("'{}' updated", resource.label());
    Ok(LedgerChange {
        event: CustodyEvent::ResourceUpdated {
            resource_id: resource.resource_id(),
            code: resource.code().to_string(),
            occurred_at: cmd.occurred_at,
        },
        resource: ResourceWrite::Update(resource),
        records: Vec::new(),
        record: None,
        message,
    })
}
