//! Custody application service.
//!
//! Every mutation follows the same pipeline:
//!
//! ```text
//! command
//!   ↓
//! 1. pre-lock checks (holder exists, record → resource lookup)
//!   ↓
//! 2. take the resource row lock and load its ledger
//!   ↓
//! 3. run the pure operation (custodia_custody::ops)
//!   ↓
//! 4. commit resource + record writes as one unit
//!   ↓
//! 5. publish the event to the bus
//! ```
//!
//! Publication happens strictly after commit. A failed publish is reported
//! as [`ServiceError::Publish`]; the committed change stands.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use custodia_core::{CustodyId, DomainError, DomainResult, ResourceId, UserId};
use custodia_custody::{
    AddUnits, CustodyEvent, CustodyRecord, CustodyState, DeleteResource, GrantCustody,
    LedgerChange, RecordFilter, RegisterResource, RemoveUnits, Resource, ResourceFilter,
    ResourceKind, ResourceLedger, ResourceWrite, ReturnCustody, ReturnTarget, SetCondition,
    StockSummary, TransferCustody, UpdateResource, ops,
};
use custodia_events::{Event, EventBus, EventEnvelope};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{CustodyStore, HolderDirectory};

/// What a mutation hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Outcome<K: ResourceKind> {
    /// The resource after the change; `None` once it has been removed.
    pub resource: Option<Resource<K>>,
    /// The custody record the operation was about, in its final state.
    pub record: Option<CustodyRecord>,
    pub message: String,
}

/// An active record together with the resource it is for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Holding<K: ResourceKind> {
    pub resource: Resource<K>,
    pub record: CustodyRecord,
}

/// Cross-kind view used when an account is about to be deleted.
pub trait CustodyLookup: Send + Sync {
    /// Name of the resource kind, for messages.
    fn kind_name(&self) -> &'static str;

    fn active_records_held_by(&self, holder: UserId) -> ServiceResult<usize>;
}

pub struct CustodyService<K, S, H, B> {
    store: S,
    holders: H,
    bus: B,
    sequence: AtomicU64,
    _kind: PhantomData<K>,
}

impl<K, S, H, B> core::fmt::Debug for CustodyService<K, S, H, B>
where
    K: ResourceKind,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CustodyService")
            .field("kind", &K::NAME)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<K, S, H, B> CustodyService<K, S, H, B>
where
    K: ResourceKind,
    S: CustodyStore<K>,
    H: HolderDirectory,
    B: EventBus<EventEnvelope<CustodyEvent>>,
{
    pub fn new(store: S, holders: H, bus: B) -> Self {
        Self {
            store,
            holders,
            bus,
            sequence: AtomicU64::new(0),
            _kind: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn publish(&self, actor: Option<UserId>, event: CustodyEvent) -> ServiceResult<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            K::NAME,
            *event.resource_id().as_uuid(),
            event.event_type(),
            sequence,
            actor,
            event.occurred_at(),
            event,
        );
        self.bus.publish(envelope).map_err(|e| {
            warn!(kind = K::NAME, error = ?e, "custody event publication failed");
            ServiceError::Publish(format!("{e:?}"))
        })
    }

    /// Steps 2–5 of the pipeline.
    fn mutate<F>(&self, id: ResourceId, actor: Option<UserId>, op: F) -> ServiceResult<Outcome<K>>
    where
        F: FnOnce(&ResourceLedger<K>) -> DomainResult<LedgerChange<K>>,
    {
        let change = self.store.with_locked(id, op).map_err(|err| {
            warn!(kind = K::NAME, resource_id = %id, error = %err, "custody operation rejected");
            ServiceError::from(err)
        })?;

        info!(
            kind = K::NAME,
            resource_id = %id,
            event_type = change.event.event_type(),
            "{}",
            change.message
        );

        let LedgerChange {
            resource,
            event,
            record,
            message,
            ..
        } = change;
        self.publish(actor, event)?;

        let resource = match resource {
            ResourceWrite::Update(r) => Some(r),
            ResourceWrite::Delete(_) => None,
        };
        Ok(Outcome {
            resource,
            record,
            message,
        })
    }

    fn ensure_holder(&self, holder: UserId) -> ServiceResult<()> {
        if self.holders.exists(holder)? {
            Ok(())
        } else {
            warn!(kind = K::NAME, holder = %holder, "unknown holder");
            Err(DomainError::not_found(format!("holder {holder}")).into())
        }
    }

    fn resource_of_active_record(&self, record_id: CustodyId) -> ServiceResult<ResourceId> {
        self.store
            .record(record_id)?
            .filter(CustodyRecord::is_active)
            .map(|r| r.resource_id)
            .ok_or_else(|| DomainError::not_found(format!("active custody record {record_id}")).into())
    }

    #[instrument(skip(self, cmd), fields(kind = K::NAME, resource_id = %cmd.resource_id), err)]
    pub fn register(&self, cmd: RegisterResource<K>) -> ServiceResult<Outcome<K>> {
        let actor = cmd.actor;
        let registration = ops::register(cmd)?;
        self.store.insert(&registration.resource).map_err(|err| {
            warn!(kind = K::NAME, error = %err, "registration rejected");
            ServiceError::from(err)
        })?;
        info!(kind = K::NAME, code = registration.resource.code(), "{}", registration.message);

        self.publish(actor, registration.event)?;
        Ok(Outcome {
            resource: Some(registration.resource),
            record: None,
            message: registration.message,
        })
    }

    #[instrument(skip(self, cmd), fields(kind = K::NAME, resource_id = %cmd.resource_id), err)]
    pub fn update(&self, cmd: UpdateResource<K>) -> ServiceResult<Outcome<K>> {
        self.mutate(cmd.resource_id, cmd.actor, |ledger| ops::update(ledger, cmd))
    }

    #[instrument(
        skip(self, cmd),
        fields(kind = K::NAME, resource_id = %cmd.resource_id, holder = %cmd.holder, quantity = %cmd.quantity),
        err
    )]
    pub fn grant(&self, cmd: GrantCustody) -> ServiceResult<Outcome<K>> {
        self.ensure_holder(cmd.holder)?;
        self.mutate(cmd.resource_id, cmd.actor, |ledger| ops::grant(ledger, &cmd))
    }

    #[instrument(skip(self, cmd), fields(kind = K::NAME, target = ?cmd.target), err)]
    pub fn return_custody(&self, cmd: ReturnCustody) -> ServiceResult<Outcome<K>> {
        let resource_id = match cmd.target {
            ReturnTarget::Record(id) => self.resource_of_active_record(id)?,
            ReturnTarget::Holder { resource_id, .. } => resource_id,
        };
        self.mutate(resource_id, cmd.actor, |ledger| ops::return_custody(ledger, &cmd))
    }

    #[instrument(skip(self, cmd), fields(kind = K::NAME, record_id = %cmd.record_id, to = %cmd.to_holder), err)]
    pub fn transfer(&self, cmd: TransferCustody) -> ServiceResult<Outcome<K>> {
        self.ensure_holder(cmd.to_holder)?;
        let resource_id = self.resource_of_active_record(cmd.record_id)?;
        self.mutate(resource_id, cmd.actor, |ledger| ops::transfer(ledger, &cmd))
    }

    #[instrument(skip(self, cmd), fields(kind = K::NAME, resource_id = %cmd.resource_id, delta = cmd.delta), err)]
    pub fn add_units(&self, cmd: AddUnits) -> ServiceResult<Outcome<K>> {
        self.mutate(cmd.resource_id, cmd.actor, |ledger| ops::add_units(ledger, &cmd))
    }

    #[instrument(
        skip(self, cmd),
        fields(kind = K::NAME, resource_id = %cmd.resource_id, units = cmd.units, force = cmd.force),
        err
    )]
    pub fn remove_units(&self, cmd: RemoveUnits) -> ServiceResult<Outcome<K>> {
        self.mutate(cmd.resource_id, cmd.actor, |ledger| ops::remove_units(ledger, &cmd))
    }

    #[instrument(skip(self, cmd), fields(kind = K::NAME, resource_id = %cmd.resource_id, condition = ?cmd.condition), err)]
    pub fn set_condition(&self, cmd: SetCondition) -> ServiceResult<Outcome<K>> {
        self.mutate(cmd.resource_id, cmd.actor, |ledger| ops::set_condition(ledger, &cmd))
    }

    #[instrument(skip(self, cmd), fields(kind = K::NAME, resource_id = %cmd.resource_id, force = cmd.force), err)]
    pub fn delete(&self, cmd: DeleteResource) -> ServiceResult<Outcome<K>> {
        self.mutate(cmd.resource_id, cmd.actor, |ledger| ops::delete(ledger, &cmd))
    }

    pub fn get(&self, id: ResourceId) -> ServiceResult<Resource<K>> {
        self.store
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("{} {id}", K::NAME)).into())
    }

    /// Look up by code, normalised the way registration normalises it.
    pub fn find_by_code(&self, code: &str) -> ServiceResult<Resource<K>> {
        let code = K::normalize_code(code)?;
        self.store
            .find_by_code(&code)?
            .ok_or_else(|| DomainError::not_found(format!("{} with code '{code}'", K::NAME)).into())
    }

    pub fn list(&self, filter: &ResourceFilter<K>) -> ServiceResult<Vec<Resource<K>>> {
        Ok(self.store.list(filter)?)
    }

    pub fn record(&self, id: CustodyId) -> ServiceResult<CustodyRecord> {
        self.store
            .record(id)?
            .ok_or_else(|| DomainError::not_found(format!("custody record {id}")).into())
    }

    pub fn records(&self, filter: &RecordFilter) -> ServiceResult<Vec<CustodyRecord>> {
        Ok(self.store.records(filter)?)
    }

    /// Every record ever kept for a resource, newest first.
    pub fn history(&self, resource_id: ResourceId) -> ServiceResult<Vec<CustodyRecord>> {
        self.get(resource_id)?;
        self.records(&RecordFilter::for_resource(resource_id))
    }

    /// What `holder` has right now.
    pub fn holdings(&self, holder: UserId) -> ServiceResult<Vec<Holding<K>>> {
        let records = self.records(&RecordFilter {
            state: Some(CustodyState::Active),
            ..RecordFilter::for_holder(holder)
        })?;
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            // A record whose resource vanished between the two reads is skipped.
            if let Some(resource) = self.store.get(record.resource_id)? {
                out.push(Holding { resource, record });
            }
        }
        Ok(out)
    }

    /// Active records whose due date has passed.
    pub fn overdue(&self, today: NaiveDate) -> ServiceResult<Vec<CustodyRecord>> {
        let mut records = self.records(&RecordFilter::active())?;
        records.retain(|r| r.is_overdue(today));
        Ok(records)
    }

    pub fn stock_summary(&self, id: ResourceId) -> ServiceResult<StockSummary> {
        let ledger = self
            .store
            .ledger(id)?
            .ok_or_else(|| DomainError::not_found(format!("{} {id}", K::NAME)))?;
        Ok(ledger.summary())
    }
}

impl<K, S, H, B> CustodyLookup for CustodyService<K, S, H, B>
where
    K: ResourceKind,
    S: CustodyStore<K>,
    H: HolderDirectory,
    B: EventBus<EventEnvelope<CustodyEvent>>,
{
    fn kind_name(&self) -> &'static str {
        K::NAME
    }

    fn active_records_held_by(&self, holder: UserId) -> ServiceResult<usize> {
        Ok(self
            .records(&RecordFilter {
                state: Some(CustodyState::Active),
                ..RecordFilter::for_holder(holder)
            })?
            .len())
    }
}
