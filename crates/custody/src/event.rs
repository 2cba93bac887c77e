use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{CustodyId, ResourceId, UserId};
use custodia_events::Event;

use crate::kind::CustodyKind;
use crate::resource::ResourceStatus;

/// Committed custody activity, one per unit of work.
///
/// The payload is kind-agnostic; the envelope's `stream` says whether it is
/// about an asset or a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustodyEvent {
    ResourceRegistered {
        resource_id: ResourceId,
        code: String,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
    ResourceUpdated {
        resource_id: ResourceId,
        code: String,
        occurred_at: DateTime<Utc>,
    },
    CustodyGranted {
        resource_id: ResourceId,
        record_id: CustodyId,
        holder: UserId,
        kind: CustodyKind,
        quantity: u32,
        stock_after: u32,
        occurred_at: DateTime<Utc>,
    },
    CustodyMerged {
        resource_id: ResourceId,
        record_id: CustodyId,
        holder: UserId,
        added: u32,
        held: u32,
        stock_after: u32,
        occurred_at: DateTime<Utc>,
    },
    CustodyPartiallyReturned {
        resource_id: ResourceId,
        record_id: CustodyId,
        holder: UserId,
        returned: u32,
        remaining: u32,
        stock_after: u32,
        occurred_at: DateTime<Utc>,
    },
    CustodyReturned {
        resource_id: ResourceId,
        record_id: CustodyId,
        holder: UserId,
        returned: u32,
        stock_after: u32,
        record_deleted: bool,
        occurred_at: DateTime<Utc>,
    },
    CustodyTransferred {
        resource_id: ResourceId,
        from_record: CustodyId,
        to_record: CustodyId,
        from_holder: UserId,
        to_holder: UserId,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
    StockAdjusted {
        resource_id: ResourceId,
        delta: i64,
        stock_after: u32,
        occurred_at: DateTime<Utc>,
    },
    ConditionChanged {
        resource_id: ResourceId,
        status: ResourceStatus,
        occurred_at: DateTime<Utc>,
    },
    ResourceRemoved {
        resource_id: ResourceId,
        code: String,
        units_in_stock: u32,
        units_in_custody: u32,
        forced: bool,
        occurred_at: DateTime<Utc>,
    },
}

impl CustodyEvent {
    pub fn resource_id(&self) -> ResourceId {
        match self {
            CustodyEvent::ResourceRegistered { resource_id, .. }
            | CustodyEvent::ResourceUpdated { resource_id, .. }
            | CustodyEvent::CustodyGranted { resource_id, .. }
            | CustodyEvent::CustodyMerged { resource_id, .. }
            | CustodyEvent::CustodyPartiallyReturned { resource_id, .. }
            | CustodyEvent::CustodyReturned { resource_id, .. }
            | CustodyEvent::CustodyTransferred { resource_id, .. }
            | CustodyEvent::StockAdjusted { resource_id, .. }
            | CustodyEvent::ConditionChanged { resource_id, .. }
            | CustodyEvent::ResourceRemoved { resource_id, .. } => *resource_id,
        }
    }
}

impl Event for CustodyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustodyEvent::ResourceRegistered { .. } => "custody.resource.registered",
            CustodyEvent::ResourceUpdated { .. } => "custody.resource.updated",
            CustodyEvent::CustodyGranted { .. } => "custody.granted",
            CustodyEvent::CustodyMerged { .. } => "custody.merged",
            CustodyEvent::CustodyPartiallyReturned { .. } => "custody.partially_returned",
            CustodyEvent::CustodyReturned { .. } => "custody.returned",
            CustodyEvent::CustodyTransferred { .. } => "custody.transferred",
            CustodyEvent::StockAdjusted { .. } => "custody.stock.adjusted",
            CustodyEvent::ConditionChanged { .. } => "custody.condition.changed",
            CustodyEvent::ResourceRemoved { .. } => "custody.resource.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustodyEvent::ResourceRegistered { occurred_at, .. }
            | CustodyEvent::ResourceUpdated { occurred_at, .. }
            | CustodyEvent::CustodyGranted { occurred_at, .. }
            | CustodyEvent::CustodyMerged { occurred_at, .. }
            | CustodyEvent::CustodyPartiallyReturned { occurred_at, .. }
            | CustodyEvent::CustodyReturned { occurred_at, .. }
            | CustodyEvent::CustodyTransferred { occurred_at, .. }
            | CustodyEvent::StockAdjusted { occurred_at, .. }
            | CustodyEvent::ConditionChanged { occurred_at, .. }
            | CustodyEvent::ResourceRemoved { occurred_at, .. } => *occurred_at,
        }
    }
}
