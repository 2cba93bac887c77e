//! Activity feed: the most recent committed custody events.
//!
//! Fed by an [`EventWorker`] subscribed to the custody bus. The feed is a
//! bounded, lossy view; the resource and record tables stay authoritative.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use custodia_core::{ResourceId, UserId};
use custodia_custody::CustodyEvent;
use custodia_events::{EventBus, EventEnvelope};

use crate::workers::{EventWorker, WorkerHandle};

/// One line in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub event_id: Uuid,
    pub sequence_number: u64,
    /// Resource kind, e.g. `asset`.
    pub stream: String,
    pub event_type: String,
    pub resource_id: ResourceId,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
    pub event: CustodyEvent,
}

impl From<EventEnvelope<CustodyEvent>> for ActivityEntry {
    fn from(envelope: EventEnvelope<CustodyEvent>) -> Self {
        Self {
            event_id: envelope.event_id(),
            sequence_number: envelope.sequence_number(),
            stream: envelope.stream().to_string(),
            event_type: envelope.event_type().to_string(),
            resource_id: envelope.payload().resource_id(),
            actor: envelope.actor(),
            occurred_at: envelope.occurred_at(),
            event: envelope.into_payload(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub actor: Option<UserId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug)]
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, entry: ActivityEntry) {
        if let Ok(mut entries) = self.entries.write() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Newest first.
    pub fn recent(&self, query: &ActivityQuery) -> Vec<ActivityEntry> {
        let Ok(entries) = self.entries.read() else {
            return Vec::new();
        };
        entries
            .iter()
            .rev()
            .filter(|e| query.stream.as_deref().is_none_or(|s| e.stream == s))
            .filter(|e| query.resource_id.is_none_or(|id| e.resource_id == id))
            .filter(|e| query.actor.is_none_or(|a| e.actor == Some(a)))
            .take(query.limit.unwrap_or(DEFAULT_LIMIT))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to `bus` and feed every envelope into this log.
    pub fn attach<B>(self: &Arc<Self>, bus: &B) -> std::io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<CustodyEvent>>,
    {
        let log = Arc::clone(self);
        EventWorker::spawn("activity-log", bus, move |envelope: EventEnvelope<CustodyEvent>| {
            log.record(envelope.into());
            Ok::<(), core::convert::Infallible>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodia_events::Event;

    fn entry(stream: &str, seq: u64) -> ActivityEntry {
        let resource_id = ResourceId::new();
        let event = CustodyEvent::StockAdjusted {
            resource_id,
            delta: 1,
            stock_after: 4,
            occurred_at: Utc::now(),
        };
        EventEnvelope::new(
            Uuid::now_v7(),
            stream,
            *resource_id.as_uuid(),
            event.event_type(),
            seq,
            None,
            event.occurred_at(),
            event,
        )
        .into()
    }

    #[test]
    fn keeps_only_the_newest_entries() {
        let log = ActivityLog::new(3);
        for seq in 1..=5 {
            log.record(entry("book", seq));
        }
        let seqs: Vec<u64> = log
            .recent(&ActivityQuery::default())
            .iter()
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(seqs, vec![5, 4, 3]);
    }

    #[test]
    fn filters_by_stream_and_limit() {
        let log = ActivityLog::new(10);
        log.record(entry("asset", 1));
        log.record(entry("book", 2));
        log.record(entry("asset", 3));

        let assets = log.recent(&ActivityQuery {
            stream: Some("asset".to_string()),
            ..ActivityQuery::default()
        });
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|e| e.stream == "asset"));

        let one = log.recent(&ActivityQuery {
            limit: Some(1),
            ..ActivityQuery::default()
        });
        assert_eq!(one[0].sequence_number, 3);
        assert_eq!(one[0].event_type, "custody.stock.adjusted");
    }
}
