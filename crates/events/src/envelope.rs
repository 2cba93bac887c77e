use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use custodia_core::UserId;

/// Envelope for a committed event, carrying stream and audit metadata.
///
/// Notes:
/// - `stream` names the resource kind ("asset", "book") or "user".
/// - `subject_id` is the resource (or user) the event is about.
/// - `sequence_number` is monotonically increasing per publisher.
/// - `actor` is whoever performed the operation, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    stream: String,
    subject_id: Uuid,
    event_type: String,
    sequence_number: u64,
    actor: Option<UserId>,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        stream: impl Into<String>,
        subject_id: Uuid,
        event_type: impl Into<String>,
        sequence_number: u64,
        actor: Option<UserId>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream: stream.into(),
            subject_id,
            event_type: event_type.into(),
            sequence_number,
            actor,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Re-wrap the payload (e.g. typed event → JSON for the wire).
    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            stream: self.stream,
            subject_id: self.subject_id,
            event_type: self.event_type,
            sequence_number: self.sequence_number,
            actor: self.actor,
            occurred_at: self.occurred_at,
            payload: f(self.payload),
        }
    }
}
