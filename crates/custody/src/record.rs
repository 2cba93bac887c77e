use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{CustodyId, DomainError, Entity, ResourceId, UserId};

use crate::kind::CustodyKind;

/// Delimiter between appended notes.
pub const NOTE_DELIMITER: &str = "\n";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyState {
    Active,
    Returned,
    Transferred,
}

impl CustodyState {
    pub fn as_str(self) -> &'static str {
        match self {
            CustodyState::Active => "active",
            CustodyState::Returned => "returned",
            CustodyState::Transferred => "transferred",
        }
    }
}

impl FromStr for CustodyState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(CustodyState::Active),
            "returned" => Ok(CustodyState::Returned),
            "transferred" => Ok(CustodyState::Transferred),
            other => Err(DomainError::validation(format!(
                "invalid custody state '{other}': must be one of active, returned, transferred"
            ))),
        }
    }
}

/// A holder possessing some units of a resource (an assignment or a loan).
///
/// At most one `Active` record exists per (resource, holder) pair; repeat
/// grants merge into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyRecord {
    pub id: CustodyId,
    pub resource_id: ResourceId,
    pub holder: UserId,
    pub kind: CustodyKind,
    /// Units currently held. Always positive while `Active`.
    pub quantity: u32,
    pub state: CustodyState,
    /// Append-only, entries separated by [`NOTE_DELIMITER`].
    pub notes: String,
    pub granted_at: DateTime<Utc>,
    pub due_on: Option<NaiveDate>,
    pub returned_at: Option<DateTime<Utc>>,
    pub granted_by: Option<UserId>,
    pub received_by: Option<UserId>,
}

impl CustodyRecord {
    pub fn is_active(&self) -> bool {
        self.state == CustodyState::Active
    }

    /// Append a note; blank input is ignored.
    pub fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        if !self.notes.is_empty() {
            self.notes.push_str(NOTE_DELIMITER);
        }
        self.notes.push_str(note);
    }

    pub fn note_lines(&self) -> impl Iterator<Item = &str> {
        self.notes.split(NOTE_DELIMITER).filter(|l| !l.is_empty())
    }

    /// Past its due date as of `today` (only meaningful while active).
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_active() && self.due_on.is_some_and(|due| due < today)
    }
}

impl Entity for CustodyRecord {
    type Id = CustodyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
