//! The capability interface a resource kind plugs into the engine.

use core::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use custodia_core::{DomainError, DomainResult};

/// What happens to a custody record once every unit has come back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Keep the record with state `Returned` (history stays queryable).
    FlagReturned,
    /// Remove the record; the activity feed keeps the trace.
    DeleteRecord,
}

/// How a holder keeps the units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyKind {
    /// Temporary loan, normally with a due date.
    Loan,
    /// Permanent assignment to a person.
    Assignment,
}

impl CustodyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CustodyKind::Loan => "loan",
            CustodyKind::Assignment => "assignment",
        }
    }
}

impl FromStr for CustodyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loan" => Ok(CustodyKind::Loan),
            "assignment" => Ok(CustodyKind::Assignment),
            other => Err(DomainError::validation(format!(
                "invalid custody kind '{other}': must be one of loan, assignment"
            ))),
        }
    }
}

/// A kind of quantity-bearing resource (assets, books).
///
/// The engine is written once against this trait and instantiated per kind,
/// so the grant/return rules cannot drift between the two.
pub trait ResourceKind:
    Copy + Clone + core::fmt::Debug + Default + PartialEq + Send + Sync + 'static
{
    /// Stream/table name, e.g. `"asset"`.
    const NAME: &'static str;

    /// At most one holder at a time; the resource points at it.
    const SINGLE_HOLDER: bool;

    /// Whether damaged/retired conditions apply to this kind.
    const TRACKS_CONDITION: bool;

    const EXHAUSTION: ExhaustionPolicy;

    /// Descriptive fields (name, author, location, ...).
    type Details: Clone
        + core::fmt::Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Partial update of `Details`; every `None` field is left alone.
    type Patch: Clone + core::fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Kind-specific list filter.
    type Filter: Clone + core::fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Custody kinds this resource can be handed out under.
    fn accepts(kind: CustodyKind) -> bool;

    /// Validate and normalise the unique code (inventory code, ISBN).
    fn normalize_code(code: &str) -> DomainResult<String>;

    fn validate(details: &Self::Details) -> DomainResult<()>;

    fn apply_patch(details: &mut Self::Details, patch: Self::Patch);

    fn matches(details: &Self::Details, filter: &Self::Filter) -> bool;

    /// Fields covered by free-text search.
    fn search_fields(details: &Self::Details) -> Vec<&str>;

    /// Short human label used in messages.
    fn label(details: &Self::Details) -> &str;
}
