//! List filters shared by the in-memory and Postgres stores.

use serde::{Deserialize, Serialize};

use custodia_core::{ResourceId, UserId};

use crate::kind::{CustodyKind, ResourceKind};
use crate::record::{CustodyRecord, CustodyState};
use crate::resource::{Resource, ResourceStatus};

#[derive(Debug, Clone)]
pub struct ResourceFilter<K: ResourceKind> {
    /// Case-insensitive substring over the code and the kind's search fields.
    pub search: Option<String>,
    pub status: Option<ResourceStatus>,
    pub available_only: bool,
    pub holder: Option<UserId>,
    pub details: K::Filter,
}

impl<K: ResourceKind> Default for ResourceFilter<K> {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            available_only: false,
            holder: None,
            details: K::Filter::default(),
        }
    }
}

impl<K: ResourceKind> ResourceFilter<K> {
    pub fn matches(&self, resource: &Resource<K>) -> bool {
        if let Some(status) = self.status {
            if resource.status() != status {
                return false;
            }
            // An empty group keeps the `Available` status but has nothing to lend.
            if status == ResourceStatus::Available && resource.quantity() == 0 {
                return false;
            }
        }
        if self.available_only && !resource.is_available() {
            return false;
        }
        if let Some(holder) = self.holder {
            if resource.holder() != Some(holder) {
                return false;
            }
        }
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let hit = contains_ci(resource.code(), &needle)
                || K::search_fields(resource.details())
                    .into_iter()
                    .any(|field| contains_ci(field, &needle));
            if !hit {
                return false;
            }
        }
        K::matches(resource.details(), &self.details)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub holder: Option<UserId>,
    #[serde(default)]
    pub state: Option<CustodyState>,
    #[serde(default)]
    pub kind: Option<CustodyKind>,
}

impl RecordFilter {
    pub fn active() -> Self {
        Self {
            state: Some(CustodyState::Active),
            ..Self::default()
        }
    }

    pub fn for_resource(resource_id: ResourceId) -> Self {
        Self {
            resource_id: Some(resource_id),
            ..Self::default()
        }
    }

    pub fn for_holder(holder: UserId) -> Self {
        Self {
            holder: Some(holder),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &CustodyRecord) -> bool {
        self.resource_id.is_none_or(|id| record.resource_id == id)
            && self.holder.is_none_or(|h| record.holder == h)
            && self.state.is_none_or(|s| record.state == s)
            && self.kind.is_none_or(|k| record.kind == k)
    }
}

/// Newest first; ties broken by id so the order is stable.
pub fn sort_records(records: &mut [CustodyRecord]) {
    records.sort_by(|a, b| b.granted_at.cmp(&a.granted_at).then_with(|| b.id.cmp(&a.id)));
}

/// Case-insensitive containment; `needle` must already be lowercase.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
