//! Runtime choice between the in-memory and Postgres adapters.
//!
//! Services are generic over their store; the binary picks one of these
//! enums at startup so the service types stay the same either way.

use custodia_auth::Role;
use custodia_core::{CustodyId, DomainResult, ResourceId, UserId};
use custodia_custody::{
    CustodyRecord, LedgerChange, RecordFilter, Resource, ResourceFilter, ResourceKind,
    ResourceLedger,
};
use custodia_users::User;

use super::{CustodyStore, InMemoryCustodyStore, InMemoryUserStore, UserStore};
use crate::error::StoreError;

#[cfg(feature = "postgres")]
use super::{PostgresCustodyStore, PostgresUserStore};

pub enum CustodyBackend<K: ResourceKind> {
    Memory(InMemoryCustodyStore<K>),
    #[cfg(feature = "postgres")]
    Postgres(PostgresCustodyStore<K>),
}

impl<K: ResourceKind> CustodyBackend<K> {
    pub fn name(&self) -> &'static str {
        match self {
            CustodyBackend::Memory(_) => "memory",
            #[cfg(feature = "postgres")]
            CustodyBackend::Postgres(_) => "postgres",
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            CustodyBackend::Memory($store) => $call,
            #[cfg(feature = "postgres")]
            CustodyBackend::Postgres($store) => $call,
        }
    };
}

impl<K: ResourceKind> CustodyStore<K> for CustodyBackend<K> {
    fn get(&self, id: ResourceId) -> Result<Option<Resource<K>>, StoreError> {
        delegate!(self, s => s.get(id))
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Resource<K>>, StoreError> {
        delegate!(self, s => s.find_by_code(code))
    }

    fn list(&self, filter: &ResourceFilter<K>) -> Result<Vec<Resource<K>>, StoreError> {
        delegate!(self, s => s.list(filter))
    }

    fn insert(&self, resource: &Resource<K>) -> Result<(), StoreError> {
        delegate!(self, s => s.insert(resource))
    }

    fn ledger(&self, id: ResourceId) -> Result<Option<ResourceLedger<K>>, StoreError> {
        delegate!(self, s => s.ledger(id))
    }

    fn with_locked<F>(&self, id: ResourceId, op: F) -> Result<LedgerChange<K>, StoreError>
    where
        F: FnOnce(&ResourceLedger<K>) -> DomainResult<LedgerChange<K>>,
    {
        delegate!(self, s => s.with_locked(id, op))
    }

    fn record(&self, id: CustodyId) -> Result<Option<CustodyRecord>, StoreError> {
        delegate!(self, s => s.record(id))
    }

    fn records(&self, filter: &RecordFilter) -> Result<Vec<CustodyRecord>, StoreError> {
        delegate!(self, s => s.records(filter))
    }
}

pub enum UserBackend {
    Memory(InMemoryUserStore),
    #[cfg(feature = "postgres")]
    Postgres(PostgresUserStore),
}

macro_rules! delegate_user {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            UserBackend::Memory($store) => $call,
            #[cfg(feature = "postgres")]
            UserBackend::Postgres($store) => $call,
        }
    };
}

impl UserStore for UserBackend {
    fn insert(&self, user: &User) -> Result<(), StoreError> {
        delegate_user!(self, s => s.insert(user))
    }

    fn update(&self, user: &User) -> Result<(), StoreError> {
        delegate_user!(self, s => s.update(user))
    }

    fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        delegate_user!(self, s => s.delete(id))
    }

    fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        delegate_user!(self, s => s.get(id))
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        delegate_user!(self, s => s.find_by_username(username))
    }

    fn list(&self, role: Option<&Role>) -> Result<Vec<User>, StoreError> {
        delegate_user!(self, s => s.list(role))
    }
}
