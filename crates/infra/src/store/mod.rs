//! Storage contracts and their adapters.
//!
//! Resource rows are only ever changed inside [`CustodyStore::with_locked`]:
//! the store takes the resource's row lock, loads its [`ResourceLedger`], runs
//! the operation and commits every write it returns as one unit. Nothing is
//! written when the operation fails.

use std::sync::Arc;

use custodia_auth::Role;
use custodia_core::{CustodyId, DomainResult, ResourceId, UserId};
use custodia_custody::{
    CustodyRecord, LedgerChange, RecordFilter, Resource, ResourceFilter, ResourceKind,
    ResourceLedger,
};
use custodia_users::User;

use crate::error::StoreError;

mod backend;
pub mod in_memory;
mod locks;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use backend::{CustodyBackend, UserBackend};
pub use in_memory::{InMemoryCustodyStore, InMemoryUserStore};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresCustodyStore, PostgresUserStore, migrate};

/// Resource store for one kind.
pub trait CustodyStore<K: ResourceKind>: Send + Sync {
    fn get(&self, id: ResourceId) -> Result<Option<Resource<K>>, StoreError>;

    /// Look up by normalised code (inventory code, ISBN).
    fn find_by_code(&self, code: &str) -> Result<Option<Resource<K>>, StoreError>;

    /// Resources matching `filter`, ordered by code.
    fn list(&self, filter: &ResourceFilter<K>) -> Result<Vec<Resource<K>>, StoreError>;

    /// Insert a newly registered resource. A taken code is `Duplicate`.
    fn insert(&self, resource: &Resource<K>) -> Result<(), StoreError>;

    /// Unlocked snapshot of a resource and its active records.
    fn ledger(&self, id: ResourceId) -> Result<Option<ResourceLedger<K>>, StoreError>;

    /// Run `op` under the resource's row lock and commit what it returns.
    ///
    /// Lock waits are bounded; a timeout is a retryable `Conflict`. A missing
    /// resource is `NotFound`. The committed ledger is re-checked against its
    /// invariants before the writes land.
    fn with_locked<F>(&self, id: ResourceId, op: F) -> Result<LedgerChange<K>, StoreError>
    where
        F: FnOnce(&ResourceLedger<K>) -> DomainResult<LedgerChange<K>>;

    fn record(&self, id: CustodyId) -> Result<Option<CustodyRecord>, StoreError>;

    /// Records matching `filter`, newest first.
    fn records(&self, filter: &RecordFilter) -> Result<Vec<CustodyRecord>, StoreError>;
}

impl<K, S> CustodyStore<K> for Arc<S>
where
    K: ResourceKind,
    S: CustodyStore<K>,
{
    fn get(&self, id: ResourceId) -> Result<Option<Resource<K>>, StoreError> {
        (**self).get(id)
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Resource<K>>, StoreError> {
        (**self).find_by_code(code)
    }

    fn list(&self, filter: &ResourceFilter<K>) -> Result<Vec<Resource<K>>, StoreError> {
        (**self).list(filter)
    }

    fn insert(&self, resource: &Resource<K>) -> Result<(), StoreError> {
        (**self).insert(resource)
    }

    fn ledger(&self, id: ResourceId) -> Result<Option<ResourceLedger<K>>, StoreError> {
        (**self).ledger(id)
    }

    fn with_locked<F>(&self, id: ResourceId, op: F) -> Result<LedgerChange<K>, StoreError>
    where
        F: FnOnce(&ResourceLedger<K>) -> DomainResult<LedgerChange<K>>,
    {
        (**self).with_locked(id, op)
    }

    fn record(&self, id: CustodyId) -> Result<Option<CustodyRecord>, StoreError> {
        (**self).record(id)
    }

    fn records(&self, filter: &RecordFilter) -> Result<Vec<CustodyRecord>, StoreError> {
        (**self).records(filter)
    }
}

/// Who may hold resources.
pub trait HolderDirectory: Send + Sync {
    fn exists(&self, id: UserId) -> Result<bool, StoreError>;
}

/// Account storage. Usernames and DNIs are unique (`Duplicate`).
pub trait UserStore: Send + Sync {
    fn insert(&self, user: &User) -> Result<(), StoreError>;

    /// Replace an existing account; `NotFound` when it is gone.
    fn update(&self, user: &User) -> Result<(), StoreError>;

    /// Returns whether an account was removed.
    fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    fn get(&self, id: UserId) -> Result<Option<User>, StoreError>;

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// All accounts, or those with `role`, ordered by username.
    fn list(&self, role: Option<&Role>) -> Result<Vec<User>, StoreError>;
}

impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    fn insert(&self, user: &User) -> Result<(), StoreError> {
        (**self).insert(user)
    }

    fn update(&self, user: &User) -> Result<(), StoreError> {
        (**self).update(user)
    }

    fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        (**self).delete(id)
    }

    fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).get(id)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_username(username)
    }

    fn list(&self, role: Option<&Role>) -> Result<Vec<User>, StoreError> {
        (**self).list(role)
    }
}

/// Every account can hold resources.
impl<S> HolderDirectory for S
where
    S: UserStore + ?Sized,
{
    fn exists(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }
}
