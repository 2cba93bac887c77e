//! In-memory stores for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use custodia_auth::Role;
use custodia_core::{CustodyId, DomainError, DomainResult, ResourceId, UserId};
use custodia_custody::{
    CustodyRecord, LedgerChange, RecordFilter, RecordWrite, Resource, ResourceFilter,
    ResourceKind, ResourceLedger, ResourceWrite, sort_records,
};
use custodia_users::User;

use super::locks::RowLocks;
use super::{CustodyStore, UserStore};
use crate::error::StoreError;

#[derive(Debug)]
struct Tables<K: ResourceKind> {
    resources: HashMap<ResourceId, Resource<K>>,
    records: HashMap<CustodyId, CustodyRecord>,
}

impl<K: ResourceKind> Default for Tables<K> {
    fn default() -> Self {
        Self {
            resources: HashMap::new(),
            records: HashMap::new(),
        }
    }
}

impl<K: ResourceKind> Tables<K> {
    fn ledger(&self, id: ResourceId) -> Option<ResourceLedger<K>> {
        let resource = self.resources.get(&id)?.clone();
        let mut active: Vec<CustodyRecord> = self
            .records
            .values()
            .filter(|r| r.resource_id == id && r.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.granted_at.cmp(&b.granted_at).then_with(|| a.id.cmp(&b.id)));
        Some(ResourceLedger::new(resource, active))
    }

    fn code_taken(&self, code: &str, except: Option<ResourceId>) -> bool {
        self.resources
            .values()
            .any(|r| r.code() == code && Some(r.resource_id()) != except)
    }

    fn commit(&mut self, change: &LedgerChange<K>) {
        match &change.resource {
            ResourceWrite::Update(resource) => {
                self.resources.insert(resource.resource_id(), resource.clone());
            }
            ResourceWrite::Delete(id) => {
                self.resources.remove(id);
                self.records.retain(|_, r| r.resource_id != *id);
            }
        }
        for write in &change.records {
            match write {
                RecordWrite::Insert(record) | RecordWrite::Update(record) => {
                    self.records.insert(record.id, record.clone());
                }
                RecordWrite::Delete(id) => {
                    self.records.remove(id);
                }
            }
        }
    }
}

/// In-memory resource store with a row-lock table.
///
/// Both tables sit behind one `RwLock`, so a commit is all-or-nothing for
/// readers. The row lock serialises units of work per resource.
#[derive(Debug)]
pub struct InMemoryCustodyStore<K: ResourceKind> {
    tables: RwLock<Tables<K>>,
    locks: RowLocks,
    lock_timeout: Duration,
}

impl<K: ResourceKind> InMemoryCustodyStore<K> {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: RowLocks::default(),
            lock_timeout,
        }
    }
}

impl<K: ResourceKind> Default for InMemoryCustodyStore<K> {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

fn duplicate_code<K: ResourceKind>(code: &str) -> DomainError {
    DomainError::duplicate(format!("{} with code '{code}'", K::NAME))
}

impl<K: ResourceKind> CustodyStore<K> for InMemoryCustodyStore<K> {
    fn get(&self, id: ResourceId) -> Result<Option<Resource<K>>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.resources.get(&id).cloned())
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Resource<K>>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.resources.values().find(|r| r.code() == code).cloned())
    }

    fn list(&self, filter: &ResourceFilter<K>) -> Result<Vec<Resource<K>>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        let mut out: Vec<Resource<K>> = tables
            .resources
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.code().cmp(b.code()));
        Ok(out)
    }

    fn insert(&self, resource: &Resource<K>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        if tables.code_taken(resource.code(), None) {
            return Err(duplicate_code::<K>(resource.code()).into());
        }
        if tables.resources.contains_key(&resource.resource_id()) {
            return Err(DomainError::duplicate(format!("{} {}", K::NAME, resource.resource_id())).into());
        }
        tables.resources.insert(resource.resource_id(), resource.clone());
        Ok(())
    }

    fn ledger(&self, id: ResourceId) -> Result<Option<ResourceLedger<K>>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.ledger(id))
    }

    fn with_locked<F>(&self, id: ResourceId, op: F) -> Result<LedgerChange<K>, StoreError>
    where
        F: FnOnce(&ResourceLedger<K>) -> DomainResult<LedgerChange<K>>,
    {
        let _row = self.locks.acquire(id, self.lock_timeout)?;

        let ledger = self
            .ledger(id)?
            .ok_or_else(|| DomainError::not_found(format!("{} {id}", K::NAME)))?;
        let change = op(&ledger)?;
        if let Some(after) = ledger.clone().apply(&change) {
            after.check_invariants()?;
        }

        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        if let ResourceWrite::Update(resource) = &change.resource {
            if resource.code() != ledger.resource.code() && tables.code_taken(resource.code(), Some(id)) {
                return Err(duplicate_code::<K>(resource.code()).into());
            }
        }
        tables.commit(&change);
        Ok(change)
    }

    fn record(&self, id: CustodyId) -> Result<Option<CustodyRecord>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.records.get(&id).cloned())
    }

    fn records(&self, filter: &RecordFilter) -> Result<Vec<CustodyRecord>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        let mut out: Vec<CustodyRecord> = tables
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_records(&mut out);
        Ok(out)
    }
}

/// In-memory account store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_unique(users: &HashMap<UserId, User>, user: &User) -> Result<(), StoreError> {
    for other in users.values().filter(|u| u.id != user.id) {
        if other.username == user.username {
            return Err(DomainError::duplicate(format!("username '{}'", user.username)).into());
        }
        if user.dni.is_some() && other.dni == user.dni {
            return Err(DomainError::duplicate("a user with this DNI").into());
        }
    }
    Ok(())
}

impl UserStore for InMemoryUserStore {
    fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::poisoned())?;
        if users.contains_key(&user.id) {
            return Err(DomainError::duplicate(format!("user {}", user.id)).into());
        }
        check_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::poisoned())?;
        if !users.contains_key(&user.id) {
            return Err(DomainError::not_found(format!("user {}", user.id)).into());
        }
        check_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::poisoned())?;
        Ok(users.remove(&id).is_some())
    }

    fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::poisoned())?;
        Ok(users.get(&id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::poisoned())?;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    fn list(&self, role: Option<&Role>) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::poisoned())?;
        let mut out: Vec<User> = users
            .values()
            .filter(|u| role.is_none_or(|r| &u.role == r))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(out)
    }
}
