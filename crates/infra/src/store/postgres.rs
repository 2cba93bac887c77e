//! Postgres-backed stores.
//!
//! The store traits are synchronous; these adapters drive sqlx on a tokio
//! runtime handle, so call them from blocking threads (`spawn_blocking`),
//! never from inside an async task.
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | Meaning | Mapped to |
//! |-----------------|---------|-----------|
//! | `55P03` | `lock_timeout` expired waiting for the row | `Conflict` (retryable) |
//! | `40001`, `40P01` | serialization failure, deadlock | `Conflict` (retryable) |
//! | `23505` | unique violation (code, username, DNI) | `Duplicate` |
//! | `23503` on `custody_records_holder_fk` | deleting a holder with active custody | `Conflict` |
//! | `23503` on `custody_records_holder_fk` | granting to a holder deleted meanwhile | `NotFound` |
//! | anything else | | `StoreError::Backend` |
//!
//! ## Locking
//!
//! [`CustodyStore::with_locked`] opens a transaction, sets `lock_timeout`,
//! and reads the resource row with `SELECT … FOR UPDATE` before loading its
//! active records. The operation's writes are applied in the same transaction.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::instrument;
use uuid::Uuid;

use custodia_auth::Role;
use custodia_core::{CustodyId, DomainError, DomainResult, ResourceId, UserId};
use custodia_custody::{
    CustodyRecord, LedgerChange, RecordFilter, RecordWrite, Resource, ResourceFilter,
    ResourceKind, ResourceLedger, ResourceParts, ResourceWrite,
};
use custodia_users::{TeacherProfile, User};

use super::{CustodyStore, UserStore};
use crate::error::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_schema.sql");

/// Create the tables if they do not exist yet.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("55P03") => {
                return DomainError::conflict("resource is locked by another operation, retry").into();
            }
            Some("40001") | Some("40P01") => {
                return DomainError::conflict(format!("{operation}: concurrent modification, retry"))
                    .into();
            }
            Some("23505") => {
                let what = match db.constraint() {
                    Some("resources_code_unique") => "a resource with this code",
                    Some("users_username_unique") => "a user with this username",
                    Some("users_dni_unique") => "a user with this DNI",
                    Some("custody_records_one_active") => "an active record for this holder",
                    _ => "a row with this key",
                };
                return DomainError::duplicate(what).into();
            }
            Some("23503") if db.constraint() == Some("custody_records_holder_fk") => {
                return holder_fk_violation(operation);
            }
            _ => {}
        }
    }
    StoreError::backend(format!("{operation}: {err}"))
}

/// A custody record and its holder's account disagree: either the account is
/// being deleted under an active record, or a grant raced the deletion.
fn holder_fk_violation(operation: &str) -> StoreError {
    if operation == "delete_user" {
        DomainError::conflict("user still holds active custody records").into()
    } else {
        DomainError::not_found("holder").into()
    }
}

fn decode_error(e: impl core::fmt::Display) -> StoreError {
    StoreError::backend(format!("failed to decode row: {e}"))
}

fn to_u32(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(decode_error)
}

const RESOURCE_COLUMNS: &str = "id, code, quantity, status, holder_id, details, registered_by, registered_at, updated_at";

const RECORD_COLUMNS: &str = "c.id, c.resource_id, c.holder_id, c.kind, c.quantity, c.state, c.notes, \
     c.granted_at, c.due_on, c.returned_at, c.granted_by, c.received_by";

fn resource_from_row<K: ResourceKind>(row: &PgRow) -> Result<Resource<K>, StoreError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let details: serde_json::Value = row.try_get("details").map_err(decode_error)?;
    Ok(Resource::from_parts(ResourceParts {
        id: ResourceId::from_uuid(row.try_get("id").map_err(decode_error)?),
        code: row.try_get("code").map_err(decode_error)?,
        quantity: to_u32(row.try_get("quantity").map_err(decode_error)?)?,
        status: status.parse().map_err(decode_error)?,
        holder: row
            .try_get::<Option<Uuid>, _>("holder_id")
            .map_err(decode_error)?
            .map(UserId::from_uuid),
        details: serde_json::from_value(details).map_err(decode_error)?,
        registered_by: row
            .try_get::<Option<Uuid>, _>("registered_by")
            .map_err(decode_error)?
            .map(UserId::from_uuid),
        registered_at: row.try_get("registered_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    }))
}

fn record_from_row(row: &PgRow) -> Result<CustodyRecord, StoreError> {
    let kind: String = row.try_get("kind").map_err(decode_error)?;
    let state: String = row.try_get("state").map_err(decode_error)?;
    let user = |column: &str| -> Result<Option<UserId>, StoreError> {
        Ok(row
            .try_get::<Option<Uuid>, _>(column)
            .map_err(decode_error)?
            .map(UserId::from_uuid))
    };
    Ok(CustodyRecord {
        id: CustodyId::from_uuid(row.try_get("id").map_err(decode_error)?),
        resource_id: ResourceId::from_uuid(row.try_get("resource_id").map_err(decode_error)?),
        holder: UserId::from_uuid(row.try_get("holder_id").map_err(decode_error)?),
        kind: kind.parse().map_err(decode_error)?,
        quantity: to_u32(row.try_get("quantity").map_err(decode_error)?)?,
        state: state.parse().map_err(decode_error)?,
        notes: row.try_get("notes").map_err(decode_error)?,
        granted_at: row.try_get("granted_at").map_err(decode_error)?,
        due_on: row.try_get("due_on").map_err(decode_error)?,
        returned_at: row.try_get("returned_at").map_err(decode_error)?,
        granted_by: user("granted_by")?,
        received_by: user("received_by")?,
    })
}

/// Postgres resource store for one kind.
#[derive(Debug)]
pub struct PostgresCustodyStore<K: ResourceKind> {
    pool: PgPool,
    handle: Handle,
    lock_timeout: Duration,
    _kind: PhantomData<K>,
}

impl<K: ResourceKind> PostgresCustodyStore<K> {
    pub fn new(pool: PgPool, handle: Handle, lock_timeout: Duration) -> Self {
        Self {
            pool,
            handle,
            lock_timeout,
            _kind: PhantomData,
        }
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.handle.block_on(fut)
    }

    async fn fetch_resource(&self, id: ResourceId) -> Result<Option<Resource<K>>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1 AND kind = $2"
        ))
        .bind(id.as_uuid())
        .bind(K::NAME)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_resource", e))?;
        row.as_ref().map(resource_from_row::<K>).transpose()
    }

    async fn fetch_active(
        conn: &mut sqlx::PgConnection,
        id: ResourceId,
    ) -> Result<Vec<CustodyRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM custody_records c \
             WHERE c.resource_id = $1 AND c.state = 'active' \
             ORDER BY c.granted_at, c.id"
        ))
        .bind(id.as_uuid())
        .fetch_all(conn)
        .await
        .map_err(|e| map_sqlx_error("load_active_records", e))?;
        rows.iter().map(record_from_row).collect()
    }
}

async fn write_record(
    tx: &mut Transaction<'_, Postgres>,
    record: &CustodyRecord,
    insert: bool,
) -> Result<(), StoreError> {
    let sql = if insert {
        "INSERT INTO custody_records (id, resource_id, holder_id, kind, quantity, state, notes, \
         granted_at, due_on, returned_at, granted_by, received_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
    } else {
        "UPDATE custody_records SET resource_id = $2, holder_id = $3, kind = $4, quantity = $5, \
         state = $6, notes = $7, granted_at = $8, due_on = $9, returned_at = $10, \
         granted_by = $11, received_by = $12 WHERE id = $1"
    };
    sqlx::query(sql)
        .bind(record.id.as_uuid())
        .bind(record.resource_id.as_uuid())
        .bind(record.holder.as_uuid())
        .bind(record.kind.as_str())
        .bind(i64::from(record.quantity))
        .bind(record.state.as_str())
        .bind(&record.notes)
        .bind(record.granted_at)
        .bind(record.due_on)
        .bind(record.returned_at)
        .bind(record.granted_by.map(Uuid::from))
        .bind(record.received_by.map(Uuid::from))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_record", e))?;
    Ok(())
}

async fn write_change<K: ResourceKind>(
    tx: &mut Transaction<'_, Postgres>,
    change: &LedgerChange<K>,
) -> Result<(), StoreError> {
    match &change.resource {
        ResourceWrite::Update(resource) => {
            let details = serde_json::to_value(resource.details()).map_err(decode_error)?;
            sqlx::query(
                "UPDATE resources SET code = $2, quantity = $3, status = $4, holder_id = $5, \
                 details = $6, updated_at = $7 WHERE id = $1",
            )
            .bind(resource.resource_id().as_uuid())
            .bind(resource.code())
            .bind(i64::from(resource.quantity()))
            .bind(resource.status().as_str())
            .bind(resource.holder().map(Uuid::from))
            .bind(details)
            .bind(resource.updated_at())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("update_resource", e))?;
        }
        ResourceWrite::Delete(id) => {
            sqlx::query("DELETE FROM resources WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("delete_resource", e))?;
            return Ok(());
        }
    }

    for write in &change.records {
        match write {
            RecordWrite::Insert(record) => write_record(tx, record, true).await?,
            RecordWrite::Update(record) => write_record(tx, record, false).await?,
            RecordWrite::Delete(id) => {
                sqlx::query("DELETE FROM custody_records WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_sqlx_error("delete_record", e))?;
            }
        }
    }
    Ok(())
}

impl<K: ResourceKind> CustodyStore<K> for PostgresCustodyStore<K> {
    #[instrument(skip(self), fields(kind = K::NAME), err)]
    fn get(&self, id: ResourceId) -> Result<Option<Resource<K>>, StoreError> {
        self.block_on(self.fetch_resource(id))
    }

    #[instrument(skip(self), fields(kind = K::NAME), err)]
    fn find_by_code(&self, code: &str) -> Result<Option<Resource<K>>, StoreError> {
        self.block_on(async {
            let row = sqlx::query(&format!(
                "SELECT {RESOURCE_COLUMNS} FROM resources WHERE code = $1 AND kind = $2"
            ))
            .bind(code)
            .bind(K::NAME)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_code", e))?;
            row.as_ref().map(resource_from_row::<K>).transpose()
        })
    }

    #[instrument(skip(self, filter), fields(kind = K::NAME), err)]
    fn list(&self, filter: &ResourceFilter<K>) -> Result<Vec<Resource<K>>, StoreError> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                "SELECT {RESOURCE_COLUMNS} FROM resources WHERE kind = $1 ORDER BY code"
            ))
            .bind(K::NAME)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_resources", e))?;

            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                let resource = resource_from_row::<K>(row)?;
                if filter.matches(&resource) {
                    out.push(resource);
                }
            }
            Ok(out)
        })
    }

    #[instrument(skip(self, resource), fields(kind = K::NAME, code = resource.code()), err)]
    fn insert(&self, resource: &Resource<K>) -> Result<(), StoreError> {
        let details = serde_json::to_value(resource.details()).map_err(decode_error)?;
        self.block_on(async {
            sqlx::query(&format!(
                "INSERT INTO resources (kind, {RESOURCE_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
            ))
            .bind(K::NAME)
            .bind(resource.resource_id().as_uuid())
            .bind(resource.code())
            .bind(i64::from(resource.quantity()))
            .bind(resource.status().as_str())
            .bind(resource.holder().map(Uuid::from))
            .bind(details)
            .bind(resource.registered_by().map(Uuid::from))
            .bind(resource.registered_at())
            .bind(resource.updated_at())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_resource", e))?;
            Ok(())
        })
    }

    fn ledger(&self, id: ResourceId) -> Result<Option<ResourceLedger<K>>, StoreError> {
        self.block_on(async {
            let Some(resource) = self.fetch_resource(id).await? else {
                return Ok(None);
            };
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| map_sqlx_error("acquire", e))?;
            let active = Self::fetch_active(&mut conn, id).await?;
            Ok(Some(ResourceLedger::new(resource, active)))
        })
    }

    #[instrument(skip(self, op), fields(kind = K::NAME, resource_id = %id), err)]
    fn with_locked<F>(&self, id: ResourceId, op: F) -> Result<LedgerChange<K>, StoreError>
    where
        F: FnOnce(&ResourceLedger<K>) -> DomainResult<LedgerChange<K>>,
    {
        self.block_on(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin_transaction", e))?;

            sqlx::query(&format!(
                "SET LOCAL lock_timeout = '{}ms'",
                self.lock_timeout.as_millis()
            ))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

            let row = sqlx::query(&format!(
                "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1 AND kind = $2 FOR UPDATE"
            ))
            .bind(id.as_uuid())
            .bind(K::NAME)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_resource", e))?;
            let Some(row) = row else {
                return Err(DomainError::not_found(format!("{} {id}", K::NAME)).into());
            };
            let resource = resource_from_row::<K>(&row)?;
            let active = Self::fetch_active(&mut tx, id).await?;
            let ledger = ResourceLedger::new(resource, active);

            // Dropping `tx` on any early return rolls back.
            let change = op(&ledger)?;
            if let Some(after) = ledger.clone().apply(&change) {
                after.check_invariants()?;
            }
            write_change(&mut tx, &change).await?;
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit", e))?;
            Ok(change)
        })
    }

    fn record(&self, id: CustodyId) -> Result<Option<CustodyRecord>, StoreError> {
        self.block_on(async {
            let row = sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM custody_records c \
                 JOIN resources r ON r.id = c.resource_id \
                 WHERE c.id = $1 AND r.kind = $2"
            ))
            .bind(id.as_uuid())
            .bind(K::NAME)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_record", e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    #[instrument(skip(self), fields(kind = K::NAME), err)]
    fn records(&self, filter: &RecordFilter) -> Result<Vec<CustodyRecord>, StoreError> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM custody_records c \
                 JOIN resources r ON r.id = c.resource_id \
                 WHERE r.kind = $1 \
                   AND ($2::uuid IS NULL OR c.resource_id = $2) \
                   AND ($3::uuid IS NULL OR c.holder_id = $3) \
                   AND ($4::text IS NULL OR c.state = $4) \
                   AND ($5::text IS NULL OR c.kind = $5) \
                 ORDER BY c.granted_at DESC, c.id DESC"
            ))
            .bind(K::NAME)
            .bind(filter.resource_id.map(Uuid::from))
            .bind(filter.holder.map(Uuid::from))
            .bind(filter.state.map(|s| s.as_str()))
            .bind(filter.kind.map(|k| k.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_records", e))?;
            rows.iter().map(record_from_row).collect()
        })
    }
}

/// Postgres account store.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
    handle: Handle,
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, dni, phone, role, teacher, \
     password_hash, registered_at, updated_at";

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role").map_err(decode_error)?;
    let teacher: Option<serde_json::Value> = row.try_get("teacher").map_err(decode_error)?;
    let teacher: Option<TeacherProfile> = teacher
        .map(serde_json::from_value)
        .transpose()
        .map_err(decode_error)?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(decode_error)?),
        username: row.try_get("username").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
        first_name: row.try_get("first_name").map_err(decode_error)?,
        last_name: row.try_get("last_name").map_err(decode_error)?,
        dni: row.try_get("dni").map_err(decode_error)?,
        phone: row.try_get("phone").map_err(decode_error)?,
        role: Role::parse(&role).ok_or_else(|| decode_error(format!("unknown role '{role}'")))?,
        teacher,
        password_hash: row.try_get("password_hash").map_err(decode_error)?,
        registered_at: row.try_get("registered_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}

impl PostgresUserStore {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    fn write(&self, user: &User, sql: &str, operation: &str) -> Result<u64, StoreError> {
        let teacher = user
            .teacher
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(decode_error)?;
        self.handle.block_on(async {
            let done = sqlx::query(sql)
                .bind(user.id.as_uuid())
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(&user.dni)
                .bind(&user.phone)
                .bind(user.role.as_str())
                .bind(teacher)
                .bind(&user.password_hash)
                .bind(user.registered_at)
                .bind(user.updated_at)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?;
            Ok(done.rows_affected())
        })
    }
}

impl UserStore for PostgresUserStore {
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    fn insert(&self, user: &User) -> Result<(), StoreError> {
        self.write(
            user,
            &format!(
                "INSERT INTO users ({USER_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            ),
            "insert_user",
        )?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    fn update(&self, user: &User) -> Result<(), StoreError> {
        let updated = self.write(
            user,
            "UPDATE users SET username = $2, email = $3, first_name = $4, last_name = $5, \
             dni = $6, phone = $7, role = $8, teacher = $9, password_hash = $10, \
             registered_at = $11, updated_at = $12 WHERE id = $1",
            "update_user",
        )?;
        if updated == 0 {
            return Err(DomainError::not_found(format!("user {}", user.id)).into());
        }
        Ok(())
    }

    /// Closed history goes with the account; an active record blocks the
    /// delete through `custody_records_holder_fk`.
    fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        self.handle.block_on(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin_transaction", e))?;
            sqlx::query("DELETE FROM custody_records WHERE holder_id = $1 AND state <> 'active'")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_user_history", e))?;
            let done = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_user", e))?;
            tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
            Ok(done.rows_affected() > 0)
        })
    }

    fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.handle.block_on(async {
            let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_user", e))?;
            row.as_ref().map(user_from_row).transpose()
        })
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.handle.block_on(async {
            let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_user", e))?;
            row.as_ref().map(user_from_row).transpose()
        })
    }

    fn list(&self, role: Option<&Role>) -> Result<Vec<User>, StoreError> {
        self.handle.block_on(async {
            let rows = sqlx::query(&format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE ($1::text IS NULL OR role = $1) ORDER BY username"
            ))
            .bind(role.map(|r| r.as_str().to_string()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
            rows.iter().map(user_from_row).collect()
        })
    }
}
