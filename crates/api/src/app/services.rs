use std::sync::{Arc, Mutex};

use chrono::Utc;

use custodia_assets::AssetKind;
use custodia_auth::Hs256Jwt;
use custodia_custody::{CustodyEvent, ResourceKind};
use custodia_events::{EventEnvelope, InMemoryEventBus};
use custodia_infra::activity::ActivityLog;
use custodia_infra::config::AppConfig;
use custodia_infra::store::{CustodyBackend, InMemoryCustodyStore, InMemoryUserStore, UserBackend};
use custodia_infra::workers::WorkerHandle;
use custodia_infra::{CustodyLookup, CustodyService, UserService};
use custodia_library::BookKind;

pub type Bus = Arc<InMemoryEventBus<EventEnvelope<CustodyEvent>>>;
pub type Holders = Arc<UserBackend>;
pub type CustodyServiceFor<K> = CustodyService<K, CustodyBackend<K>, Holders, Bus>;

/// Everything the handlers reach through `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub assets: CustodyServiceFor<AssetKind>,
    pub books: CustodyServiceFor<BookKind>,
    pub users: UserService<Holders>,
    pub activity: Arc<ActivityLog>,
    pub jwt: Arc<Hs256Jwt>,
    backend: &'static str,
    activity_worker: Mutex<Option<WorkerHandle>>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("backend", &self.backend)
            .field("activity_entries", &self.activity.len())
            .finish_non_exhaustive()
    }
}

impl AppServices {
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Every custody service, for checks that span both kinds.
    pub fn custody_lookups(&self) -> [&dyn CustodyLookup; 2] {
        [&self.assets, &self.books]
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        if let Ok(mut worker) = self.activity_worker.lock() {
            if let Some(worker) = worker.take() {
                worker.shutdown();
            }
        }
    }
}

/// Pick stores from config and wire services, the bus and the activity feed.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let (assets, books, users) = match config.database_url.as_deref() {
        Some(url) => postgres_backends(url, config).await?,
        None => memory_backends(config),
    };
    let backend = assets.name();

    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let users = Arc::new(users);
    let jwt = Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes(), config.token_ttl));

    let activity = Arc::new(ActivityLog::new(config.activity_capacity));
    let activity_worker = activity.attach(&bus)?;

    let services = AppServices {
        assets: CustodyService::new(assets, Arc::clone(&users), Arc::clone(&bus)),
        books: CustodyService::new(books, Arc::clone(&users), Arc::clone(&bus)),
        users: UserService::new(users, (*jwt).clone()),
        activity,
        jwt,
        backend,
        activity_worker: Mutex::new(Some(activity_worker)),
    };
    tracing::info!(backend, "services wired");
    Ok(services)
}

type Backends = (CustodyBackend<AssetKind>, CustodyBackend<BookKind>, UserBackend);

fn memory_backends(config: &AppConfig) -> Backends {
    (
        memory_store::<AssetKind>(config),
        memory_store::<BookKind>(config),
        UserBackend::Memory(InMemoryUserStore::new()),
    )
}

fn memory_store<K: ResourceKind>(config: &AppConfig) -> CustodyBackend<K> {
    CustodyBackend::Memory(InMemoryCustodyStore::new(config.lock_timeout))
}

#[cfg(feature = "postgres")]
async fn postgres_backends(url: &str, config: &AppConfig) -> anyhow::Result<Backends> {
    use custodia_infra::store::{PostgresCustodyStore, PostgresUserStore, migrate};
    use sqlx::postgres::PgPoolOptions;
    use tokio::runtime::Handle;

    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    migrate(&pool).await?;
    let handle = Handle::current();

    Ok((
        CustodyBackend::Postgres(PostgresCustodyStore::new(
            pool.clone(),
            handle.clone(),
            config.lock_timeout,
        )),
        CustodyBackend::Postgres(PostgresCustodyStore::new(
            pool.clone(),
            handle.clone(),
            config.lock_timeout,
        )),
        UserBackend::Postgres(PostgresUserStore::new(pool, handle)),
    ))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_backends(_url: &str, config: &AppConfig) -> anyhow::Result<Backends> {
    tracing::warn!("DATABASE_URL is set but the postgres feature is not enabled, falling back to in-memory");
    Ok(memory_backends(config))
}

/// Create the configured administrator account if it does not exist yet.
pub async fn bootstrap_admin(services: &Arc<AppServices>, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (config.admin_username.clone(), config.admin_password.clone())
    else {
        return Ok(());
    };
    let services = Arc::clone(services);
    let created = tokio::task::spawn_blocking(move || {
        services.users.bootstrap_admin(&username, &password, Utc::now())
    })
    .await??;
    if created {
        tracing::info!("administrator account bootstrapped");
    }
    Ok(())
}
