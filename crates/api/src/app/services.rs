//! Service wiring: store selection, allocation service, saga runner.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tripstay_events::{EventEnvelope, InMemoryEventBus};
use tripstay_infra::external::{LoggingNotificationSender, QueuedNotificationSender};
use tripstay_infra::saga::StayRideSaga;
use tripstay_infra::{
    AllocationService, AllocationSettings, CapacityStore, EngineConfig, InMemoryCapacityStore,
    StoreError,
};
use tripstay_reservations::ReservationEvent;

#[cfg(feature = "postgres")]
use tripstay_infra::store::PostgresCapacityStore;

pub type ReservationBus = InMemoryEventBus<EventEnvelope<ReservationEvent>>;
pub type EngineService = AllocationService<Arc<dyn CapacityStore>, Arc<ReservationBus>>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("database_url is set but the postgres feature is not enabled")]
    PostgresDisabled,
    #[cfg(feature = "postgres")]
    #[error("failed to connect to postgres: {0}")]
    Connect(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to start notification worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Why a blocking service call produced no result.
#[derive(Debug)]
pub enum RunError {
    /// The call outlived the request deadline; its outcome is unknown.
    TimedOut,
    /// The blocking task panicked or was cancelled.
    Aborted,
}

/// Shared state for every handler.
pub struct AppServices {
    pub allocation: Arc<EngineService>,
    pub saga: StayRideSaga,
    pub request_timeout: Duration,
}

impl AppServices {
    pub fn new(allocation: Arc<EngineService>, request_timeout: Duration) -> Self {
        Self {
            allocation,
            saga: StayRideSaga::default(),
            request_timeout,
        }
    }

    /// Run a blocking engine call off the async runtime, bounded by the
    /// request deadline.
    ///
    /// A timeout does not cancel the call: the write may still commit.
    pub async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, RunError>
    where
        T: Send + 'static,
        F: FnOnce(&AppServices) -> T + Send + 'static,
    {
        let this = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || f(this.as_ref()));
        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "engine task aborted");
                Err(RunError::Aborted)
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.request_timeout.as_millis() as u64, "request deadline elapsed");
                Err(RunError::TimedOut)
            }
        }
    }
}

/// Build services from config.
///
/// Uses Postgres when `database_url` is set (requires the `postgres`
/// feature); otherwise everything lives in memory.
pub async fn build_services(config: &EngineConfig) -> Result<AppServices, BuildError> {
    let store = build_store(config).await?;
    let bus = Arc::new(ReservationBus::new());

    let notifier =
        QueuedNotificationSender::spawn("notification-worker", Arc::new(LoggingNotificationSender))?;

    let allocation = AllocationService::new(store, bus)
        .with_notifier(Arc::new(notifier))
        .with_settings(AllocationSettings::from_config(config));

    Ok(AppServices::new(Arc::new(allocation), config.request_timeout))
}

#[cfg(feature = "postgres")]
async fn build_store(config: &EngineConfig) -> Result<Arc<dyn CapacityStore>, BuildError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("using in-memory capacity store");
        return Ok(Arc::new(InMemoryCapacityStore::new()));
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await?;
    let store = PostgresCapacityStore::new(pool, tokio::runtime::Handle::current(), config.store_timeout);
    store.ensure_schema().await?;
    tracing::info!("using postgres capacity store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn build_store(config: &EngineConfig) -> Result<Arc<dyn CapacityStore>, BuildError> {
    if config.database_url.is_some() {
        return Err(BuildError::PostgresDisabled);
    }
    tracing::info!("using in-memory capacity store");
    Ok(Arc::new(InMemoryCapacityStore::new()))
}
