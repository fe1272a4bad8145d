//! Core service façade and bootstrap helpers.
//!
//! This crate wires the configured bridges (HTTP, network monitor, clock)
//! into the local store, the sync engine, and the scheduler. The service owns
//! the single explicitly constructed engine/scheduler pair; hosts hold a
//! `CoreService` at their application root and pass references to whatever
//! needs to trigger or observe sync, instead of reaching for a hidden global.
//!
//! ## Write path
//!
//! Every mutation goes to the local store first (synchronously with respect
//! to the caller, never blocking on the network) and is then propagated to
//! the per-entity remote endpoints best-effort in the background. Whether or
//! not that immediate propagation succeeds, the entity stays `Pending` until
//! a batch cycle is acknowledged, so convergence never depends on the fast
//! path.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::CoreConfig;
//! use core_service::CoreService;
//!
//! # async fn example() -> core_service::Result<()> {
//! let config = CoreConfig::builder()
//!     .remote_base_url("https://todo.example.com")
//!     .sqlite_store("/data/todo.db")
//!     .build()?;
//!
//! let service = CoreService::initialize(config).await?;
//! let list = service.create_list("Groceries").await?;
//! service.create_card(&list.id, "Milk").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use core_runtime::config::{CoreConfig, StoreBackend};
use core_runtime::events::{EventBus, EventSeverity, RecvError};
use core_store::{
    create_pool, CardId, DatabaseConfig, JsonDocumentStore, ListId, LocalStore, SqliteLocalStore,
    TodoCard, TodoList,
};
use core_sync::{
    EngineState, HttpSyncTransport, LastSaved, RemoteApi, SyncConfig, SyncEngine, SyncOutcome,
    SyncScheduler,
};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Primary façade exposed to host applications.
pub struct CoreService {
    store: Arc<dyn LocalStore>,
    remote: Arc<RemoteApi>,
    engine: Arc<SyncEngine>,
    scheduler: SyncScheduler,
    event_bus: Arc<EventBus>,
    event_logger: JoinHandle<()>,
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService").finish_non_exhaustive()
    }
}

impl CoreService {
    /// Initialize the core from a validated configuration.
    ///
    /// Opens the configured store backend, constructs the sync engine over
    /// it, and starts the scheduler.
    ///
    /// # Errors
    ///
    /// A store that fails to initialize aborts startup with
    /// [`CoreError::InitializationFailed`]; there is no degraded local-only
    /// mode with a broken store.
    pub async fn initialize(config: CoreConfig) -> Result<Self> {
        let event_bus = Arc::new(EventBus::default());

        let store: Arc<dyn LocalStore> = match &config.store_backend {
            StoreBackend::Sqlite { database_path } => {
                let pool = create_pool(DatabaseConfig::new(database_path))
                    .await
                    .map_err(|e| {
                        CoreError::InitializationFailed(format!(
                            "local store failed to initialize: {}",
                            e
                        ))
                    })?;
                Arc::new(SqliteLocalStore::with_clock(pool, config.clock.clone()))
            }
            StoreBackend::JsonDocument { document_path } => {
                let store = JsonDocumentStore::open_with_clock(document_path, config.clock.clone())
                    .await
                    .map_err(|e| {
                        CoreError::InitializationFailed(format!(
                            "local store failed to initialize: {}",
                            e
                        ))
                    })?;
                Arc::new(store)
            }
        };

        let transport = Arc::new(HttpSyncTransport::new(
            config.http_client.clone(),
            config.remote_base_url.clone(),
            config.request_timeout,
        ));

        let remote = Arc::new(RemoteApi::new(
            config.http_client.clone(),
            config.remote_base_url.clone(),
            config.request_timeout,
        ));

        let engine = Arc::new(SyncEngine::new(
            SyncConfig {
                max_retries: config.max_retries,
                backoff_base: config.backoff_base,
                max_batch_size: config.max_batch_size,
            },
            store.clone(),
            transport,
            event_bus.clone(),
        ));

        let scheduler = SyncScheduler::start(
            engine.clone(),
            config.network_monitor.clone(),
            event_bus.clone(),
            config.sync_interval,
        )
        .await?;

        let event_logger = spawn_event_logger(event_bus.clone());

        info!(remote = %config.remote_base_url, "Core service initialized");

        Ok(Self {
            store,
            remote,
            engine,
            scheduler,
            event_bus,
            event_logger,
        })
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// All lists, sorted by name.
    pub async fn lists(&self) -> Result<Vec<TodoList>> {
        Ok(self.store.get_all_lists().await?)
    }

    /// Create a new list and propagate it best-effort.
    pub async fn create_list(&self, name: &str) -> Result<TodoList> {
        let list = self.store.upsert_list(TodoList::new(name)?).await?;

        let remote = self.remote.clone();
        let payload = list.clone();
        self.propagate("create list", async move { remote.create_list(&payload).await });

        Ok(list)
    }

    /// Rename an existing list.
    pub async fn rename_list(&self, id: &ListId, name: &str) -> Result<TodoList> {
        let current = self
            .store
            .get_list(id)
            .await?
            .ok_or_else(|| core_store::StoreError::not_found("list", id))?;

        let list = self.store.upsert_list(current.renamed(name)?).await?;

        let remote = self.remote.clone();
        let payload = list.clone();
        self.propagate("rename list", async move { remote.update_list(&payload).await });

        Ok(list)
    }

    /// Delete a list; its cards go with it.
    ///
    /// The remote DELETE is fired best-effort. A delete performed while
    /// offline is never replayed by the batch path; see the sync engine
    /// design notes.
    pub async fn delete_list(&self, id: &ListId) -> Result<()> {
        self.store.delete_list(id).await?;

        let remote = self.remote.clone();
        let id = *id;
        self.propagate("delete list", async move { remote.delete_list(&id).await });

        Ok(())
    }

    // ========================================================================
    // Cards
    // ========================================================================

    /// Cards of one list, oldest first.
    pub async fn cards_for_list(&self, list_id: &ListId) -> Result<Vec<TodoCard>> {
        Ok(self.store.get_cards_for_list(list_id).await?)
    }

    /// Create a new card in a list and propagate it best-effort.
    pub async fn create_card(&self, list_id: &ListId, text: &str) -> Result<TodoCard> {
        let card = self.store.upsert_card(TodoCard::new(*list_id, text)?).await?;

        let remote = self.remote.clone();
        let payload = card.clone();
        self.propagate("create card", async move { remote.create_card(&payload).await });

        Ok(card)
    }

    /// Replace a card's text.
    pub async fn edit_card(&self, id: &CardId, text: &str) -> Result<TodoCard> {
        let current = self
            .store
            .get_card(id)
            .await?
            .ok_or_else(|| core_store::StoreError::not_found("card", id))?;

        let card = self.store.upsert_card(current.with_text(text)?).await?;

        let remote = self.remote.clone();
        let payload = card.clone();
        self.propagate("edit card", async move { remote.update_card(&payload).await });

        Ok(card)
    }

    /// Flip a card's completion flag.
    pub async fn toggle_card(&self, id: &CardId) -> Result<TodoCard> {
        let card = self.store.toggle_card(id).await?;

        let remote = self.remote.clone();
        let payload = card.clone();
        self.propagate("toggle card", async move { remote.update_card(&payload).await });

        Ok(card)
    }

    /// Delete a single card.
    pub async fn delete_card(&self, id: &CardId) -> Result<()> {
        self.store.delete_card(id).await?;

        let remote = self.remote.clone();
        let id = *id;
        self.propagate("delete card", async move { remote.delete_card(&id).await });

        Ok(())
    }

    // ========================================================================
    // Sync
    // ========================================================================

    /// Trigger a sync cycle outside the schedule (e.g. pull-to-refresh).
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        Ok(self.engine.sync_now().await?)
    }

    /// Current engine state.
    pub async fn engine_state(&self) -> EngineState {
        self.engine.state().await
    }

    /// Server-side timestamp of the most recent accepted write.
    pub async fn last_saved(&self) -> Result<LastSaved> {
        Ok(self.remote.read_last_saved().await?)
    }

    /// Number of entities not yet acknowledged by the remote store.
    pub async fn pending_count(&self) -> Result<u64> {
        Ok(self.store.count_unsynced().await?)
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    /// The shared local store.
    pub fn store(&self) -> Arc<dyn LocalStore> {
        self.store.clone()
    }

    /// The event bus; subscribe to observe sync and connectivity events.
    pub fn events(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Stop the scheduler and the event logger.
    ///
    /// An in-flight sync cycle is not aborted; it completes or fails
    /// asynchronously and its result is still applied through the store.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.event_logger.abort();
        info!("Core service shut down");
    }

    /// Fire an immediate remote propagation without blocking the caller.
    ///
    /// Failures are logged and otherwise swallowed: the entity is still
    /// pending locally and the batch path remains responsible for
    /// convergence.
    fn propagate<F>(&self, action: &'static str, call: F)
    where
        F: Future<Output = core_sync::Result<()>> + Send + 'static,
    {
        tokio::spawn(async move {
            match call.await {
                Ok(()) => debug!(action, "Immediate remote propagation succeeded"),
                Err(error) => warn!(action, %error, "Immediate remote propagation failed"),
            }
        });
    }
}

/// Mirror bus events into developer-facing logs at their severity.
fn spawn_event_logger(event_bus: Arc<EventBus>) -> JoinHandle<()> {
    let mut events = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.severity() {
                    EventSeverity::Warning => warn!(?event, "{}", event.description()),
                    EventSeverity::Info => info!(?event, "{}", event.description()),
                    EventSeverity::Debug => debug!(?event, "{}", event.description()),
                },
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Event logger lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::network::{NetworkChangeStream, NetworkMonitor, NetworkStatus};
    use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use uuid::Uuid;

    /// HTTP double that accepts everything
    struct OkHttp;

    #[async_trait]
    impl HttpClient for OkHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(br#"{"success":true}"#),
            })
        }
    }

    /// Monitor that reports connected and never emits a transition
    struct QuietMonitor;

    struct IdleStream;

    #[async_trait]
    impl NetworkChangeStream for IdleStream {
        async fn next(&mut self) -> Option<NetworkStatus> {
            std::future::pending::<Option<NetworkStatus>>().await
        }
    }

    #[async_trait]
    impl NetworkMonitor for QuietMonitor {
        async fn status(&self) -> BridgeResult<NetworkStatus> {
            Ok(NetworkStatus::Connected)
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
            Ok(Box::new(IdleStream))
        }
    }

    fn temp_path(extension: &str) -> PathBuf {
        std::env::temp_dir().join(format!("core-service-test-{}.{}", Uuid::new_v4(), extension))
    }

    fn test_config(backend_path: &PathBuf) -> CoreConfig {
        CoreConfig::builder()
            .remote_base_url("https://todo.example.com")
            .json_document_store(backend_path)
            .http_client(Arc::new(OkHttp))
            .network_monitor(Arc::new(QuietMonitor))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_crud_roundtrip() {
        let path = temp_path("json");
        let service = CoreService::initialize(test_config(&path)).await.unwrap();

        let list = service.create_list("Groceries").await.unwrap();
        let card = service.create_card(&list.id, "Milk").await.unwrap();

        let toggled = service.toggle_card(&card.id).await.unwrap();
        assert!(toggled.completed);

        assert_eq!(service.lists().await.unwrap().len(), 1);
        assert_eq!(service.cards_for_list(&list.id).await.unwrap().len(), 1);
        assert_eq!(service.pending_count().await.unwrap(), 2);

        service.shutdown();
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_sync_now_converges_through_service() {
        let path = temp_path("json");
        let service = CoreService::initialize(test_config(&path)).await.unwrap();

        let list = service.create_list("Groceries").await.unwrap();
        service.create_card(&list.id, "Milk").await.unwrap();

        let outcome = service.sync_now().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { synced: 2 });
        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(service.engine_state().await, EngineState::Idle);

        service.shutdown();
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_validation_errors_surface_to_caller() {
        let path = temp_path("json");
        let service = CoreService::initialize(test_config(&path)).await.unwrap();

        assert!(matches!(
            service.create_list("   ").await.unwrap_err(),
            CoreError::Store(core_store::StoreError::Validation { .. })
        ));

        service.create_list("Groceries").await.unwrap();
        assert!(matches!(
            service.create_list("groceries").await.unwrap_err(),
            CoreError::Store(core_store::StoreError::Validation { .. })
        ));

        service.shutdown();
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_broken_store_aborts_startup() {
        let path = temp_path("json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = CoreService::initialize(test_config(&path)).await.unwrap_err();
        assert!(matches!(err, CoreError::InitializationFailed(_)));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_last_saved_reads_remote_timestamp() {
        struct LastSavedHttp;

        #[async_trait]
        impl HttpClient for LastSavedHttp {
            async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
                Ok(HttpResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: Bytes::from_static(br#"{"timestamp":1722850000000}"#),
                })
            }
        }

        let path = temp_path("json");
        let config = CoreConfig::builder()
            .remote_base_url("https://todo.example.com")
            .json_document_store(&path)
            .http_client(Arc::new(LastSavedHttp))
            .network_monitor(Arc::new(QuietMonitor))
            .build()
            .unwrap();

        let service = CoreService::initialize(config).await.unwrap();
        assert_eq!(service.last_saved().await.unwrap().timestamp, 1_722_850_000_000);

        service.shutdown();
        let _ = tokio::fs::remove_file(&path).await;
    }
}
