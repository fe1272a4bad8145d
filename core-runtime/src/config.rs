//! # Core Configuration Module
//!
//! Provides configuration management for the Todo Platform Core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core
//! library. It enforces fail-fast validation to ensure all required settings
//! and bridges are provided before initialization.
//!
//! ## Required Settings
//!
//! - `remote_base_url` - Base URL of the remote sync service
//! - A store backend (`sqlite_store` or `json_document_store`)
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `NetworkMonitor` - Connectivity detection (desktop default: TCP probe)
//! - `Clock` - Time source (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpClient` and `NetworkMonitor` are injected automatically if not
//! provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .remote_base_url("https://todo.example.com")
//!     .sqlite_store("/path/to/todo.db")
//!     .sync_interval(Duration::from_secs(30))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, NetworkMonitor, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which persistence backend the local store uses.
///
/// The choice is made once at startup; sync logic is written only against the
/// `LocalStore` trait and never branches on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// SQLite database with row-level transactions
    Sqlite { database_path: PathBuf },
    /// Whole-document JSON file with a single-writer queue
    JsonDocument { document_path: PathBuf },
}

/// Core configuration for the Todo Platform Core.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the remote sync service
    pub remote_base_url: String,

    /// Local persistence backend
    pub store_backend: StoreBackend,

    /// Interval between scheduled sync cycles
    pub sync_interval: Duration,

    /// Maximum transmission attempts per batch before it is abandoned
    pub max_retries: u32,

    /// Base delay for exponential retry backoff
    pub backoff_base: Duration,

    /// Timeout applied to each remote request
    pub request_timeout: Duration,

    /// Maximum number of entities (lists + cards) per sync batch
    pub max_batch_size: usize,

    /// HTTP client for remote requests (defaulted on desktop)
    pub http_client: Arc<dyn HttpClient>,

    /// Network connectivity monitor (defaulted on desktop)
    pub network_monitor: Arc<dyn NetworkMonitor>,

    /// Time source used to stamp entity mutations
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("remote_base_url", &self.remote_base_url)
            .field("store_backend", &self.store_backend)
            .field("sync_interval", &self.sync_interval)
            .field("max_retries", &self.max_retries)
            .field("backoff_base", &self.backoff_base)
            .field("request_timeout", &self.request_timeout)
            .field("max_batch_size", &self.max_batch_size)
            .field("http_client", &"HttpClient { ... }")
            .field("network_monitor", &"NetworkMonitor { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Remote base URL is an http(s) URL
    /// - Backend paths are not empty
    /// - Timing values are sane (non-zero interval, backoff, timeout)
    /// - Retry and batch limits are non-zero
    pub fn validate(&self) -> Result<()> {
        if !self.remote_base_url.starts_with("http://")
            && !self.remote_base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "Remote base URL must be an http(s) URL, got '{}'",
                self.remote_base_url
            )));
        }

        let backend_path = match &self.store_backend {
            StoreBackend::Sqlite { database_path } => database_path,
            StoreBackend::JsonDocument { document_path } => document_path,
        };
        if backend_path.as_os_str().is_empty() {
            return Err(Error::Config("Store backend path cannot be empty".to_string()));
        }

        if self.sync_interval < Duration::from_secs(1) {
            return Err(Error::Config(
                "Sync interval must be at least 1 second".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(Error::Config(
                "Max retries must be at least 1 (the initial attempt)".to_string(),
            ));
        }

        if self.backoff_base.is_zero() {
            return Err(Error::Config("Backoff base must be non-zero".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config("Request timeout must be non-zero".to_string()));
        }

        if self.max_batch_size == 0 {
            return Err(Error::Config("Max batch size must be non-zero".to_string()));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(request_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(request_timeout));
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_request_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for remote sync. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject a platform-native HTTP adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    use bridge_desktop::DesktopNetworkMonitor;

    let monitor: Arc<dyn NetworkMonitor> = Arc::new(DesktopNetworkMonitor::new());
    Ok(monitor)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    Err(Error::CapabilityMissing {
        capability: "NetworkMonitor".to_string(),
        message: "NetworkMonitor implementation is required for reconnect-triggered sync. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default DesktopNetworkMonitor. \
                 Mobile: inject platform connectivity APIs (Reachability/ConnectivityManager)."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
/// The builder validates required dependencies and provides helpful error
/// messages.
#[derive(Default)]
pub struct CoreConfigBuilder {
    remote_base_url: Option<String>,
    store_backend: Option<StoreBackend>,
    sync_interval: Option<Duration>,
    max_retries: Option<u32>,
    backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
    max_batch_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Sets the remote sync service base URL (required).
    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.remote_base_url = Some(url.into());
        self
    }

    /// Selects the SQLite store backend with the given database path.
    pub fn sqlite_store<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.store_backend = Some(StoreBackend::Sqlite {
            database_path: path.into(),
        });
        self
    }

    /// Selects the JSON document store backend with the given file path.
    pub fn json_document_store<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.store_backend = Some(StoreBackend::JsonDocument {
            document_path: path.into(),
        });
        self
    }

    /// Sets the interval between scheduled sync cycles.
    ///
    /// Default: 30 seconds
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Sets the maximum transmission attempts per batch.
    ///
    /// Default: 3
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the base delay for exponential retry backoff.
    ///
    /// Default: 1 second
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    /// Sets the timeout applied to each remote request.
    ///
    /// Default: 5 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of entities per sync batch.
    ///
    /// Default: 50
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the network monitor implementation.
    ///
    /// If not provided, the desktop default (TCP probe) will be used when the
    /// `desktop-shims` feature is enabled.
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Sets the time source used to stamp entity mutations.
    ///
    /// Default: system clock. Tests inject a manual clock to make
    /// `updated_at` comparisons deterministic.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required settings are missing (remote base URL, store backend)
    /// - Required bridges are missing and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let remote_base_url = self.remote_base_url.ok_or_else(|| {
            Error::Config(
                "Remote base URL is required. Use .remote_base_url() to set it.".to_string(),
            )
        })?;

        let store_backend = self.store_backend.ok_or_else(|| {
            Error::Config(
                "Store backend is required. Use .sqlite_store() or .json_document_store() to select one."
                    .to_string(),
            )
        })?;

        let request_timeout = self.request_timeout.unwrap_or(Duration::from_millis(5000));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let network_monitor = match self.network_monitor {
            Some(monitor) => monitor,
            None => provide_default_network_monitor()?,
        };

        let config = CoreConfig {
            remote_base_url,
            store_backend,
            sync_interval: self.sync_interval.unwrap_or(Duration::from_millis(30_000)),
            max_retries: self.max_retries.unwrap_or(3),
            backoff_base: self.backoff_base.unwrap_or(Duration::from_millis(1000)),
            request_timeout,
            max_batch_size: self.max_batch_size.unwrap_or(50),
            http_client,
            network_monitor,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}
