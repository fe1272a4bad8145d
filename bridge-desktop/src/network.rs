//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkMonitor, NetworkStatus},
};
use std::time::Duration;
use tracing::debug;

/// Default endpoint for the reachability probe (a public DNS resolver).
const PROBE_ADDR: &str = "8.8.8.8:53";

/// How long a probe may take before the link is considered down.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the change stream re-probes.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desktop network monitor implementation
///
/// Provides basic network connectivity detection via a TCP reachability
/// probe.
///
/// Note: Platform-specific implementations (Linux netlink, macOS
/// SystemConfiguration, Windows WinAPI) would be more robust but require
/// additional dependencies.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor probing the default endpoint
    pub fn new() -> Self {
        Self {
            probe_addr: PROBE_ADDR.to_string(),
        }
    }

    /// Create a monitor probing a custom `host:port` endpoint
    ///
    /// Useful for tests and for deployments where the default probe target is
    /// unreachable by policy.
    pub fn with_probe_addr(probe_addr: impl Into<String>) -> Self {
        Self {
            probe_addr: probe_addr.into(),
        }
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            PROBE_TIMEOUT,
            tokio::net::TcpStream::connect(&self.probe_addr),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn status(&self) -> Result<NetworkStatus> {
        let status = self.check_connectivity().await;
        debug!(status = ?status, "Network status probed");
        Ok(status)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(PollingChangeStream {
            monitor: Self::with_probe_addr(self.probe_addr.clone()),
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes and emits only transitions
struct PollingChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for PollingChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            if let Ok(status) = self.monitor.status().await {
                if self.last_status != Some(status) {
                    self.last_status = Some(status);
                    return Some(status);
                }
            }
        }
    }
}
