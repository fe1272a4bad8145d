//! Network Monitoring Abstraction
//!
//! Provides network connectivity and status information.

use crate::error::Result;

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

impl NetworkStatus {
    /// Whether this status should gate network activity.
    ///
    /// `Indeterminate` is treated as offline: deferring a sync cycle is
    /// cheaper than firing one into a dead link.
    pub fn is_online(&self) -> bool {
        matches!(self, NetworkStatus::Connected)
    }
}

/// Network monitor trait
///
/// Provides network connectivity information to allow the core to:
/// - Defer sync cycles while offline
/// - Trigger an immediate sync when connectivity returns
///
/// # Platform Support
///
/// - **Desktop**: System network APIs or reachability probes
/// - **iOS**: Network framework, Reachability
/// - **Android**: ConnectivityManager
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::NetworkMonitor;
///
/// async fn should_sync(monitor: &dyn NetworkMonitor) -> bool {
///     monitor.is_connected().await
/// }
/// ```
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network status
    async fn status(&self) -> Result<NetworkStatus>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(self.status().await, Ok(NetworkStatus::Connected))
    }

    /// Subscribe to network status changes
    ///
    /// Returns a stream of status updates. Implementations must emit only on
    /// transitions, not on every poll.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait::async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next network status transition
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_gating() {
        assert!(NetworkStatus::Connected.is_online());
        assert!(!NetworkStatus::Disconnected.is_online());
        assert!(!NetworkStatus::Indeterminate.is_online());
    }
}
