//! Connectivity tracking.
//!
//! The sync engine only reads a synchronous snapshot. The snapshot is updated
//! by [`ConnectivityMonitor::set_online`] or by an HTTP reachability probe
//! against the configured endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::sync::NetworkStatusMonitor;

/// Timeout for a reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Online/offline snapshot with an optional probe target.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    probe_url: Option<String>,
    client: reqwest::Client,
}

impl ConnectivityMonitor {
    /// A monitor with a fixed initial state and no probe target.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            probe_url: None,
            client: reqwest::Client::new(),
        }
    }

    /// A monitor that probes `endpoint` to decide whether the remote is reachable.
    ///
    /// Starts offline until the first probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_probe(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            online: AtomicBool::new(false),
            probe_url: Some(endpoint.trim_end_matches('/').to_string()),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Update the snapshot. Returns true on an offline-to-online transition,
    /// which is when a connectivity-restored sync should be triggered.
    pub fn set_online(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online != online {
            debug!(online, "Connectivity changed");
        }
        online && !was_online
    }

    /// Probe the target and update the snapshot.
    ///
    /// Any HTTP response counts as reachable, whatever its status. Without a
    /// probe target the current snapshot is returned unchanged.
    pub async fn probe(&self) -> bool {
        let Some(url) = &self.probe_url else {
            return self.is_online();
        };

        let reachable = match self.client.head(url).send().await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Probe reached remote");
                true
            }
            Err(e) => {
                debug!(error = %e, "Probe failed");
                false
            }
        };
        self.set_online(reachable);
        reachable
    }
}

impl NetworkStatusMonitor for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_online_reports_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.is_online());

        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.is_online());

        assert!(!monitor.set_online(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_probe_without_target_keeps_snapshot() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(monitor.probe().await);

        monitor.set_online(false);
        assert!(!monitor.probe().await);
    }

    #[tokio::test]
    async fn test_probe_unreachable_goes_offline() {
        let monitor =
            ConnectivityMonitor::with_probe("http://127.0.0.1:9/", Duration::from_millis(500))
                .unwrap();
        monitor.set_online(true);
        assert!(!monitor.probe().await);
        assert!(!monitor.is_online());
    }
}
