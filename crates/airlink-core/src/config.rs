// ── Runtime coordination configuration ──
//
// Plain values describing *how often* and *how patiently* to talk to
// one device. Built by the host at setup time and handed in; the core
// never reads config files and supports no mid-lifecycle changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing configuration for one device's coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How often the polling loop refreshes live state.
    /// `Duration::ZERO` disables periodic polling; on-demand refreshes
    /// still work.
    pub refresh_interval: Duration,

    /// Window within which repeated on-demand refresh requests collapse
    /// into one.
    pub debounce_cooldown: Duration,

    /// Upper bound on any single network operation. The appliance
    /// connection can hang indefinitely; this keeps the gate from being
    /// held forever.
    pub network_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(15),
            debounce_cooldown: Duration::from_secs(1),
            network_timeout: Duration::from_secs(30),
        }
    }
}
