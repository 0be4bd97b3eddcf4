//! Attempt Mitigation Policy
//!
//! Configuration for time-windowed failure throttling: how many recorded
//! failures inside the window lock an address out.

use std::time::Duration;

/// Mitigation policy for failed or suspicious attempts
#[derive(Debug, Clone, Copy)]
pub struct MitigationPolicy {
    /// Recorded attempts at which an address is locked
    pub threshold: u32,
    /// How long each recorded attempt counts against the address
    pub window: Duration,
}

impl Default for MitigationPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            window: Duration::from_secs(30 * 60),
        }
    }
}

impl MitigationPolicy {
    pub fn new(threshold: u32, window_secs: u64) -> Self {
        Self {
            threshold,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::minutes(30))
    }
}
