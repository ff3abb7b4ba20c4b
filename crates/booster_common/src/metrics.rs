//! Metric snapshots produced by the diagnostics probe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable sample of current network conditions.
///
/// Produced by the probe, read by the monitor loop and the `test` and
/// `info` commands. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Signal strength as a percentage (wired links report 100).
    pub signal_strength_pct: f64,
    /// Estimated download throughput in Mbps.
    pub download_mbps: f64,
    /// Estimated upload throughput in Mbps.
    pub upload_mbps: f64,
    /// Round-trip latency in milliseconds.
    pub latency_ms: f64,
    pub sampled_at: DateTime<Utc>,
}

/// Round-trip statistics from a multi-packet ping run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Mean deviation, used as the jitter estimate.
    pub mdev_ms: f64,
    /// Packet loss percentage over the run.
    pub loss_pct: f64,
}

impl LatencyStats {
    /// Jitter estimate for quality scoring.
    pub fn jitter_ms(&self) -> f64 {
        self.mdev_ms
    }
}
