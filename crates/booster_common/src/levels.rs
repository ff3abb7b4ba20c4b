//! Optimization levels and the per-stage parameter profiles they select.
//!
//! Each stage backend asks for its profile with `for_level`; the tables
//! below are the single source for every tunable the stages touch.

use crate::error::BoostError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intensity of an optimization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    Light,
    #[default]
    Standard,
    Aggressive,
    Extreme,
}

impl OptimizationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationLevel::Light => "light",
            OptimizationLevel::Standard => "standard",
            OptimizationLevel::Aggressive => "aggressive",
            OptimizationLevel::Extreme => "extreme",
        }
    }

    /// All levels in increasing intensity.
    pub fn all() -> [OptimizationLevel; 4] {
        [
            OptimizationLevel::Light,
            OptimizationLevel::Standard,
            OptimizationLevel::Aggressive,
            OptimizationLevel::Extreme,
        ]
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationLevel {
    type Err = BoostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(OptimizationLevel::Light),
            "standard" => Ok(OptimizationLevel::Standard),
            "aggressive" => Ok(OptimizationLevel::Aggressive),
            "extreme" => Ok(OptimizationLevel::Extreme),
            other => Err(BoostError::InvalidConfig(format!(
                "unknown optimization level '{}' (expected light, standard, aggressive or extreme)",
                other
            ))),
        }
    }
}

// ============================================================================
// TCP
// ============================================================================

/// TCP stack tunables per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpProfile {
    /// Socket buffer ceiling in bytes (net.core.rmem_max / wmem_max).
    pub window_bytes: u32,
    /// Listen backlog (net.core.somaxconn is handled by the system stage;
    /// this feeds net.ipv4.tcp_max_syn_backlog).
    pub syn_backlog: u32,
    /// Preferred congestion control algorithm. The backend falls back to
    /// cubic when the kernel does not list the preferred one.
    pub congestion: &'static str,
    /// Enable TCP Fast Open for both directions.
    pub fastopen: bool,
    /// Disable slow-start after idle so long-lived connections keep their
    /// window.
    pub keep_window_after_idle: bool,
    /// Also widen net.ipv4.tcp_rmem / tcp_wmem triples.
    pub tune_mem_triples: bool,
}

impl TcpProfile {
    pub fn for_level(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Light => TcpProfile {
                window_bytes: 65_535,
                syn_backlog: 2_048,
                congestion: "cubic",
                fastopen: false,
                keep_window_after_idle: false,
                tune_mem_triples: false,
            },
            OptimizationLevel::Standard => TcpProfile {
                window_bytes: 131_072,
                syn_backlog: 4_096,
                congestion: "cubic",
                fastopen: false,
                keep_window_after_idle: false,
                tune_mem_triples: false,
            },
            OptimizationLevel::Aggressive => TcpProfile {
                window_bytes: 262_144,
                syn_backlog: 8_192,
                congestion: "bbr",
                fastopen: true,
                keep_window_after_idle: true,
                tune_mem_triples: false,
            },
            OptimizationLevel::Extreme => TcpProfile {
                window_bytes: 524_288,
                syn_backlog: 16_384,
                congestion: "bbr",
                fastopen: true,
                keep_window_after_idle: true,
                tune_mem_triples: true,
            },
        }
    }
}

/// Receive-side memory triple used at the extreme level.
pub const TCP_RMEM_EXTREME: &str = "4096 87380 16777216";

/// Send-side memory triple used at the extreme level.
pub const TCP_WMEM_EXTREME: &str = "4096 65536 16777216";

// ============================================================================
// DNS
// ============================================================================

/// Resolver selection per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsProfile {
    pub servers: &'static [&'static str],
    /// Advisory cache size, surfaced in reports only.
    pub cache_size: u32,
}

impl DnsProfile {
    pub fn for_level(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Light => DnsProfile {
                servers: &["8.8.8.8", "8.8.4.4"],
                cache_size: 512,
            },
            OptimizationLevel::Standard => DnsProfile {
                servers: &["1.1.1.1", "1.0.0.1"],
                cache_size: 1_024,
            },
            OptimizationLevel::Aggressive => DnsProfile {
                servers: &["9.9.9.9", "149.112.112.112"],
                cache_size: 2_048,
            },
            OptimizationLevel::Extreme => DnsProfile {
                servers: &["1.1.1.1", "8.8.8.8"],
                cache_size: 4_096,
            },
        }
    }
}

// ============================================================================
// WiFi
// ============================================================================

/// Transmit power request for the wireless stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPower {
    Auto,
    /// 20 dBm.
    High,
    /// 30 dBm.
    Max,
}

impl TxPower {
    /// Arguments for `iw dev <if> set txpower`.
    pub fn iw_args(&self) -> &'static [&'static str] {
        match self {
            TxPower::Auto => &["auto"],
            TxPower::High => &["fixed", "2000"],
            TxPower::Max => &["fixed", "3000"],
        }
    }
}

/// Wireless adapter tunables per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiProfile {
    /// Power saving is switched off at every level; kept as a field so the
    /// stage reads its intent from the profile like everything else.
    pub disable_power_save: bool,
    pub txpower: TxPower,
}

impl WifiProfile {
    pub fn for_level(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Light => WifiProfile {
                disable_power_save: true,
                txpower: TxPower::Auto,
            },
            OptimizationLevel::Standard => WifiProfile {
                disable_power_save: true,
                txpower: TxPower::Auto,
            },
            OptimizationLevel::Aggressive => WifiProfile {
                disable_power_save: true,
                txpower: TxPower::High,
            },
            OptimizationLevel::Extreme => WifiProfile {
                disable_power_save: true,
                txpower: TxPower::Max,
            },
        }
    }
}

// ============================================================================
// QoS
// ============================================================================

/// Traffic shaping selection per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosProfile {
    /// Light leaves the qdisc tree alone.
    pub enabled: bool,
    /// Destination ports steered into the highest-priority class.
    pub priority_ports: &'static [u16],
}

impl QosProfile {
    pub fn for_level(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Light => QosProfile {
                enabled: false,
                priority_ports: &[],
            },
            OptimizationLevel::Standard => QosProfile {
                enabled: true,
                priority_ports: &[],
            },
            OptimizationLevel::Aggressive => QosProfile {
                enabled: true,
                priority_ports: &[22, 53],
            },
            OptimizationLevel::Extreme => QosProfile {
                enabled: true,
                priority_ports: &[22, 53, 80, 443, 123],
            },
        }
    }
}

// ============================================================================
// System
// ============================================================================

/// Host-wide networking tunables per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemProfile {
    pub txqueuelen: u32,
    pub netdev_max_backlog: u32,
    /// Applied from aggressive up.
    pub somaxconn: Option<u32>,
    /// Applied at extreme only.
    pub file_max: Option<u64>,
    /// Widen net.ipv4.ip_local_port_range to "1024 65535" (extreme only).
    pub widen_port_range: bool,
}

impl SystemProfile {
    pub fn for_level(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Light => SystemProfile {
                txqueuelen: 1_000,
                netdev_max_backlog: 2_500,
                somaxconn: None,
                file_max: None,
                widen_port_range: false,
            },
            OptimizationLevel::Standard => SystemProfile {
                txqueuelen: 2_000,
                netdev_max_backlog: 2_500,
                somaxconn: None,
                file_max: None,
                widen_port_range: false,
            },
            OptimizationLevel::Aggressive => SystemProfile {
                txqueuelen: 5_000,
                netdev_max_backlog: 5_000,
                somaxconn: Some(4_096),
                file_max: None,
                widen_port_range: false,
            },
            OptimizationLevel::Extreme => SystemProfile {
                txqueuelen: 10_000,
                netdev_max_backlog: 5_000,
                somaxconn: Some(4_096),
                file_max: Some(65_535),
                widen_port_range: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_accepts_lowercase_names() {
        assert_eq!(
            "light".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::Light
        );
        assert_eq!(
            "standard".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::Standard
        );
        assert_eq!(
            "aggressive".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::Aggressive
        );
        assert_eq!(
            "extreme".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::Extreme
        );
    }

    #[test]
    fn test_level_parse_rejects_unknown() {
        let err = "turbo".parse::<OptimizationLevel>().unwrap_err();
        assert!(matches!(err, BoostError::InvalidConfig(_)));
        assert!(err.to_string().contains("turbo"));

        // Case-sensitive by design: serde uses lowercase names too.
        assert!("Aggressive".parse::<OptimizationLevel>().is_err());
    }

    #[test]
    fn test_level_serde_lowercase() {
        let json = serde_json::to_string(&OptimizationLevel::Extreme).unwrap();
        assert_eq!(json, "\"extreme\"");
        let back: OptimizationLevel = serde_json::from_str("\"light\"").unwrap();
        assert_eq!(back, OptimizationLevel::Light);
    }

    #[test]
    fn test_tcp_profile_scales_with_level() {
        let light = TcpProfile::for_level(OptimizationLevel::Light);
        let extreme = TcpProfile::for_level(OptimizationLevel::Extreme);
        assert!(extreme.window_bytes > light.window_bytes);
        assert!(extreme.syn_backlog > light.syn_backlog);
        assert_eq!(light.congestion, "cubic");
        assert_eq!(extreme.congestion, "bbr");
        assert!(!light.tune_mem_triples);
        assert!(extreme.tune_mem_triples);
    }

    #[test]
    fn test_dns_profile_server_sets() {
        assert_eq!(
            DnsProfile::for_level(OptimizationLevel::Light).servers,
            &["8.8.8.8", "8.8.4.4"]
        );
        assert_eq!(
            DnsProfile::for_level(OptimizationLevel::Standard).servers,
            &["1.1.1.1", "1.0.0.1"]
        );
        for level in OptimizationLevel::all() {
            let profile = DnsProfile::for_level(level);
            assert_eq!(profile.servers.len(), 2);
            assert!(profile.cache_size >= 512);
        }
    }

    #[test]
    fn test_qos_disabled_only_at_light() {
        assert!(!QosProfile::for_level(OptimizationLevel::Light).enabled);
        assert!(QosProfile::for_level(OptimizationLevel::Standard).enabled);
        assert!(QosProfile::for_level(OptimizationLevel::Extreme)
            .priority_ports
            .contains(&443));
    }

    #[test]
    fn test_system_profile_monotonic_txqueuelen() {
        let mut prev = 0;
        for level in OptimizationLevel::all() {
            let profile = SystemProfile::for_level(level);
            assert!(profile.txqueuelen > prev);
            prev = profile.txqueuelen;
        }
    }

    #[test]
    fn test_txpower_iw_args() {
        assert_eq!(TxPower::Auto.iw_args(), &["auto"]);
        assert_eq!(TxPower::Max.iw_args(), &["fixed", "3000"]);
    }
}
