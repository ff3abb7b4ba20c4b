//! Read-only diagnostics probe.
//!
//! Collects signal strength, throughput estimate and round-trip latency
//! without touching any configuration. The system implementation reads
//! sysfs and `/proc/net/wireless` and shells out to `ping`; everything is
//! behind the [`DiagnosticsProbe`] trait so the monitor loop can be tested
//! with scripted probes.

use crate::command_exec::{CommandRunner, CommandSpec};
use crate::error::BoostError;
use crate::interfaces;
use crate::metrics::{LatencyStats, Metrics};
use chrono::Utc;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Default ping target when no configuration overrides it.
pub const DEFAULT_PING_TARGET: &str = "1.1.1.1";

/// Packets per full latency measurement (the `test` report).
pub const DEFAULT_PING_COUNT: u32 = 5;

/// Signal assumed for wireless adapters whose driver exports no quality.
const FALLBACK_WIRELESS_SIGNAL: f64 = 60.0;

/// Throughput assumed when the link speed is unreadable.
const FALLBACK_DOWNLOAD_MBPS: f64 = 10.0;
const FALLBACK_UPLOAD_MBPS: f64 = 2.0;

/// Share of the link speed credited to each direction.
const DOWNLOAD_SHARE: f64 = 0.7;
const UPLOAD_SHARE: f64 = 0.3;

// iputils prints "rtt min/avg/max/mdev = a/b/c/d ms"; busybox drops mdev.
static PING_RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"min/avg/max[^=]*=\s*([\d.]+)/([\d.]+)/([\d.]+)(?:/([\d.]+))?")
        .expect("ping rtt regex")
});

static PING_LOSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)%\s+packet loss").expect("ping loss regex"));

/// Read-only metrics collector.
///
/// `sample` must not have side effects on system configuration.
pub trait DiagnosticsProbe: Send + Sync {
    fn sample(&self) -> Result<Metrics, BoostError>;
}

/// Probe backed by sysfs, procfs and `ping`.
pub struct SystemProbe {
    runner: Arc<dyn CommandRunner>,
    ping_target: String,
    ping_count: u32,
    sys_net: PathBuf,
    wireless_stats: PathBuf,
}

impl SystemProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, ping_target: &str, ping_count: u32) -> Self {
        SystemProbe {
            runner,
            ping_target: ping_target.to_string(),
            ping_count: ping_count.max(1),
            sys_net: PathBuf::from(interfaces::SYS_CLASS_NET),
            wireless_stats: PathBuf::from("/proc/net/wireless"),
        }
    }

    /// Point the sysfs and procfs reads at fixture trees (for testing).
    pub fn with_roots(mut self, sys_net: &Path, wireless_stats: &Path) -> Self {
        self.sys_net = sys_net.to_path_buf();
        self.wireless_stats = wireless_stats.to_path_buf();
        self
    }

    /// Full multi-packet latency measurement for the diagnostics report.
    pub fn ping_stats(&self) -> Result<LatencyStats, BoostError> {
        self.run_ping(self.ping_count)
    }

    /// Signal strength for one interface, as a percentage. Wired links
    /// report 100.
    pub fn signal_strength(&self, name: &str, wireless: bool) -> f64 {
        self.signal_for(name, wireless)
    }

    fn run_ping(&self, count: u32) -> Result<LatencyStats, BoostError> {
        let count_arg = count.to_string();
        let spec = CommandSpec::new(
            "ping",
            &["-c", &count_arg, "-W", "2", &self.ping_target],
        );
        let out = self.runner.run(&spec)?;
        // ping exits 1 on full loss but still prints the summary; parse
        // whatever came back before judging the exit status.
        parse_ping_output(&out.stdout).ok_or_else(|| {
            BoostError::ProbeUnavailable(format!(
                "ping {} failed: {}",
                self.ping_target,
                out.failure_reason()
            ))
        })
    }

    fn signal_for(&self, name: &str, wireless: bool) -> f64 {
        if !wireless {
            return 100.0;
        }
        fs::read_to_string(&self.wireless_stats)
            .ok()
            .and_then(|content| parse_wireless_quality(&content, name))
            .unwrap_or(FALLBACK_WIRELESS_SIGNAL)
    }

    fn speed_estimate(&self, name: &str) -> (f64, f64) {
        let speed = fs::read_to_string(self.sys_net.join(name).join("speed"))
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|s| *s > 0);
        match speed {
            Some(mbps) => (mbps as f64 * DOWNLOAD_SHARE, mbps as f64 * UPLOAD_SHARE),
            None => (FALLBACK_DOWNLOAD_MBPS, FALLBACK_UPLOAD_MBPS),
        }
    }
}

impl DiagnosticsProbe for SystemProbe {
    fn sample(&self) -> Result<Metrics, BoostError> {
        let iface = interfaces::active_interface_under(&self.sys_net, self.runner.as_ref())
            .ok_or_else(|| {
                BoostError::ProbeUnavailable("no active network interface".to_string())
            })?;

        let wireless = interfaces::is_wireless(&self.sys_net, &iface);
        let signal_strength_pct = self.signal_for(&iface, wireless);
        let (download_mbps, upload_mbps) = self.speed_estimate(&iface);
        // Single fast packet; the monitor samples every second.
        let latency = self.run_ping(1)?;

        Ok(Metrics {
            signal_strength_pct,
            download_mbps,
            upload_mbps,
            latency_ms: latency.avg_ms,
            sampled_at: Utc::now(),
        })
    }
}

/// Parse the ping summary into latency statistics.
///
/// Returns None when no rtt line is present (total loss, resolver
/// failure, unknown ping variant).
pub fn parse_ping_output(output: &str) -> Option<LatencyStats> {
    let rtt = PING_RTT.captures(output)?;
    let loss_pct = PING_LOSS
        .captures(output)
        .and_then(|cap| cap[1].parse().ok())
        .unwrap_or(0.0);

    Some(LatencyStats {
        min_ms: rtt[1].parse().ok()?,
        avg_ms: rtt[2].parse().ok()?,
        max_ms: rtt[3].parse().ok()?,
        mdev_ms: rtt
            .get(4)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0),
        loss_pct,
    })
}

/// Link quality for one interface out of `/proc/net/wireless`, as a
/// percentage of the iwlib maximum of 70.
pub fn parse_wireless_quality(content: &str, iface: &str) -> Option<f64> {
    let prefix = format!("{}:", iface);
    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(&prefix) {
            let link = rest.split_whitespace().nth(1)?;
            let link: f64 = link.trim_end_matches('.').parse().ok()?;
            return Some((link / 70.0 * 100.0).clamp(0.0, 100.0));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::testing::MockRunner;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::TempDir;

    const PING_OUTPUT: &str = "\
PING 1.1.1.1 (1.1.1.1) 56(84) bytes of data.
64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=12.3 ms

--- 1.1.1.1 ping statistics ---
5 packets transmitted, 5 received, 0% packet loss, time 4006ms
rtt min/avg/max/mdev = 11.926/13.847/17.318/2.012 ms
";

    #[test]
    fn test_parse_ping_output_iputils() {
        let stats = parse_ping_output(PING_OUTPUT).unwrap();
        assert_relative_eq!(stats.min_ms, 11.926);
        assert_relative_eq!(stats.avg_ms, 13.847);
        assert_relative_eq!(stats.max_ms, 17.318);
        assert_relative_eq!(stats.mdev_ms, 2.012);
        assert_relative_eq!(stats.loss_pct, 0.0);
    }

    #[test]
    fn test_parse_ping_output_busybox() {
        let output = "\
round-trip min/avg/max = 9.415/11.238/13.102 ms
";
        let stats = parse_ping_output(output).unwrap();
        assert_relative_eq!(stats.avg_ms, 11.238);
        assert_relative_eq!(stats.mdev_ms, 0.0);
    }

    #[test]
    fn test_parse_ping_output_with_loss() {
        let output = "\
--- 8.8.8.8 ping statistics ---
5 packets transmitted, 4 received, 20% packet loss, time 4011ms
rtt min/avg/max/mdev = 21.004/24.377/29.810/3.211 ms
";
        let stats = parse_ping_output(output).unwrap();
        assert_relative_eq!(stats.loss_pct, 20.0);
    }

    #[test]
    fn test_parse_ping_output_total_loss_is_none() {
        let output = "\
--- 10.0.0.99 ping statistics ---
5 packets transmitted, 0 received, 100% packet loss, time 4102ms
";
        assert!(parse_ping_output(output).is_none());
    }

    #[test]
    fn test_parse_wireless_quality() {
        let content = "\
Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
 face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
 wlan0: 0000   54.  -56.  -256        0      0      0      0      0        0
";
        let pct = parse_wireless_quality(content, "wlan0").unwrap();
        assert_relative_eq!(pct, 54.0 / 70.0 * 100.0, max_relative = 1e-9);
        assert!(parse_wireless_quality(content, "wlan1").is_none());
    }

    #[test]
    fn test_wireless_quality_clamped_to_100() {
        let content = " wlp2s0: 0000   70.  -30.  -256        0      0      0      0      0        0\n";
        assert_relative_eq!(parse_wireless_quality(content, "wlp2s0").unwrap(), 100.0);
    }

    fn fixture_sysfs(temp: &TempDir, name: &str, speed: Option<&str>, wireless: bool) {
        let dir = temp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("operstate"), "up\n").unwrap();
        if let Some(speed) = speed {
            fs::write(dir.join("speed"), speed).unwrap();
        }
        if wireless {
            fs::create_dir_all(dir.join("wireless")).unwrap();
        }
    }

    #[test]
    fn test_sample_wired_interface() {
        let temp = TempDir::new().unwrap();
        fixture_sysfs(&temp, "eth0", Some("1000\n"), false);
        let wireless_stats = temp.path().join("wireless_stats");

        let mock = Arc::new(MockRunner::new());
        mock.respond("ip -4 route show default", "default via 10.0.0.1 dev eth0\n");
        mock.respond("ping", PING_OUTPUT);

        let probe = SystemProbe::new(mock.clone(), "1.1.1.1", 5)
            .with_roots(temp.path(), &wireless_stats);
        let metrics = probe.sample().unwrap();

        assert_relative_eq!(metrics.signal_strength_pct, 100.0);
        assert_relative_eq!(metrics.download_mbps, 700.0);
        assert_relative_eq!(metrics.upload_mbps, 300.0);
        assert_relative_eq!(metrics.latency_ms, 13.847);
    }

    #[test]
    fn test_sample_wireless_uses_quality_and_fallback_speed() {
        let temp = TempDir::new().unwrap();
        fixture_sysfs(&temp, "wlan0", None, true);
        let wireless_stats = temp.path().join("wireless_stats");
        fs::write(
            &wireless_stats,
            " wlan0: 0000   35.  -70.  -256        0      0      0      0      0        0\n",
        )
        .unwrap();

        let mock = Arc::new(MockRunner::new());
        mock.respond("ip -4 route show default", "default via 192.168.1.1 dev wlan0\n");
        mock.respond("ping", PING_OUTPUT);

        let probe = SystemProbe::new(mock.clone(), "1.1.1.1", 5)
            .with_roots(temp.path(), &wireless_stats);
        let metrics = probe.sample().unwrap();

        assert_relative_eq!(metrics.signal_strength_pct, 50.0);
        assert_relative_eq!(metrics.download_mbps, 10.0);
        assert_relative_eq!(metrics.upload_mbps, 2.0);
    }

    #[test]
    fn test_sample_without_interface_is_probe_unavailable() {
        let temp = TempDir::new().unwrap();
        let mock = Arc::new(MockRunner::new());
        mock.respond("ip", "");

        let probe = SystemProbe::new(mock.clone(), "1.1.1.1", 5)
            .with_roots(temp.path(), &temp.path().join("wireless_stats"));
        let err = probe.sample().unwrap_err();
        assert!(matches!(err, BoostError::ProbeUnavailable(_)));
    }

    #[test]
    fn test_ping_failure_is_probe_unavailable() {
        let temp = TempDir::new().unwrap();
        fixture_sysfs(&temp, "eth0", Some("1000\n"), false);

        let mock = Arc::new(MockRunner::new());
        mock.respond("ip -4 route show default", "default via 10.0.0.1 dev eth0\n");
        mock.fail_matching("ping");

        let probe = SystemProbe::new(mock.clone(), "1.1.1.1", 5)
            .with_roots(temp.path(), &temp.path().join("wireless_stats"));
        let err = probe.sample().unwrap_err();
        assert!(matches!(err, BoostError::ProbeUnavailable(_)));
    }
}
