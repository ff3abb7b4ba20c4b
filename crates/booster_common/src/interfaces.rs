//! Network interface discovery.
//!
//! Enumerates `/sys/class/net`, finds the interface behind the default
//! route and reads the resolver list. All `ip` invocations go through the
//! command runner; sysfs reads take the base directory as a parameter so
//! tests can point them at a fixture tree.

use crate::command_exec::{CommandRunner, CommandSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Default sysfs network class directory.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Default resolver configuration file.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

static DEFAULT_ROUTE_DEV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dev\s+(\S+)").expect("default route dev regex"));

static DEFAULT_ROUTE_VIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"via\s+(\S+)").expect("default route via regex"));

static INET_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"inet\s+(\d+\.\d+\.\d+\.\d+/?\d*)").expect("inet regex"));

/// One discovered network interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub is_wireless: bool,
    pub is_up: bool,
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    /// Link speed in Mbps; usually absent for wireless adapters.
    pub speed_mbps: Option<u32>,
    pub ipv4_addresses: Vec<String>,
}

/// Enumerate interfaces from the default sysfs tree.
pub fn list_interfaces(runner: &dyn CommandRunner) -> Vec<NetworkInterface> {
    list_interfaces_under(Path::new(SYS_CLASS_NET), runner)
}

/// Enumerate interfaces under an explicit sysfs-style base (for tests).
pub fn list_interfaces_under(base: &Path, runner: &dyn CommandRunner) -> Vec<NetworkInterface> {
    let mut interfaces = Vec::new();

    if let Ok(entries) = fs::read_dir(base) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == "lo" {
                continue;
            }
            interfaces.push(read_interface(base, &name, runner));
        }
    }

    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}

fn read_interface(base: &Path, name: &str, runner: &dyn CommandRunner) -> NetworkInterface {
    let dir = base.join(name);
    NetworkInterface {
        name: name.to_string(),
        is_wireless: is_wireless(base, name),
        is_up: read_trimmed(&dir.join("operstate"))
            .map(|s| s == "up")
            .unwrap_or(false),
        mac_address: read_trimmed(&dir.join("address")).filter(|s| !s.is_empty()),
        mtu: read_trimmed(&dir.join("mtu")).and_then(|s| s.parse().ok()),
        speed_mbps: link_speed(&dir),
        ipv4_addresses: ipv4_addresses(name, runner),
    }
}

/// Wireless detection: sysfs `wireless/` subdirectory, with the kernel
/// predictable-name prefix as a fallback.
pub fn is_wireless(base: &Path, name: &str) -> bool {
    base.join(name).join("wireless").exists() || name.starts_with("wl")
}

/// Link speed from sysfs; drivers report -1 when the link is down.
fn link_speed(dir: &PathBuf) -> Option<u32> {
    read_trimmed(&dir.join("speed"))
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|speed| *speed > 0)
        .map(|speed| speed as u32)
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn ipv4_addresses(name: &str, runner: &dyn CommandRunner) -> Vec<String> {
    let spec = CommandSpec::new("ip", &["-4", "addr", "show", name]);
    match runner.run(&spec) {
        Ok(out) if out.status.is_success() => parse_ipv4_addresses(&out.stdout),
        _ => Vec::new(),
    }
}

/// Pull `inet` addresses out of `ip -4 addr show` output.
pub fn parse_ipv4_addresses(output: &str) -> Vec<String> {
    INET_ADDR
        .captures_iter(output)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Interface carrying the default route, with fallbacks for hosts where
/// `ip` is unavailable.
pub fn active_interface(runner: &dyn CommandRunner) -> Option<String> {
    active_interface_under(Path::new(SYS_CLASS_NET), runner)
}

pub fn active_interface_under(base: &Path, runner: &dyn CommandRunner) -> Option<String> {
    let spec = CommandSpec::new("ip", &["-4", "route", "show", "default"]);
    if let Ok(out) = runner.run(&spec) {
        if out.status.is_success() {
            if let Some(name) = parse_default_route_dev(&out.stdout) {
                return Some(name);
            }
        }
    }

    // Fallback: first interface that is up.
    list_interfaces_under(base, runner)
        .into_iter()
        .find(|i| i.is_up)
        .map(|i| i.name)
}

/// Gateway address from the default route, if any.
pub fn default_gateway(runner: &dyn CommandRunner) -> Option<String> {
    let spec = CommandSpec::new("ip", &["-4", "route", "show", "default"]);
    match runner.run(&spec) {
        Ok(out) if out.status.is_success() => parse_default_route_via(&out.stdout),
        _ => None,
    }
}

pub fn parse_default_route_dev(output: &str) -> Option<String> {
    DEFAULT_ROUTE_DEV
        .captures(output)
        .map(|cap| cap[1].to_string())
}

pub fn parse_default_route_via(output: &str) -> Option<String> {
    DEFAULT_ROUTE_VIA
        .captures(output)
        .map(|cap| cap[1].to_string())
}

/// Nameservers from resolv.conf.
pub fn dns_servers() -> Vec<String> {
    dns_servers_from(Path::new(RESOLV_CONF))
}

pub fn dns_servers_from(path: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("nameserver")
                .map(|rest| rest.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect()
}
