//! `info`: system and network snapshot. Read-only.

use crate::output;
use anyhow::Result;
use booster_common::config::BoosterConfig;
use booster_common::interfaces;
use booster_common::quality::format_signal;
use owo_colors::OwoColorize;
use sysinfo::System;

pub fn run() -> Result<()> {
    let config = BoosterConfig::load();
    let (runner, probe) = super::probe_setup(&config);

    output::header(&format!("signal-booster v{}", booster_common::VERSION));

    let mut sys = System::new_all();
    sys.refresh_memory();
    output::section("host");
    output::print_kv(
        "os",
        &format!(
            "{} {}",
            System::name().unwrap_or_else(|| "unknown".to_string()),
            System::os_version().unwrap_or_default()
        ),
    );
    output::print_kv(
        "kernel",
        &System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
    );
    output::print_kv(
        "hostname",
        &System::host_name().unwrap_or_else(|| "unknown".to_string()),
    );
    output::print_kv("uptime", &format_uptime(System::uptime()));
    output::print_kv(
        "memory",
        &format!(
            "{:.1} GiB used / {:.1} GiB total",
            sys.used_memory() as f64 / GIB,
            sys.total_memory() as f64 / GIB
        ),
    );

    output::section("interfaces");
    let list = interfaces::list_interfaces(runner.as_ref());
    if list.is_empty() {
        output::print_kv("none", "no network interfaces found");
    }
    for iface in &list {
        let kind = if iface.is_wireless { "wifi" } else { "ethernet" };
        let state = if iface.is_up {
            "up".green().to_string()
        } else {
            "down".red().to_string()
        };
        let speed = iface
            .speed_mbps
            .map(|s| format!("{} Mbps", s))
            .unwrap_or_else(|| "-".to_string());
        let addrs = if iface.ipv4_addresses.is_empty() {
            "-".to_string()
        } else {
            iface.ipv4_addresses.join(", ")
        };
        output::print_kv(
            &iface.name,
            &format!(
                "{}  {}  link {}  mtu {}  {}",
                kind,
                state,
                speed,
                iface.mtu.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string()),
                addrs
            ),
        );
    }

    output::section("routing and dns");
    let active = interfaces::active_interface(runner.as_ref());
    match &active {
        Some(name) => {
            let wireless = list
                .iter()
                .find(|i| &i.name == name)
                .map(|i| i.is_wireless)
                .unwrap_or(false);
            let signal = probe.signal_strength(name, wireless);
            output::print_kv(
                "active interface",
                &format!("{} ({})", name, format_signal(signal)),
            );
        }
        None => output::print_kv("active interface", "none"),
    }
    output::print_kv(
        "gateway",
        &interfaces::default_gateway(runner.as_ref()).unwrap_or_else(|| "-".to_string()),
    );
    let dns = interfaces::dns_servers();
    output::print_kv(
        "dns servers",
        &if dns.is_empty() {
            "-".to_string()
        } else {
            dns.join(", ")
        },
    );

    output::footer();
    Ok(())
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(90), "0h 1m");
        assert_eq!(format_uptime(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_uptime(2 * 86_400 + 3600), "2d 1h 0m");
    }
}
