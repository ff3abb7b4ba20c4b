//! System stage: host-wide queueing and connection limits.

use super::{sysctl_set, RevertAction, StageAction, StageBackend, StageContext, StageName};
use crate::command_exec::{CommandRunner, CommandSpec};
use crate::error::BoostError;
use crate::levels::SystemProfile;
use std::fs;

pub struct SystemStage;

impl StageBackend for SystemStage {
    fn name(&self) -> StageName {
        StageName::System
    }

    fn plan(
        &self,
        runner: &dyn CommandRunner,
        ctx: &StageContext,
    ) -> Result<Vec<StageAction>, BoostError> {
        let profile = SystemProfile::for_level(ctx.level);
        let dev = ctx.interface.as_str();

        let current_qlen = fs::read_to_string(ctx.sys_net.join(dev).join("tx_queue_len"))
            .ok()
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "1000".to_string());
        let new_qlen = profile.txqueuelen.to_string();

        let mut actions = vec![
            StageAction {
                description: format!("set {} txqueuelen to {}", dev, new_qlen),
                forward: CommandSpec::new("ip", &["link", "set", "dev", dev, "txqueuelen", &new_qlen]),
                inverse: Some(RevertAction {
                    description: format!("restore {} txqueuelen to {}", dev, current_qlen),
                    command: CommandSpec::new(
                        "ip",
                        &["link", "set", "dev", dev, "txqueuelen", &current_qlen],
                    ),
                }),
            },
            sysctl_set(
                runner,
                "net.core.netdev_max_backlog",
                &profile.netdev_max_backlog.to_string(),
            )?,
        ];

        if let Some(somaxconn) = profile.somaxconn {
            actions.push(sysctl_set(runner, "net.core.somaxconn", &somaxconn.to_string())?);
        }
        if let Some(file_max) = profile.file_max {
            actions.push(sysctl_set(runner, "fs.file-max", &file_max.to_string())?);
        }
        if profile.widen_port_range {
            actions.push(sysctl_set(
                runner,
                "net.ipv4.ip_local_port_range",
                "1024 65535",
            )?);
        }

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::testing::MockRunner;
    use crate::levels::OptimizationLevel;
    use std::path::Path;
    use tempfile::TempDir;

    fn ctx_with_sysfs(level: OptimizationLevel, base: &Path) -> StageContext {
        StageContext {
            interface: "eth0".to_string(),
            wireless: false,
            level,
            sys_net: base.to_path_buf(),
        }
    }

    #[test]
    fn test_txqueuelen_inverse_uses_current_sysfs_value() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("eth0")).unwrap();
        fs::write(temp.path().join("eth0/tx_queue_len"), "1500\n").unwrap();

        let mock = MockRunner::new();
        mock.respond("sysctl -n", "1000\n");

        let actions = SystemStage
            .plan(&mock, &ctx_with_sysfs(OptimizationLevel::Standard, temp.path()))
            .unwrap();

        assert_eq!(
            actions[0].forward.to_string(),
            "ip link set dev eth0 txqueuelen 2000"
        );
        assert_eq!(
            actions[0].inverse.as_ref().unwrap().command.to_string(),
            "ip link set dev eth0 txqueuelen 1500"
        );
    }

    #[test]
    fn test_unreadable_txqueuelen_falls_back_to_kernel_default() {
        let temp = TempDir::new().unwrap();
        let mock = MockRunner::new();
        mock.respond("sysctl -n", "1000\n");

        let actions = SystemStage
            .plan(&mock, &ctx_with_sysfs(OptimizationLevel::Light, temp.path()))
            .unwrap();
        assert!(actions[0]
            .inverse
            .as_ref()
            .unwrap()
            .command
            .to_string()
            .ends_with("txqueuelen 1000"));
    }

    #[test]
    fn test_extreme_adds_limits_and_port_range() {
        let temp = TempDir::new().unwrap();
        let mock = MockRunner::new();
        mock.respond("sysctl -n", "1000\n");

        let actions = SystemStage
            .plan(&mock, &ctx_with_sysfs(OptimizationLevel::Extreme, temp.path()))
            .unwrap();
        let commands: Vec<String> = actions.iter().map(|a| a.forward.to_string()).collect();

        assert!(commands.iter().any(|c| c.contains("somaxconn=4096")));
        assert!(commands.iter().any(|c| c.contains("fs.file-max=65535")));
        assert!(commands
            .iter()
            .any(|c| c.contains("ip_local_port_range=1024 65535")));
    }

    #[test]
    fn test_light_skips_optional_limits() {
        let temp = TempDir::new().unwrap();
        let mock = MockRunner::new();
        mock.respond("sysctl -n", "1000\n");

        let actions = SystemStage
            .plan(&mock, &ctx_with_sysfs(OptimizationLevel::Light, temp.path()))
            .unwrap();
        assert_eq!(actions.len(), 2);
    }
}
