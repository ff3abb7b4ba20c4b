//! TCP stack stage: socket buffers, backlog, congestion control.

use super::{read_sysctl, sysctl_set, StageAction, StageBackend, StageContext, StageName};
use crate::command_exec::CommandRunner;
use crate::error::BoostError;
use crate::levels::{TcpProfile, TCP_RMEM_EXTREME, TCP_WMEM_EXTREME};
use tracing::debug;

pub struct TcpStage;

impl StageBackend for TcpStage {
    fn name(&self) -> StageName {
        StageName::Tcp
    }

    fn plan(
        &self,
        runner: &dyn CommandRunner,
        ctx: &StageContext,
    ) -> Result<Vec<StageAction>, BoostError> {
        let profile = TcpProfile::for_level(ctx.level);
        let window = profile.window_bytes.to_string();

        let mut actions = vec![
            sysctl_set(runner, "net.core.rmem_max", &window)?,
            sysctl_set(runner, "net.core.wmem_max", &window)?,
            sysctl_set(
                runner,
                "net.ipv4.tcp_max_syn_backlog",
                &profile.syn_backlog.to_string(),
            )?,
        ];

        // The preferred algorithm may not be compiled into this kernel;
        // fall back to cubic rather than failing the stage.
        let available = read_sysctl(runner, "net.ipv4.tcp_available_congestion_control")?;
        let algorithm = if available.split_whitespace().any(|a| a == profile.congestion) {
            profile.congestion
        } else {
            debug!(
                preferred = profile.congestion,
                "congestion algorithm unavailable, using cubic"
            );
            "cubic"
        };
        actions.push(sysctl_set(
            runner,
            "net.ipv4.tcp_congestion_control",
            algorithm,
        )?);

        if profile.fastopen {
            actions.push(sysctl_set(runner, "net.ipv4.tcp_window_scaling", "1")?);
            actions.push(sysctl_set(runner, "net.ipv4.tcp_fastopen", "3")?);
        }
        if profile.keep_window_after_idle {
            actions.push(sysctl_set(
                runner,
                "net.ipv4.tcp_slow_start_after_idle",
                "0",
            )?);
        }
        if profile.tune_mem_triples {
            actions.push(sysctl_set(runner, "net.ipv4.tcp_rmem", TCP_RMEM_EXTREME)?);
            actions.push(sysctl_set(runner, "net.ipv4.tcp_wmem", TCP_WMEM_EXTREME)?);
        }

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::testing::MockRunner;
    use crate::levels::OptimizationLevel;
    use std::path::PathBuf;

    fn ctx(level: OptimizationLevel) -> StageContext {
        StageContext {
            interface: "eth0".to_string(),
            wireless: false,
            level,
            sys_net: PathBuf::from("/tmp/none"),
        }
    }

    #[test]
    fn test_standard_plan_touches_core_tunables_only() {
        let mock = MockRunner::new();
        mock.respond("sysctl -n net.ipv4.tcp_available_congestion_control", "reno cubic bbr\n");
        mock.respond("sysctl -n", "4096\n");

        let actions = TcpStage.plan(&mock, &ctx(OptimizationLevel::Standard)).unwrap();
        let commands: Vec<String> = actions.iter().map(|a| a.forward.to_string()).collect();

        assert_eq!(actions.len(), 4);
        assert!(commands[0].contains("net.core.rmem_max=131072"));
        assert!(commands[3].contains("tcp_congestion_control=cubic"));
        assert!(!commands.iter().any(|c| c.contains("tcp_fastopen")));
    }

    #[test]
    fn test_extreme_plan_adds_memory_triples() {
        let mock = MockRunner::new();
        mock.respond("sysctl -n net.ipv4.tcp_available_congestion_control", "reno cubic bbr\n");
        mock.respond("sysctl -n", "4096 87380 6291456\n");

        let actions = TcpStage.plan(&mock, &ctx(OptimizationLevel::Extreme)).unwrap();
        let commands: Vec<String> = actions.iter().map(|a| a.forward.to_string()).collect();

        assert!(commands.iter().any(|c| c.contains("tcp_congestion_control=bbr")));
        assert!(commands.iter().any(|c| c.contains("tcp_fastopen=3")));
        assert!(commands.iter().any(|c| c.contains("tcp_rmem=4096 87380 16777216")));
        assert!(commands.iter().any(|c| c.contains("tcp_slow_start_after_idle=0")));
    }

    #[test]
    fn test_bbr_falls_back_to_cubic_when_unavailable() {
        let mock = MockRunner::new();
        mock.respond("sysctl -n net.ipv4.tcp_available_congestion_control", "reno cubic\n");
        mock.respond("sysctl -n", "4096\n");

        let actions = TcpStage.plan(&mock, &ctx(OptimizationLevel::Aggressive)).unwrap();
        assert!(actions
            .iter()
            .any(|a| a.forward.to_string().contains("tcp_congestion_control=cubic")));
    }

    #[test]
    fn test_every_action_has_an_inverse() {
        let mock = MockRunner::new();
        mock.respond("sysctl -n net.ipv4.tcp_available_congestion_control", "cubic bbr\n");
        mock.respond("sysctl -n", "262144\n");

        let actions = TcpStage.plan(&mock, &ctx(OptimizationLevel::Extreme)).unwrap();
        assert!(actions.iter().all(|a| a.inverse.is_some()));
    }
}
