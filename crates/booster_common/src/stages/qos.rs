//! QoS stage: HTB traffic shaping tree with priority-port steering.
//!
//! The whole tree hangs off one root qdisc, so deleting that root is
//! the only inverse the stage needs; classes and filters go with it.

use super::{RevertAction, StageAction, StageBackend, StageContext, StageName};
use crate::command_exec::{CommandRunner, CommandSpec};
use crate::error::BoostError;
use crate::levels::QosProfile;

pub struct QosStage;

/// (classid, rate, ceil, prio) for the three HTB classes.
const HTB_CLASSES: [(&str, &str, &str, &str); 3] = [
    ("1:10", "1mbit", "10mbit", "0"),
    ("1:20", "5mbit", "20mbit", "1"),
    ("1:30", "10mbit", "100mbit", "2"),
];

impl StageBackend for QosStage {
    fn name(&self) -> StageName {
        StageName::Qos
    }

    fn plan(
        &self,
        _runner: &dyn CommandRunner,
        ctx: &StageContext,
    ) -> Result<Vec<StageAction>, BoostError> {
        let profile = QosProfile::for_level(ctx.level);
        if !profile.enabled {
            return Ok(Vec::new());
        }
        let dev = ctx.interface.as_str();

        let mut actions = vec![StageAction {
            description: format!("install HTB root qdisc on {}", dev),
            forward: CommandSpec::new(
                "tc",
                &["qdisc", "add", "dev", dev, "root", "handle", "1:", "htb", "default", "30"],
            ),
            inverse: Some(RevertAction {
                description: format!("remove HTB qdisc tree from {}", dev),
                command: CommandSpec::new("tc", &["qdisc", "del", "dev", dev, "root"]),
            }),
        }];

        for (classid, rate, ceil, prio) in HTB_CLASSES {
            actions.push(StageAction {
                description: format!("add QoS class {} ({}/{})", classid, rate, ceil),
                forward: CommandSpec::new(
                    "tc",
                    &[
                        "class", "add", "dev", dev, "parent", "1:", "classid", classid, "htb",
                        "rate", rate, "ceil", ceil, "prio", prio,
                    ],
                ),
                // Removed together with the root qdisc.
                inverse: None,
            });
        }

        for port in profile.priority_ports {
            let port_arg = port.to_string();
            actions.push(StageAction {
                description: format!("steer dport {} into the priority class", port),
                forward: CommandSpec::new(
                    "tc",
                    &[
                        "filter", "add", "dev", dev, "protocol", "ip", "parent", "1:", "prio",
                        "1", "u32", "match", "ip", "dport", &port_arg, "0xffff", "flowid", "1:10",
                    ],
                ),
                inverse: None,
            });
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
    fn test_light_level_leaves_qdisc_tree_alone() {
        let mock = MockRunner::new();
        let actions = QosStage.plan(&mock, &ctx(OptimizationLevel::Light)).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_standard_builds_tree_without_port_filters() {
        let mock = MockRunner::new();
        let actions = QosStage.plan(&mock, &ctx(OptimizationLevel::Standard)).unwrap();

        // Root qdisc + three classes.
        assert_eq!(actions.len(), 4);
        assert!(actions[0].forward.to_string().contains("htb default 30"));
        assert!(!actions.iter().any(|a| a.forward.to_string().contains("filter")));
    }

    #[test]
    fn test_extreme_steers_priority_ports() {
        let mock = MockRunner::new();
        let actions = QosStage.plan(&mock, &ctx(OptimizationLevel::Extreme)).unwrap();

        let filters: Vec<&StageAction> = actions
            .iter()
            .filter(|a| a.forward.to_string().contains("filter add"))
            .collect();
        assert_eq!(filters.len(), 5);
        assert!(filters
            .iter()
            .any(|a| a.forward.to_string().contains("dport 443")));
    }

    #[test]
    fn test_only_root_qdisc_carries_the_inverse() {
        let mock = MockRunner::new();
        let actions = QosStage.plan(&mock, &ctx(OptimizationLevel::Aggressive)).unwrap();

        assert!(actions[0].inverse.is_some());
        assert!(actions[1..].iter().all(|a| a.inverse.is_none()));
        assert_eq!(
            actions[0].inverse.as_ref().unwrap().command.to_string(),
            "tc qdisc del dev eth0 root"
        );
    }
}
