//! Optimization stages and the apply/revert engine.
//!
//! Each stage backend plans a list of forward commands paired with the
//! inverse commands that undo them. Inverses are captured against the
//! current system state BEFORE anything runs, so every successful stage
//! carries a complete [`RevertPlan`]. The engine executes the plan,
//! compensates immediately when a command fails mid-stage, and replays
//! the inverses for rollback.

mod dns;
mod qos;
mod system;
mod tcp;
mod wifi;

pub use dns::DnsStage;
pub use qos::QosStage;
pub use system::SystemStage;
pub use tcp::TcpStage;
pub use wifi::WifiStage;

use crate::command_exec::{CommandRunner, CommandSpec};
use crate::error::BoostError;
use crate::levels::OptimizationLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One discrete category of network optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Tcp,
    Dns,
    Qos,
    Wifi,
    System,
}

impl StageName {
    /// Fixed application order. Later stages may depend on earlier
    /// settings (QoS classes reference the queue settings the TCP and
    /// system stages touch), so this order is part of the contract.
    pub const APPLY_ORDER: [StageName; 5] = [
        StageName::Tcp,
        StageName::Dns,
        StageName::Qos,
        StageName::Wifi,
        StageName::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Tcp => "tcp",
            StageName::Dns => "dns",
            StageName::Qos => "qos",
            StageName::Wifi => "wifi",
            StageName::System => "system",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compensating action: the command that undoes one applied change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertAction {
    pub description: String,
    pub command: CommandSpec,
}

/// Ordered compensating actions for one stage.
///
/// Actions are stored in execution order for rollback, i.e. the reverse
/// of the order the forward commands ran in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevertPlan {
    pub actions: Vec<RevertAction>,
}

impl RevertPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Rollback state of one stage result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertStatus {
    NotAttempted,
    Reverted,
    Failed,
}

/// Outcome of applying one stage, including everything needed to undo it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageName,
    pub applied_at: DateTime<Utc>,
    /// Captured before mutation; sufficient to fully reverse the stage.
    pub revert_plan: RevertPlan,
    pub success: bool,
    pub error: Option<String>,
    pub revert_status: RevertStatus,
}

impl StageResult {
    fn failed(stage: StageName, error: String) -> Self {
        StageResult {
            stage,
            applied_at: Utc::now(),
            revert_plan: RevertPlan::default(),
            success: false,
            error: Some(error),
            revert_status: RevertStatus::NotAttempted,
        }
    }
}

/// Environment one stage plans against.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Interface behind the default route.
    pub interface: String,
    pub wireless: bool,
    pub level: OptimizationLevel,
    /// sysfs network class directory; overridable for tests.
    pub sys_net: PathBuf,
}

/// One planned change: a forward command and, where the change is
/// reversible, the inverse that undoes it.
#[derive(Debug, Clone)]
pub struct StageAction {
    pub description: String,
    pub forward: CommandSpec,
    /// None for commands swept away by an earlier inverse (QoS classes
    /// vanish with their qdisc tree).
    pub inverse: Option<RevertAction>,
}

/// A named optimization backend for one platform.
pub trait StageBackend: Send + Sync {
    fn name(&self) -> StageName;

    /// Build the action list for the current system state. Performs
    /// read-only queries through the runner to capture inverses; must
    /// not mutate anything.
    fn plan(
        &self,
        runner: &dyn CommandRunner,
        ctx: &StageContext,
    ) -> Result<Vec<StageAction>, BoostError>;
}

/// Backends for the running platform, in no particular order.
///
/// Selected once at startup; stage logic never re-inspects the OS.
/// Non-Linux builds get an empty set and every stage reports
/// `UnsupportedPlatform`.
pub fn backends_for_platform() -> Vec<Box<dyn StageBackend>> {
    #[cfg(target_os = "linux")]
    {
        vec![
            Box::new(TcpStage),
            Box::new(DnsStage),
            Box::new(QosStage),
            Box::new(WifiStage),
            Box::new(SystemStage),
        ]
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

/// Read-only preview of what one stage would do, for the `test` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryCheck {
    pub stage: StageName,
    pub supported: bool,
    /// Descriptions of the planned actions.
    pub actions: Vec<String>,
    pub error: Option<String>,
}

impl DryCheck {
    pub fn unsupported(stage: StageName) -> Self {
        DryCheck {
            stage,
            supported: false,
            actions: Vec::new(),
            error: None,
        }
    }
}

/// Executes stage plans and their rollbacks.
pub struct StageRunner {
    runner: Arc<dyn CommandRunner>,
}

impl StageRunner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        StageRunner { runner }
    }

    /// Apply one stage. Atomic from the caller's viewpoint: when a
    /// command fails mid-stage, the already-executed commands of that
    /// stage are compensated before the failure is reported, so no
    /// partial stage mutation stays visible.
    pub fn apply(&self, backend: &dyn StageBackend, ctx: &StageContext) -> StageResult {
        let stage = backend.name();
        let actions = match backend.plan(self.runner.as_ref(), ctx) {
            Ok(actions) => actions,
            Err(e) => {
                warn!(stage = %stage, error = %e, "stage planning failed");
                return StageResult::failed(stage, format!("planning failed: {}", e));
            }
        };

        let mut executed_inverses: Vec<RevertAction> = Vec::new();
        for action in &actions {
            debug!(stage = %stage, command = %action.forward, "applying");
            let outcome = match self.runner.run(&action.forward) {
                Ok(out) => out,
                Err(e) => {
                    self.compensate(stage, &executed_inverses);
                    return StageResult::failed(
                        stage,
                        format!("{}: {}", action.description, e),
                    );
                }
            };
            if !outcome.status.is_success() {
                self.compensate(stage, &executed_inverses);
                return StageResult::failed(
                    stage,
                    format!("{}: {}", action.description, outcome.failure_reason()),
                );
            }
            if let Some(inverse) = &action.inverse {
                executed_inverses.push(inverse.clone());
            }
        }

        // Stored in rollback execution order: undo last change first.
        executed_inverses.reverse();
        info!(stage = %stage, actions = actions.len(), "stage applied");
        StageResult {
            stage,
            applied_at: Utc::now(),
            revert_plan: RevertPlan {
                actions: executed_inverses,
            },
            success: true,
            error: None,
            revert_status: RevertStatus::NotAttempted,
        }
    }

    /// Restore the settings a stage changed. Idempotent: reverting an
    /// already-reverted result is a no-op returning `Ok(true)`.
    /// Returns `Ok(false)` when one or more compensating commands
    /// failed; the result is marked [`RevertStatus::Failed`] so the
    /// caller can report exactly what remains changed.
    pub fn revert(&self, result: &mut StageResult) -> Result<bool, BoostError> {
        if result.revert_status == RevertStatus::Reverted {
            return Ok(true);
        }
        if !result.success || result.revert_plan.is_empty() {
            result.revert_status = RevertStatus::Reverted;
            return Ok(true);
        }

        let mut all_ok = true;
        for action in &result.revert_plan.actions {
            debug!(stage = %result.stage, command = %action.command, "reverting");
            match self.runner.run(&action.command) {
                Ok(out) if out.status.is_success() => {}
                Ok(out) => {
                    error!(
                        stage = %result.stage,
                        action = %action.description,
                        reason = %out.failure_reason(),
                        "revert command failed"
                    );
                    all_ok = false;
                }
                Err(e) => {
                    error!(
                        stage = %result.stage,
                        action = %action.description,
                        error = %e,
                        "revert command failed"
                    );
                    all_ok = false;
                }
            }
        }

        if all_ok {
            result.revert_status = RevertStatus::Reverted;
            info!(stage = %result.stage, "stage reverted");
            Ok(true)
        } else {
            result.revert_status = RevertStatus::Failed;
            Ok(false)
        }
    }

    /// Preview one stage without mutating: plan and report the action
    /// descriptions.
    pub fn dry_check(&self, backend: &dyn StageBackend, ctx: &StageContext) -> DryCheck {
        match backend.plan(self.runner.as_ref(), ctx) {
            Ok(actions) => DryCheck {
                stage: backend.name(),
                supported: true,
                actions: actions.iter().map(|a| a.description.clone()).collect(),
                error: None,
            },
            Err(e) => DryCheck {
                stage: backend.name(),
                supported: true,
                actions: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Undo the already-executed part of a stage that failed mid-way.
    fn compensate(&self, stage: StageName, executed: &[RevertAction]) {
        for action in executed.iter().rev() {
            match self.runner.run(&action.command) {
                Ok(out) if out.status.is_success() => {}
                Ok(out) => error!(
                    stage = %stage,
                    action = %action.description,
                    reason = %out.failure_reason(),
                    "compensation failed"
                ),
                Err(e) => error!(
                    stage = %stage,
                    action = %action.description,
                    error = %e,
                    "compensation failed"
                ),
            }
        }
    }
}

/// Build a reversible `sysctl -w key=value` action, capturing the
/// current value as the inverse.
pub(crate) fn sysctl_set(
    runner: &dyn CommandRunner,
    key: &str,
    value: &str,
) -> Result<StageAction, BoostError> {
    let current = read_sysctl(runner, key)?;
    Ok(StageAction {
        description: format!("set {} = {}", key, value),
        forward: CommandSpec::new("sysctl", &["-w", &format!("{}={}", key, value)]),
        inverse: Some(RevertAction {
            description: format!("restore {} = {}", key, current),
            command: CommandSpec::new("sysctl", &["-w", &format!("{}={}", key, current)]),
        }),
    })
}

/// Current value of one sysctl key.
pub(crate) fn read_sysctl(runner: &dyn CommandRunner, key: &str) -> Result<String, BoostError> {
    let out = runner.run(&CommandSpec::new("sysctl", &["-n", key]))?;
    if !out.status.is_success() {
        return Err(BoostError::ProbeUnavailable(format!(
            "cannot read current value of {}: {}",
            key,
            out.failure_reason()
        )));
    }
    Ok(out.stdout.trim().to_string())
}
