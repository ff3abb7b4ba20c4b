//! Command handlers.

pub mod info;
pub mod start;

use booster_common::command_exec::{CommandRunner, SystemRunner};
use booster_common::config::BoosterConfig;
use booster_common::probe::SystemProbe;
use std::sync::Arc;

/// Runner and probe wired the same way for every command.
pub(crate) fn probe_setup(config: &BoosterConfig) -> (Arc<dyn CommandRunner>, Arc<SystemProbe>) {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let probe = Arc::new(SystemProbe::new(
        runner.clone(),
        &config.probe.ping_target,
        config.probe.effective_ping_count(),
    ));
    (runner, probe)
}
