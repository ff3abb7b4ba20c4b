//! WiFi stage: power saving and transmit power on the wireless adapter.
//!
//! On a wired connection the stage has nothing to do and plans an empty
//! action list; the session records it as a success with no revert plan.

use super::{RevertAction, StageAction, StageBackend, StageContext, StageName};
use crate::command_exec::{CommandRunner, CommandSpec};
use crate::error::BoostError;
use crate::levels::{TxPower, WifiProfile};

pub struct WifiStage;

impl StageBackend for WifiStage {
    fn name(&self) -> StageName {
        StageName::Wifi
    }

    fn plan(
        &self,
        runner: &dyn CommandRunner,
        ctx: &StageContext,
    ) -> Result<Vec<StageAction>, BoostError> {
        if !ctx.wireless {
            return Ok(Vec::new());
        }
        let profile = WifiProfile::for_level(ctx.level);
        let dev = ctx.interface.as_str();
        let mut actions = Vec::new();

        if profile.disable_power_save {
            let previous = current_power_save(runner, dev);
            actions.push(StageAction {
                description: format!("disable power saving on {}", dev),
                forward: CommandSpec::new("iw", &["dev", dev, "set", "power_save", "off"]),
                inverse: Some(RevertAction {
                    description: format!("restore power saving '{}' on {}", previous, dev),
                    command: CommandSpec::new("iw", &["dev", dev, "set", "power_save", previous]),
                }),
            });
        }

        if profile.txpower != TxPower::Auto {
            let mut args = vec!["dev", dev, "set", "txpower"];
            args.extend(profile.txpower.iw_args());
            actions.push(StageAction {
                description: format!("raise transmit power on {}", dev),
                forward: CommandSpec::new("iw", &args),
                // Drivers expose no readable txpower setting; auto is the
                // regulatory default every adapter starts from.
                inverse: Some(RevertAction {
                    description: format!("return {} txpower to auto", dev),
                    command: CommandSpec::new("iw", &["dev", dev, "set", "txpower", "auto"]),
                }),
            });
        }

        Ok(actions)
    }
}

/// Current power_save state ("on"/"off") for the inverse; drivers that
/// cannot report it are assumed to default to on.
fn current_power_save(runner: &dyn CommandRunner, dev: &str) -> &'static str {
    let spec = CommandSpec::new("iw", &["dev", dev, "get", "power_save"]);
    match runner.run(&spec) {
        Ok(out) if out.status.is_success() && out.stdout.to_lowercase().contains("off") => "off",
        _ => "on",
    }
}
