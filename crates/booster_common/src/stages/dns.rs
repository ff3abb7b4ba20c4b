//! DNS stage: per-link resolver selection through systemd-resolved.
//!
//! `resolvectl revert` restores the link's DNS configuration from the
//! network manager, which makes it the natural inverse for the whole
//! stage regardless of what was set before.

use super::{RevertAction, StageAction, StageBackend, StageContext, StageName};
use crate::command_exec::{CommandRunner, CommandSpec};
use crate::error::BoostError;
use crate::levels::DnsProfile;

pub struct DnsStage;

impl StageBackend for DnsStage {
    fn name(&self) -> StageName {
        StageName::Dns
    }

    fn plan(
        &self,
        _runner: &dyn CommandRunner,
        ctx: &StageContext,
    ) -> Result<Vec<StageAction>, BoostError> {
        let profile = DnsProfile::for_level(ctx.level);

        let mut args: Vec<&str> = vec!["dns", &ctx.interface];
        args.extend(profile.servers);

        Ok(vec![StageAction {
            description: format!(
                "point {} DNS at {}",
                ctx.interface,
                profile.servers.join(", ")
            ),
            forward: CommandSpec::new("resolvectl", &args),
            inverse: Some(RevertAction {
                description: format!("restore {} per-link DNS", ctx.interface),
                command: CommandSpec::new("resolvectl", &["revert", &ctx.interface]),
            }),
        }])
    }
}
