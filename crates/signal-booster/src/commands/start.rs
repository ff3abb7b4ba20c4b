//! `start`: run an optimization session until the user stops it.

use crate::monitor_view;
use crate::output;
use anyhow::Result;
use booster_common::config::BoosterConfig;
use booster_common::journal::JournalStore;
use booster_common::monitor::MonitorReporter;
use booster_common::session::{RollbackReport, SessionConfig, SessionController, SessionRegistry};
use booster_common::stages::{backends_for_platform, RevertStatus, StageName};
use booster_common::{privilege, BoostError, OptimizationLevel, Session};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct StartArgs {
    pub target_speed: Option<f64>,
    pub level: Option<OptimizationLevel>,
    pub aggressive: bool,
    pub monitor: bool,
}

/// `--aggressive` is shorthand for `--level aggressive`; giving both
/// with different values is a contradiction, not a tie to break.
pub fn resolve_level(
    level: Option<OptimizationLevel>,
    aggressive: bool,
    default: OptimizationLevel,
) -> Result<OptimizationLevel, BoostError> {
    match (level, aggressive) {
        (Some(level), true) if level != OptimizationLevel::Aggressive => {
            Err(BoostError::InvalidConfig(format!(
                "--aggressive conflicts with --level {}",
                level
            )))
        }
        (Some(level), _) => Ok(level),
        (None, true) => Ok(OptimizationLevel::Aggressive),
        (None, false) => Ok(default),
    }
}

pub async fn run(args: StartArgs) -> Result<()> {
    let config = BoosterConfig::load();
    let level = resolve_level(args.level, args.aggressive, config.optimize.default_level)?;
    let (runner, probe) = super::probe_setup(&config);

    let registry = Arc::new(SessionRegistry::new());
    let mut controller = SessionController::new(
        runner,
        probe.clone(),
        backends_for_platform(),
        registry,
        JournalStore::new(),
        privilege::effective_root(),
    );

    let session_config = SessionConfig {
        level,
        target_speed_mbps: args.target_speed,
        monitor_enabled: args.monitor,
    };

    let bar = ProgressBar::new(StageName::APPLY_ORDER.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("  {bar:30.cyan/blue} {pos}/{len} {msg}")
            .expect("static progress template"),
    );

    let started = {
        let bar = bar.clone();
        let observer = move |stage: StageName, _result: &booster_common::StageResult| {
            bar.set_message(stage.to_string());
            bar.inc(1);
        };
        tokio::task::block_in_place(|| controller.start(session_config, Some(&observer)))
    };
    bar.finish_and_clear();

    let session = match started {
        Ok(session) => session,
        Err(err) => {
            if let Some(last) = controller.last_session() {
                print_stage_table(last);
            }
            return Err(err.into());
        }
    };

    output::header(&format!("signal-booster v{}", booster_common::VERSION));
    output::print_kv("session", &session.id.to_string());
    output::print_kv("level", level.as_str());
    if let Some(target) = session.target_speed_mbps {
        output::print_kv("target speed", &format!("{:.0} Mbps", target));
    }
    print_stage_table(&session);
    output::footer();

    if args.monitor {
        let (tx, rx) = mpsc::channel(32);
        let reporter = MonitorReporter::start(
            probe,
            config.monitor.effective_interval(),
            config.monitor.effective_max_failures(),
            tx,
        );
        monitor_view::run(rx, &session).await?;
        reporter.stop().await;
    } else {
        println!(
            "Optimizations active. Press {} to stop and roll back.",
            "Ctrl+C".bold()
        );
        tokio::signal::ctrl_c().await?;
        println!();
    }

    let (stopped, report) = tokio::task::block_in_place(|| controller.stop())?;
    print_rollback_report(&stopped, &report);
    if !report.clean() {
        anyhow::bail!(
            "{} stage(s) could not be reverted; the journal under {} records what remains changed",
            report.failed.len(),
            booster_common::paths::state_dir().display()
        );
    }
    Ok(())
}

fn print_stage_table(session: &Session) {
    output::section("stages");
    for result in &session.stages {
        let status = if result.success {
            "applied".green().to_string()
        } else {
            format!(
                "{}: {}",
                "failed".red(),
                result.error.as_deref().unwrap_or("unknown")
            )
        };
        let revert = match result.revert_status {
            RevertStatus::NotAttempted => String::new(),
            RevertStatus::Reverted => format!("  ({})", "reverted".yellow()),
            RevertStatus::Failed => format!("  ({})", "revert FAILED".red().bold()),
        };
        output::print_kv(result.stage.as_str(), &format!("{}{}", status, revert));
    }
}

fn print_rollback_report(session: &Session, report: &RollbackReport) {
    if report.clean() {
        println!(
            "{} all {} applied stage(s) reverted, previous settings restored",
            "ok:".green().bold(),
            report.reverted.len()
        );
    } else {
        println!("{}", "rollback incomplete:".red().bold());
        print_stage_table(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level_prefers_explicit_flag() {
        assert_eq!(
            resolve_level(Some(OptimizationLevel::Extreme), false, OptimizationLevel::Standard)
                .unwrap(),
            OptimizationLevel::Extreme
        );
    }

    #[test]
    fn test_resolve_level_aggressive_shorthand() {
        assert_eq!(
            resolve_level(None, true, OptimizationLevel::Standard).unwrap(),
            OptimizationLevel::Aggressive
        );
        // Redundant but consistent flags are fine.
        assert_eq!(
            resolve_level(Some(OptimizationLevel::Aggressive), true, OptimizationLevel::Light)
                .unwrap(),
            OptimizationLevel::Aggressive
        );
    }

    #[test]
    fn test_resolve_level_conflict_is_invalid_config() {
        let err =
            resolve_level(Some(OptimizationLevel::Light), true, OptimizationLevel::Standard)
                .unwrap_err();
        assert!(matches!(err, BoostError::InvalidConfig(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_resolve_level_falls_back_to_config_default() {
        assert_eq!(
            resolve_level(None, false, OptimizationLevel::Light).unwrap(),
            OptimizationLevel::Light
        );
    }
}
