//! Session lifecycle: validation, staged apply, rollback, recovery.
//!
//! One optimization run is a [`Session`]. The controller owns it
//! exclusively: it gates on privilege before touching anything, recovers
//! stale changes from a previous unclean shutdown, applies the stages in
//! their fixed order while journaling every revert plan, and rolls
//! everything back on stage failure or on `stop()`.

use crate::command_exec::CommandRunner;
use crate::error::BoostError;
use crate::interfaces;
use crate::journal::{JournalStore, SessionJournal};
use crate::levels::OptimizationLevel;
use crate::metrics::Metrics;
use crate::probe::DiagnosticsProbe;
use crate::stages::{
    DryCheck, StageBackend, StageContext, StageName, StageResult, StageRunner,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Validated input for one `start` invocation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub level: OptimizationLevel,
    pub target_speed_mbps: Option<f64>,
    pub monitor_enabled: bool,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), BoostError> {
        if let Some(speed) = self.target_speed_mbps {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(BoostError::InvalidConfig(format!(
                    "target speed must be a positive number of Mbps, got {}",
                    speed
                )));
            }
        }
        Ok(())
    }
}

/// One user-initiated optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub level: OptimizationLevel,
    pub target_speed_mbps: Option<f64>,
    pub monitor_enabled: bool,
    pub started_at: DateTime<Utc>,
    /// Metrics sampled before any stage ran.
    pub baseline: Option<Metrics>,
    pub stages: Vec<StageResult>,
}

/// The single-session slot, with explicit acquire/release semantics.
///
/// Constructed in `main` and shared by reference; never an ambient
/// global.
#[derive(Default)]
pub struct SessionRegistry {
    slot: Mutex<Option<Uuid>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, id: Uuid) -> Result<(), BoostError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(BoostError::SessionAlreadyActive);
        }
        *slot = Some(id);
        Ok(())
    }

    /// Releasing with a stale id is a no-op; the active session keeps
    /// its slot.
    pub fn release(&self, id: Uuid) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if *slot == Some(id) {
            *slot = None;
        }
    }

    pub fn active(&self) -> Option<Uuid> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-stage outcome of a rollback pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackReport {
    pub reverted: Vec<StageName>,
    pub failed: Vec<StageName>,
}

impl RollbackReport {
    /// True when nothing remains changed on the system.
    pub fn clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Callback invoked after each stage transition, for progress display.
pub type StageObserver<'a> = &'a (dyn Fn(StageName, &StageResult) + Send + Sync);

/// Owns the lifecycle of one optimization run.
pub struct SessionController {
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn DiagnosticsProbe>,
    backends: Vec<Box<dyn StageBackend>>,
    registry: Arc<SessionRegistry>,
    journal: JournalStore,
    privileged: bool,
    sys_net: PathBuf,
    active: Option<Session>,
    last: Option<Session>,
}

impl SessionController {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn DiagnosticsProbe>,
        backends: Vec<Box<dyn StageBackend>>,
        registry: Arc<SessionRegistry>,
        journal: JournalStore,
        privileged: bool,
    ) -> Self {
        SessionController {
            runner,
            probe,
            backends,
            registry,
            journal,
            privileged,
            sys_net: PathBuf::from(interfaces::SYS_CLASS_NET),
            active: None,
            last: None,
        }
    }

    /// Point interface discovery at a fixture tree (for tests).
    pub fn with_sys_net(mut self, sys_net: &std::path::Path) -> Self {
        self.sys_net = sys_net.to_path_buf();
        self
    }

    /// Validate, recover stale changes, then apply every stage in the
    /// fixed order. On any stage failure all prior successful stages
    /// are reverted and the call fails with `PartialFailure`; the
    /// per-stage revert status is available via [`Self::last_session`].
    pub fn start(
        &mut self,
        config: SessionConfig,
        observer: Option<StageObserver<'_>>,
    ) -> Result<Session, BoostError> {
        config.validate()?;
        if !self.privileged {
            return Err(crate::privilege::denied("apply network optimizations"));
        }

        // Acquire the slot before recovery: a journal found while
        // another session holds the slot is live, not stale.
        let id = Uuid::new_v4();
        self.registry.acquire(id)?;
        if let Err(e) = self.recover_stale() {
            self.registry.release(id);
            return Err(e);
        }
        match self.run_stages(id, &config, observer) {
            Ok(session) => {
                info!(session = %id, level = %config.level, "session active");
                self.active = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                self.registry.release(id);
                Err(e)
            }
        }
    }

    /// Gracefully roll back the active session in reverse stage order.
    pub fn stop(&mut self) -> Result<(Session, RollbackReport), BoostError> {
        let Some(mut session) = self.active.take() else {
            return Err(BoostError::InvalidConfig(
                "no active session to stop".to_string(),
            ));
        };

        let runner = StageRunner::new(self.runner.clone());
        let report = rollback_stages(&runner, &mut session.stages);
        self.finish_journal(&session, &report)?;
        self.registry.release(session.id);
        info!(
            session = %session.id,
            reverted = report.reverted.len(),
            failed = report.failed.len(),
            "session stopped"
        );
        self.last = Some(session.clone());
        Ok((session, report))
    }

    /// The most recently finished session, including per-stage revert
    /// statuses after a `PartialFailure`.
    pub fn last_session(&self) -> Option<&Session> {
        self.last.as_ref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Per-stage dry checks for the `test` command: plan previews only,
    /// no mutation, no journal writes, no privilege needed.
    pub fn dry_checks(&self) -> Vec<DryCheck> {
        let ctx = self.stage_context().ok();
        let runner = StageRunner::new(self.runner.clone());

        StageName::APPLY_ORDER
            .iter()
            .map(|stage| match self.backend_for(*stage) {
                None => DryCheck::unsupported(*stage),
                Some(backend) => match &ctx {
                    Some(ctx) => runner.dry_check(backend, ctx),
                    None => DryCheck {
                        stage: *stage,
                        supported: true,
                        actions: Vec::new(),
                        error: Some("no active network interface".to_string()),
                    },
                },
            })
            .collect()
    }

    /// Replay the revert plans of a journal left behind by an unclean
    /// shutdown. Returns the recovered session id, if there was one.
    pub fn recover_stale(&self) -> Result<Option<Uuid>, BoostError> {
        let Some(mut stale) = self.journal.open_stale()? else {
            return Ok(None);
        };
        warn!(
            session = %stale.session_id,
            error = %BoostError::UncleanShutdown(format!(
                "session {} did not roll back; recovering",
                stale.session_id
            )),
            "stale journal found"
        );

        let runner = StageRunner::new(self.runner.clone());
        let report = rollback_stages(&runner, &mut stale.stages);
        if report.clean() {
            self.journal.close()?;
            info!(session = %stale.session_id, "stale changes recovered");
        } else {
            // Keep the journal so the remaining changes stay visible.
            self.journal.write(&stale)?;
            warn!(
                session = %stale.session_id,
                failed = ?report.failed,
                "recovery incomplete, journal kept"
            );
        }
        Ok(Some(stale.session_id))
    }

    fn run_stages(
        &mut self,
        id: Uuid,
        config: &SessionConfig,
        observer: Option<StageObserver<'_>>,
    ) -> Result<Session, BoostError> {
        if self.backends.is_empty() {
            return Err(BoostError::UnsupportedPlatform(
                "no optimization backends exist for this platform".to_string(),
            ));
        }

        let baseline = self.probe.sample()?;
        let mut ctx = self.stage_context()?;
        ctx.level = config.level;
        let started_at = Utc::now();
        let mut session = Session {
            id,
            level: config.level,
            target_speed_mbps: config.target_speed_mbps,
            monitor_enabled: config.monitor_enabled,
            started_at,
            baseline: Some(baseline),
            stages: Vec::new(),
        };

        let runner = StageRunner::new(self.runner.clone());
        for stage in StageName::APPLY_ORDER {
            let Some(backend) = self.backend_for(stage) else {
                let report = rollback_stages(&runner, &mut session.stages);
                self.finish_journal(&session, &report)?;
                self.last = Some(session);
                return Err(BoostError::UnsupportedPlatform(format!(
                    "stage '{}' has no backend for this platform",
                    stage
                )));
            };

            let result = runner.apply(backend, &ctx);
            let failed = !result.success;
            let reason = result.error.clone();
            if let Some(observer) = observer {
                observer(stage, &result);
            }
            session.stages.push(result);
            self.journal.write(&self.snapshot(&session))?;

            if failed {
                let report = rollback_stages(&runner, &mut session.stages);
                self.finish_journal(&session, &report)?;
                warn!(
                    session = %id,
                    stage = %stage,
                    reverted = report.reverted.len(),
                    failed_reverts = report.failed.len(),
                    "stage failed, prior stages rolled back"
                );
                self.last = Some(session);
                return Err(BoostError::PartialFailure {
                    stage: stage.as_str().to_string(),
                    reason: reason.unwrap_or_else(|| "unknown failure".to_string()),
                });
            }
        }

        Ok(session)
    }

    /// Close the journal when the rollback was clean; otherwise persist
    /// the final revert statuses so the leftover changes stay on record.
    fn finish_journal(
        &self,
        session: &Session,
        report: &RollbackReport,
    ) -> Result<(), BoostError> {
        if report.clean() {
            self.journal.close()
        } else {
            self.journal.write(&self.snapshot(session))
        }
    }

    fn snapshot(&self, session: &Session) -> SessionJournal {
        SessionJournal {
            session_id: session.id,
            started_at: session.started_at,
            level: session.level,
            stages: session.stages.clone(),
        }
    }

    fn backend_for(&self, stage: StageName) -> Option<&dyn StageBackend> {
        self.backends
            .iter()
            .find(|b| b.name() == stage)
            .map(|b| b.as_ref())
    }

    fn stage_context(&self) -> Result<StageContext, BoostError> {
        let interface = interfaces::active_interface_under(&self.sys_net, self.runner.as_ref())
            .ok_or_else(|| {
                BoostError::ProbeUnavailable("no active network interface".to_string())
            })?;
        let wireless = interfaces::is_wireless(&self.sys_net, &interface);
        Ok(StageContext {
            interface,
            wireless,
            // Callers overwrite the level; dry checks preview standard.
            level: OptimizationLevel::Standard,
            sys_net: self.sys_net.clone(),
        })
    }
}

/// Revert every successful stage, newest first.
fn rollback_stages(runner: &StageRunner, stages: &mut [StageResult]) -> RollbackReport {
    let mut report = RollbackReport::default();
    for result in stages.iter_mut().rev() {
        if !result.success {
            continue;
        }
        match runner.revert(result) {
            Ok(true) => report.reverted.push(result.stage),
            _ => report.failed.push(result.stage),
        }
    }
    report
}
