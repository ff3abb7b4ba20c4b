//! Core library for the signal-booster network optimization tool.
//!
//! The session workflow lives here: the read-only diagnostics probe,
//! the per-stage reversible mutation machinery with its on-disk
//! journal, the session controller that sequences and rolls back
//! stages, and the periodic monitor loop. The `signal-booster` binary
//! is a thin CLI over these pieces.

pub mod command_exec;
pub mod config;
pub mod error;
pub mod interfaces;
pub mod journal;
pub mod levels;
pub mod metrics;
pub mod monitor;
pub mod paths;
pub mod privilege;
pub mod probe;
pub mod quality;
pub mod session;
pub mod stages;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::BoostError;
pub use levels::OptimizationLevel;
pub use metrics::{LatencyStats, Metrics};
pub use session::{
    RollbackReport, Session, SessionConfig, SessionController, SessionRegistry,
};
pub use stages::{StageName, StageResult};
