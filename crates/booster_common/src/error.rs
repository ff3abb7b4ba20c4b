//! Error types for the booster core.

use thiserror::Error;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code for invalid configuration or arguments
pub const EXIT_INVALID_CONFIG: i32 = 2;

/// Exit code when administrative rights are missing
pub const EXIT_PERMISSION_DENIED: i32 = 3;

/// Exit code when a session was rolled back after a stage failure
pub const EXIT_PARTIAL_FAILURE: i32 = 4;

#[derive(Error, Debug)]
pub enum BoostError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("Stage '{stage}' failed ({reason}); prior stages were rolled back")]
    PartialFailure { stage: String, reason: String },

    #[error("An optimization session is already active")]
    SessionAlreadyActive,

    #[error("Monitoring degraded after {0} consecutive probe failures")]
    MonitoringDegraded(u32),

    #[error("Unclean shutdown detected: {0}")]
    UncleanShutdown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BoostError {
    /// Map an error kind to the process exit code documented in the CLI help.
    pub fn exit_code(&self) -> i32 {
        match self {
            BoostError::InvalidConfig(_) => EXIT_INVALID_CONFIG,
            BoostError::PermissionDenied(_) => EXIT_PERMISSION_DENIED,
            BoostError::PartialFailure { .. } => EXIT_PARTIAL_FAILURE,
            _ => EXIT_GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(BoostError::InvalidConfig("x".into()).exit_code(), 2);
        assert_eq!(BoostError::PermissionDenied("x".into()).exit_code(), 3);
        assert_eq!(
            BoostError::PartialFailure {
                stage: "qos".into(),
                reason: "tc failed".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(BoostError::SessionAlreadyActive.exit_code(), 1);
        assert_eq!(BoostError::MonitoringDegraded(3).exit_code(), 1);
    }

    #[test]
    fn test_display_includes_context() {
        let err = BoostError::PartialFailure {
            stage: "wifi".into(),
            reason: "iw exited with 1".into(),
        };
        let text = err.to_string();
        assert!(text.contains("wifi"));
        assert!(text.contains("rolled back"));
    }
}
