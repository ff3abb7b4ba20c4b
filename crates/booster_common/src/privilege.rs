//! Effective-privilege detection.
//!
//! Stage backends mutate kernel and adapter state, so the session
//! controller refuses to run without root. The check happens once, up
//! front, before anything is touched.

use crate::error::BoostError;

/// Whether the process runs with an effective UID of 0.
pub fn effective_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Error describing the missing privilege, for the pre-mutation gate.
pub fn denied(action: &str) -> BoostError {
    BoostError::PermissionDenied(format!(
        "administrative rights are required to {} (run with sudo)",
        action
    ))
}
