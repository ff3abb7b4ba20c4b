//! Filesystem locations for state and configuration.
//!
//! The journal lives under the state directory. Root uses the system
//! location; unprivileged invocations (`test`, `info`) fall back to the
//! user state directory so they never need write access to /var/lib.

use crate::privilege;
use std::path::PathBuf;

/// System state directory for the session journal.
pub const SYSTEM_STATE_DIR: &str = "/var/lib/signal-booster";

/// System configuration file.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/signal-booster/config.toml";

/// Environment override for the state directory.
pub const STATE_DIR_ENV: &str = "SIGNAL_BOOSTER_STATE_DIR";

/// Environment override for the configuration file.
pub const CONFIG_FILE_ENV: &str = "SIGNAL_BOOSTER_CONFIG";

/// State directory resolution chain: env override, system directory
/// when root, XDG state directory, /tmp as the last resort.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if privilege::effective_root() {
        return PathBuf::from(SYSTEM_STATE_DIR);
    }
    if let Some(dir) = dirs::state_dir() {
        return dir.join("signal-booster");
    }
    PathBuf::from("/tmp/signal-booster")
}

/// Configuration file location: env override or the system file.
pub fn config_file() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from(SYSTEM_CONFIG_FILE)
}
