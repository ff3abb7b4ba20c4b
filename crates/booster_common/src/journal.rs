//! On-disk session journal.
//!
//! The journal is rewritten after every stage transition while a
//! session is active and removed on clean close, so a file found at
//! startup means the previous run died without rolling back. The next
//! run detects that, reports an unclean shutdown and replays the
//! journaled revert plans.

use crate::error::BoostError;
use crate::levels::OptimizationLevel;
use crate::paths;
use crate::stages::StageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const JOURNAL_FILE: &str = "journal.json";

/// Durable record of the active session's reversible changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionJournal {
    pub session_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub level: OptimizationLevel,
    pub stages: Vec<StageResult>,
}

/// Reads and writes the journal file under the state directory.
pub struct JournalStore {
    root: PathBuf,
}

impl JournalStore {
    pub fn new() -> Self {
        JournalStore {
            root: paths::state_dir(),
        }
    }

    /// Store rooted at an explicit directory (for tests).
    pub fn with_root(root: &Path) -> Self {
        JournalStore {
            root: root.to_path_buf(),
        }
    }

    fn path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    /// Persist the journal atomically (temp file + rename), so a crash
    /// mid-write never leaves a truncated journal behind.
    pub fn write(&self, journal: &SessionJournal) -> Result<(), BoostError> {
        fs::create_dir_all(&self.root)?;
        let tmp = self.root.join(format!("{}.tmp", JOURNAL_FILE));
        fs::write(&tmp, serde_json::to_string_pretty(journal)?)?;
        fs::rename(&tmp, self.path())?;
        Ok(())
    }

    /// Journal left behind by a previous run, if any.
    ///
    /// An unparsable file cannot drive recovery; it is moved aside so
    /// the operator can inspect it and the session can proceed.
    pub fn open_stale(&self) -> Result<Option<SessionJournal>, BoostError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(journal) => Ok(Some(journal)),
            Err(e) => {
                let aside = self.root.join(format!("{}.corrupt", JOURNAL_FILE));
                warn!(error = %e, moved_to = %aside.display(), "stale journal is unreadable");
                fs::rename(&path, &aside)?;
                Ok(None)
            }
        }
    }

    /// Remove the journal after a clean rollback.
    pub fn close(&self) -> Result<(), BoostError> {
        let path = self.path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }
}

impl Default for JournalStore {
    fn default() -> Self {
        Self::new()
    }
}
