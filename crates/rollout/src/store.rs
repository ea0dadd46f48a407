//! Durable record of in-flight instances.
//!
//! The state file maps an instance id to the pools it must be rejoined to:
//!
//! ```json
//! {
//!   "i-0abc123": ["web-a", "web-b"]
//! }
//! ```
//!
//! A record exists only while an instance is between drain and a fully
//! successful rejoin. Every operation reads the whole file, changes one
//! entry and writes the whole file back. There is no locking: one
//! orchestrator per state file.

use crate::error::{Error, Result};
use crate::types::PoolMembership;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default state file name, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "updatetool.state";

/// All persisted records, keyed by instance id.
pub type Records = BTreeMap<String, PoolMembership>;

/// File-backed store of pool memberships for in-flight instances.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store backed by `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create or overwrite the record for `instance_id`.
    pub fn upsert(&self, instance_id: &str, membership: &PoolMembership) -> Result<()> {
        let mut records = self.load();
        records.insert(instance_id.to_string(), membership.clone());
        self.save(&records)?;
        log::debug!("Added record to state file: {instance_id} = {membership}");
        Ok(())
    }

    /// Delete the record for `instance_id`.
    ///
    /// Returns whether a record existed. An absent record is not an error
    /// and leaves the file untouched.
    pub fn remove(&self, instance_id: &str) -> Result<bool> {
        let mut records = self.load();
        if records.remove(instance_id).is_none() {
            log::debug!("No record for {instance_id} in state file");
            return Ok(false);
        }
        self.save(&records)?;
        log::debug!("Removed {instance_id} from state file");
        Ok(true)
    }

    /// Get the record for `instance_id`, if any.
    pub fn get(&self, instance_id: &str) -> Option<PoolMembership> {
        self.load().remove(instance_id)
    }

    /// Every record currently on disk.
    pub fn records(&self) -> Records {
        self.load()
    }

    /// Load all records.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// also treated as empty, with a warning: losing recovery information is
    /// preferable to blocking every future run.
    fn load(&self) -> Records {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No state file found at {}", self.path.display());
                return Records::new();
            }
            Err(e) => {
                log::warn!(
                    "Could not read state file {}: {e}; treating it as empty",
                    self.path.display()
                );
                return Records::new();
            }
        };

        if content.trim().is_empty() {
            return Records::new();
        }

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                log::warn!(
                    "State file {} is corrupt ({e}); treating it as empty. Records from prior runs are lost",
                    self.path.display()
                );
                Records::new()
            }
        }
    }

    /// Write all records, replacing the file.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the state file, so a crash mid-write leaves the
    /// previous records intact.
    fn save(&self, records: &Records) -> Result<()> {
        let to_state_err = |source| Error::StateFile {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(to_state_err)?;
                dir
            }
            None => Path::new("."),
        };

        let content = serde_json::to_string_pretty(records)?;
        let mut file = NamedTempFile::new_in(dir).map_err(to_state_err)?;
        file.write_all(content.as_bytes()).map_err(to_state_err)?;
        file.as_file().sync_all().map_err(to_state_err)?;
        file.persist(&self.path).map_err(|e| to_state_err(e.error))?;
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}
