//! Persisted record of the last processed upstream version per plugin.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Outcome of the last successful packaging run for a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    pub plugin: String,
    pub version: String,
    /// Architecture tag to produced package path.
    #[serde(default)]
    pub assets: BTreeMap<String, PathBuf>,
}

/// JSON files under a directory, one `<plugin>.json` per plugin.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the record for `plugin`.
    pub fn path_for(&self, plugin: &str) -> PathBuf {
        self.dir.join(format!("{plugin}.json"))
    }

    /// Stored state for `plugin`, or `None` if it was never processed.
    pub fn load(&self, plugin: &str) -> Result<Option<ReleaseState>> {
        let path = self.path_for(plugin);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No state recorded for {plugin} at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::io(format!("failed to read {}", path.display()), e)),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Persist `state`, replacing any previous record.
    pub fn save(&self, state: &ReleaseState) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::io(format!("failed to create {}", self.dir.display()), e))?;
        let path = self.path_for(&state.plugin);
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&path, json)
            .map_err(|e| Error::io(format!("failed to write {}", path.display()), e))
    }
}
