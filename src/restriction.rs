//! The boundary to whatever actually blocks apps on the device.
//!
//! [`RestrictionGateway`] is the seam the iteration engine talks to.
//! [`FileGateway`] records the shield in a JSON file so an external agent
//! (or a person) can act on it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifaiError};
use crate::store::write_atomic;

/// Apps to shield while a task is unproven.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSelection {
    pub apps: Vec<String>,
}

impl AppSelection {
    pub fn new(apps: Vec<String>) -> Self {
        Self { apps }
    }
}

pub trait RestrictionGateway {
    fn apply_restrictions(&self, selection: &AppSelection) -> Result<()>;
    fn clear_restrictions(&self) -> Result<()>;
    fn start_monitoring(&self) -> Result<()>;
    fn stop_monitoring(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldState {
    pub shielded: Vec<String>,
    pub monitoring: bool,
}

pub struct FileGateway {
    path: PathBuf,
}

impl FileGateway {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("restrictions.json"),
        }
    }

    pub fn state(&self) -> Result<ShieldState> {
        if !self.path.exists() {
            return Ok(ShieldState::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn update(&self, f: impl FnOnce(&mut ShieldState)) -> Result<()> {
        let mut state = self.state()?;
        f(&mut state);
        write_atomic(&self.path, &serde_json::to_string_pretty(&state)?)
            .map_err(|e| VerifaiError::Restriction(format!("{}: {e}", self.path.display())))
    }
}

impl RestrictionGateway for FileGateway {
    fn apply_restrictions(&self, selection: &AppSelection) -> Result<()> {
        if selection.apps.is_empty() {
            tracing::warn!("no apps selected; nothing to restrict");
        }
        tracing::info!(count = selection.apps.len(), "restrictions applied");
        self.update(|s| s.shielded = selection.apps.clone())
    }

    fn clear_restrictions(&self) -> Result<()> {
        tracing::info!("restrictions cleared");
        self.update(|s| s.shielded.clear())
    }

    fn start_monitoring(&self) -> Result<()> {
        self.update(|s| s.monitoring = true)
    }

    fn stop_monitoring(&self) -> Result<()> {
        self.update(|s| {
            s.monitoring = false;
            s.shielded.clear();
        })
    }
}
