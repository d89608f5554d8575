//! Creating and removing directories inside the pseudo root.

use super::constants::{DEFAULT_HELPER_TIMEOUT, MKDIR_CMD, RMDIR_CMD};
use super::error::TreeError;
use super::execute::{exec_mkpath, exec_rmdir};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_mkdir() -> PathBuf {
    PathBuf::from(MKDIR_CMD)
}

fn default_rmdir() -> PathBuf {
    PathBuf::from(RMDIR_CMD)
}

fn default_timeout_secs() -> Option<u64> {
    Some(DEFAULT_HELPER_TIMEOUT.as_secs())
}

/// How directories get created and removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TreeMaintenance {
    /// `create_dir_all` / `remove_dir` in process
    #[default]
    Native,
    /// `mkdir -p` / `rmdir` helpers
    Helper {
        /// Program run as `mkdir -p <dir>`
        #[serde(default = "default_mkdir")]
        mkdir: PathBuf,
        /// Program run as `rmdir <dir>`
        #[serde(default = "default_rmdir")]
        rmdir: PathBuf,
        /// Seconds before a helper is killed; `None` waits forever.
        #[serde(default = "default_timeout_secs")]
        timeout_secs: Option<u64>,
    },
}

impl TreeMaintenance {
    /// Helper mode with the standard programs and timeout.
    pub fn helper() -> Self {
        TreeMaintenance::Helper {
            mkdir: default_mkdir(),
            rmdir: default_rmdir(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Creates `dir` and any missing parents.
    pub fn make_path(&self, dir: &Path) -> Result<(), TreeError> {
        match self {
            TreeMaintenance::Native => {
                debug!("mkdir -p {}", dir.display());
                fs::create_dir_all(dir).map_err(|source| TreeError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
            TreeMaintenance::Helper {
                mkdir,
                timeout_secs,
                ..
            } => Ok(exec_mkpath(mkdir, dir, timeout_secs.map(Duration::from_secs))?),
        }
    }

    /// Removes the empty directory `dir`.
    pub fn remove_dir(&self, dir: &Path) -> Result<(), TreeError> {
        match self {
            TreeMaintenance::Native => {
                debug!("rmdir {}", dir.display());
                fs::remove_dir(dir).map_err(|source| TreeError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
            TreeMaintenance::Helper {
                rmdir,
                timeout_secs,
                ..
            } => Ok(exec_rmdir(rmdir, dir, timeout_secs.map(Duration::from_secs))?),
        }
    }
}
