//! Runtime configuration for the pseudo root.

use super::constants::DEFAULT_PSEUDO_ROOT;
use super::error::ConfigError;
use super::tree::TreeMaintenance;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_PSEUDO_ROOT)
}

fn default_enabled() -> bool {
    true
}

/// Where the pseudo root lives and how it is maintained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory the pseudo tree is built under
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Whether a pseudo root is wanted at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Directory creation/removal strategy
    #[serde(default)]
    pub tree: TreeMaintenance,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            enabled: default_enabled(),
            tree: TreeMaintenance::default(),
        }
    }
}

impl Config {
    /// Config for a pseudo root at `root` with everything else defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the root is absolute and isn't `/` itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.root.is_absolute() {
            return Err(ConfigError::RelativeRoot(self.root.clone()));
        }
        if self
            .root
            .components()
            .all(|c| matches!(c, Component::RootDir | Component::CurDir))
        {
            return Err(ConfigError::SystemRoot);
        }
        Ok(())
    }
}
