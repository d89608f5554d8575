//! Long-running pseudo root service.
//!
//! Builds the pseudo tree once, then sits on signals: `SIGHUP` reloads the
//! export file and rebuilds, `SIGINT`/`SIGTERM` tear everything down.

use super::export::ExportRegistry;
use super::mounts::Mounter;
use super::v4root::{CreateStatus, PseudoRootManager};
use anyhow::{Context, Result};
use libc::{SIGHUP, SIGINT, SIGTERM};
use log::{error, info, warn};
use signal_hook::iterator::Signals;
use std::path::{Path, PathBuf};

/// What the service does in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Tear down and rebuild from a fresh load of the export file
    Rebuild,
    /// Tear down and stop
    Shutdown,
}

/// Maps a delivered signal to the service action, if it has one.
pub fn action_for(signal: i32) -> Option<Action> {
    match signal {
        SIGHUP => Some(Action::Rebuild),
        SIGINT | SIGTERM => Some(Action::Shutdown),
        _ => None,
    }
}

/// Keeps a pseudo root in sync with an export file.
pub struct Service<M: Mounter> {
    manager: PseudoRootManager<M>,
    exports: PathBuf,
}

impl<M: Mounter> Service<M> {
    /// # Arguments
    ///
    /// * `manager` - Manager owning the pseudo root
    /// * `exports` - JSON export file reloaded on every rebuild
    pub fn new(manager: PseudoRootManager<M>, exports: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            exports: exports.into(),
        }
    }

    /// The manager owning the pseudo root.
    pub fn manager(&self) -> &PseudoRootManager<M> {
        &self.manager
    }

    /// The export file.
    pub fn exports(&self) -> &Path {
        &self.exports
    }

    fn load(&self) -> Result<ExportRegistry> {
        ExportRegistry::load(&self.exports)
            .with_context(|| format!("Failed to load exports from {}", self.exports.display()))
    }

    /// Loads the export file and builds the pseudo tree from it.
    pub fn build(&self) -> Result<CreateStatus> {
        let registry = self.load()?;
        Ok(self.manager.create(&registry))
    }

    /// Replaces the current tree with one built from a fresh load of the
    /// export file.
    ///
    /// The existing tree is left alone if the file can't be loaded.
    pub fn rebuild(&self) -> Result<CreateStatus> {
        let registry = self.load()?;
        self.manager.umountall();
        Ok(self.manager.create(&registry))
    }

    /// Reacts to one signal.
    ///
    /// # Returns
    ///
    /// * `true` if the service should keep running
    /// * `false` once it has shut down
    pub fn handle(&self, signal: i32) -> bool {
        match action_for(signal) {
            Some(Action::Rebuild) => {
                info!("Received SIGHUP, rebuilding pseudo root");
                if let Err(e) = self.rebuild() {
                    error!("Rebuild skipped: {:#}", e);
                }
                true
            }
            Some(Action::Shutdown) => {
                info!("Received signal {}, tearing down pseudo root", signal);
                self.manager.umountall();
                false
            }
            None => {
                warn!("Ignoring unexpected signal {}", signal);
                true
            }
        }
    }

    /// Builds the tree and serves until told to stop.
    pub fn run(&self) -> Result<()> {
        let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM])
            .context("Failed to register signal handlers")?;

        if let CreateStatus::Aborted(e) = self.build()? {
            warn!("Serving without a pseudo root: {}", e);
        }

        info!(
            "Serving pseudo root {}. Waiting for signals...",
            self.manager.root().display()
        );
        for signal in signals.forever() {
            if !self.handle(signal) {
                break;
            }
        }

        info!("Service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_for() {
        assert_eq!(action_for(SIGHUP), Some(Action::Rebuild));
        assert_eq!(action_for(SIGINT), Some(Action::Shutdown));
        assert_eq!(action_for(SIGTERM), Some(Action::Shutdown));
        assert_eq!(action_for(libc::SIGUSR1), None);
    }
}
