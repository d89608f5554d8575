//! Building and tearing down the NFSv4 pseudo root.
//!
//! The pseudo root is a tmpfs anchored at the configured root directory with
//! every export bind-mounted at its own path underneath. One lazy detach of
//! the anchor takes the whole tree down again.

use super::config::Config;
use super::constants::ROOT_MODE;
use super::error::{ExecError, ExportFailure, MountError, RootError, TreeError};
use super::export::ExportRegistry;
use super::mounts::{bind_mount, lazy_umount, tmpfs_mount, Mounter, SyscallMounter};
use super::pseudo::PseudoRoot;
use super::sequencer::{MountRecord, MountSequence};
use super::tree::TreeMaintenance;
use log::{debug, error, info, warn};
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// What happened to the tmpfs anchor during construction.
#[derive(Debug)]
pub enum AnchorStatus {
    /// Something was already mounted on the root; it was reused
    AlreadyMounted,
    /// A fresh tmpfs was mounted
    Mounted,
    /// Mounting the tmpfs failed; exports were bound into the bare directory
    Failed(MountError),
}

/// Result of mounting one export into the pseudo tree.
#[derive(Debug)]
pub struct ExportOutcome {
    /// Place in the mount sequence
    pub position: usize,
    /// Exported directory
    pub export_path: PathBuf,
    /// Where it was bound inside the pseudo root
    pub target: PathBuf,
    /// Whether the directory and bind mount both succeeded
    pub result: Result<(), ExportFailure>,
}

/// Everything a construction pass did.
#[derive(Debug)]
pub struct BuildReport {
    /// What happened at the root itself
    pub anchor: AnchorStatus,
    /// One entry per export, in mount order
    pub outcomes: Vec<ExportOutcome>,
}

impl BuildReport {
    /// Whether every export ended up bound.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Number of exports that ended up bound.
    pub fn mounted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// The exports that did not end up bound.
    pub fn failures(&self) -> impl Iterator<Item = &ExportOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Result of [`PseudoRootManager::create`].
#[derive(Debug)]
pub enum CreateStatus {
    /// Pseudo root not wanted; nothing was touched
    Disabled,
    /// The root directory was unusable; nothing was mounted
    Aborted(RootError),
    /// Construction ran; individual exports may still have failed
    Built(BuildReport),
}

/// Result of [`PseudoRootManager::destroy`].
#[derive(Debug)]
pub enum TeardownReport {
    /// No root directory, nothing to do
    NotPresent,
    /// Teardown ran
    Performed {
        /// Lazy detach of the root
        detach: Result<(), MountError>,
        /// Removal of the root directory
        removal: Result<(), TreeError>,
    },
}

impl TeardownReport {
    /// Whether nothing went wrong.
    pub fn is_clean(&self) -> bool {
        match self {
            TeardownReport::NotPresent => true,
            TeardownReport::Performed { detach, removal } => detach.is_ok() && removal.is_ok(),
        }
    }
}

fn escapes_root(export_path: &Path) -> bool {
    export_path.components().any(|c| c == Component::ParentDir)
}

/// What to log for a tree failure. Helper failures were already logged
/// together with their output when the helper ran.
fn tree_error_message(err: &TreeError) -> Option<String> {
    match err {
        TreeError::Io { .. } => Some(err.to_string()),
        TreeError::Exec(ExecError::Failed { program, code, .. }) => {
            Some(format!("{} failed (exit code {:?})", program, code))
        }
        TreeError::Exec(_) => None,
    }
}

fn log_tree_error(err: &TreeError) {
    if let Some(message) = tree_error_message(err) {
        error!("{}", message);
    }
}

/// Owns the pseudo root's lifecycle and the state published from it.
pub struct PseudoRootManager<M = SyscallMounter> {
    mounter: M,
    tree: TreeMaintenance,
    enabled: bool,
    pseudo: Arc<PseudoRoot>,
}

impl PseudoRootManager<SyscallMounter> {
    /// Manager that performs real mounts.
    pub fn system(config: &Config) -> Self {
        Self::new(config, SyscallMounter)
    }
}

impl<M: Mounter> PseudoRootManager<M> {
    /// Manager for the pseudo root described by `config`, mounting through
    /// `mounter`. Nothing is touched until [`create`](Self::create).
    pub fn new(config: &Config, mounter: M) -> Self {
        Self {
            mounter,
            tree: config.tree.clone(),
            enabled: config.enabled,
            pseudo: Arc::new(PseudoRoot::new(config.root.clone())),
        }
    }

    /// Handle to the state the protocol layer queries.
    pub fn pseudo(&self) -> Arc<PseudoRoot> {
        Arc::clone(&self.pseudo)
    }

    /// Root directory of the pseudo tree.
    pub fn root(&self) -> &Path {
        self.pseudo.root()
    }

    /// The mounter in use.
    pub fn mounter(&self) -> &M {
        &self.mounter
    }

    /// Where `export_path` is bound inside the pseudo root.
    pub fn target_for(&self, export_path: &Path) -> PathBuf {
        let relative = export_path.strip_prefix("/").unwrap_or(export_path);
        self.root().join(relative)
    }

    fn mkroot(&self) -> Result<(), RootError> {
        let root = self.root();
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(RootError::NotADirectory(root.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => DirBuilder::new()
                .mode(ROOT_MODE)
                .create(root)
                .map_err(|source| RootError::Create {
                    path: root.to_path_buf(),
                    source,
                }),
            Err(source) => Err(RootError::Stat {
                path: root.to_path_buf(),
                source,
            }),
        }
    }

    fn mount_anchor(&self) -> AnchorStatus {
        let root = self.root();
        if self.mounter.is_mountpoint(root) {
            debug!("{} is already a mount point", root.display());
            return AnchorStatus::AlreadyMounted;
        }
        match tmpfs_mount(&self.mounter, root) {
            Ok(()) => AnchorStatus::Mounted,
            Err(e) => AnchorStatus::Failed(e),
        }
    }

    fn mount_export(&self, record: MountRecord<'_>) -> ExportOutcome {
        let export_path = record.export.path.clone();
        let target = self.target_for(&export_path);

        let result = if escapes_root(&export_path) {
            let err = ExportFailure::OutsideRoot(export_path.clone());
            error!("{}", err);
            Err(err)
        } else {
            self.tree
                .make_path(&target)
                .map_err(|e| {
                    log_tree_error(&e);
                    ExportFailure::MakePath(e)
                })
                .and_then(|()| {
                    bind_mount(&self.mounter, &export_path, &target).map_err(ExportFailure::from)
                })
        };

        ExportOutcome {
            position: record.position,
            export_path,
            target,
            result,
        }
    }

    /// Builds the pseudo tree from every export in `registry` and publishes
    /// the root export.
    ///
    /// Exports are mounted shortest path first. A failed export is logged
    /// and recorded and the rest are still attempted.
    pub fn create(&self, registry: &ExportRegistry) -> CreateStatus {
        if !self.enabled {
            debug!("pseudo root disabled");
            return CreateStatus::Disabled;
        }

        if let Err(e) = self.mkroot() {
            error!("{}", e);
            return CreateStatus::Aborted(e);
        }

        let anchor = self.mount_anchor();

        let sequence = MountSequence::from_registry(registry);
        let outcomes: Vec<ExportOutcome> = sequence
            .into_iter()
            .map(|record| self.mount_export(record))
            .collect();

        self.pseudo.publish();

        let report = BuildReport { anchor, outcomes };
        if report.is_complete() {
            info!(
                "Pseudo root {} built with {} exports",
                self.root().display(),
                report.mounted()
            );
        } else {
            warn!(
                "Pseudo root {} partially built: {} of {} exports mounted",
                self.root().display(),
                report.mounted(),
                report.outcomes.len()
            );
        }
        CreateStatus::Built(report)
    }

    /// Unpublishes the root export, detaches the tree and removes the root
    /// directory.
    pub fn destroy(&self) -> TeardownReport {
        let root = self.root();
        if !root.exists() {
            debug!("{} does not exist, nothing to tear down", root.display());
            return TeardownReport::NotPresent;
        }

        self.pseudo.clear();
        let detach = lazy_umount(&self.mounter, root);
        let removal = self.tree.remove_dir(root).map_err(|e| {
            log_tree_error(&e);
            e
        });

        TeardownReport::Performed { detach, removal }
    }

    /// Tears the pseudo root down on shutdown or before a rebuild.
    pub fn umountall(&self) {
        let report = self.destroy();
        if report.is_clean() {
            info!("Pseudo root {} torn down", self.root().display());
        } else {
            warn!("Pseudo root {} not fully torn down", self.root().display());
        }
    }
}
