//! State published for the pseudo root while its tree is mounted.

use super::constants::PSEUDO_FSID;
use super::export::{ExportEntry, FsidType};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Pseudo root state shared with the protocol layer.
///
/// Holds the synthesized root export while a pseudo tree is mounted and
/// answers the three lookups the protocol code needs to recognise requests
/// aimed at it. Published by [`PseudoRootManager::create`] and cleared by
/// [`PseudoRootManager::destroy`].
///
/// [`PseudoRootManager::create`]: super::v4root::PseudoRootManager::create
/// [`PseudoRootManager::destroy`]: super::v4root::PseudoRootManager::destroy
#[derive(Debug)]
pub struct PseudoRoot {
    /// Root directory of the pseudo tree
    root: PathBuf,
    /// `root` as text, without a trailing slash
    root_str: String,
    /// The published root export, if any
    export: RwLock<Option<Arc<ExportEntry>>>,
}

impl PseudoRoot {
    /// Creates an unpublished pseudo root at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory the pseudo tree is (or will be) built in
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut root_str = root.to_string_lossy().into_owned();
        while root_str.len() > 1 && root_str.ends_with('/') {
            root_str.pop();
        }

        Self {
            root,
            root_str,
            export: RwLock::new(None),
        }
    }

    /// Root directory of the pseudo tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a root export is currently published.
    pub fn is_published(&self) -> bool {
        self.export.read().is_some()
    }

    /// The published root export, if any.
    pub fn current(&self) -> Option<Arc<ExportEntry>> {
        self.export.read().clone()
    }

    /// Publishes the root export. [`PseudoRootManager::create`] does this
    /// once the tree is built.
    ///
    /// [`PseudoRootManager::create`]: super::v4root::PseudoRootManager::create
    pub fn publish(&self) -> Arc<ExportEntry> {
        let export = Arc::new(ExportEntry::pseudo_root(&self.root));
        *self.export.write() = Some(Arc::clone(&export));
        export
    }

    /// Withdraws the root export.
    pub fn clear(&self) {
        *self.export.write() = None;
    }

    /// Looks up the root export by file handle fsid.
    ///
    /// Only a numeric fsid of zero names the pseudo root; the handle's uuid
    /// plays no part.
    ///
    /// # Arguments
    ///
    /// * `fsid_type` - fsid encoding of the handle
    /// * `fsid_num` - numeric fsid carried by the handle
    /// * `_fh_uuid` - uuid carried by the handle, if any
    ///
    /// # Returns
    ///
    /// * `Some(export)` if published and the fsid is numeric zero
    /// * `None` otherwise
    pub fn chkroot(
        &self,
        fsid_type: FsidType,
        fsid_num: u32,
        _fh_uuid: Option<&Uuid>,
    ) -> Option<Arc<ExportEntry>> {
        let export = self.current()?;
        match fsid_type {
            FsidType::Num if fsid_num == PSEUDO_FSID => Some(export),
            _ => None,
        }
    }

    /// Maps a path inside the pseudo tree back to the exported path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path as seen by the server, possibly under the root
    ///
    /// # Returns
    ///
    /// * The root itself when `path` is the root
    /// * `path` with the root stripped when it lies below the root
    /// * `None` when nothing is published or `path` is outside the root
    pub fn maproot(&self, path: &str) -> Option<String> {
        if !self.is_published() {
            return None;
        }

        if path == self.root_str {
            return Some(self.root_str.clone());
        }

        let rest = path.strip_prefix(self.root_str.as_str())?;
        if rest.starts_with('/') {
            Some(rest.to_string())
        } else {
            None
        }
    }

    /// The root export when `path` names the root exactly.
    pub fn export(&self, path: &str) -> Option<Arc<ExportEntry>> {
        if path != self.root_str {
            return None;
        }
        self.current()
    }
}
