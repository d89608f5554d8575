//! Export records as seen by the pseudo root.
//!
//! The export table itself is owned elsewhere; this module only models what
//! the pseudo root needs from it and can load a JSON snapshot of it.

use super::constants::*;
use super::error::ConfigError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

bitflags! {
    /// Kernel export option bits (`NFSEXP_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ExportFlags: u32 {
        /// Read-only export
        const READONLY = 0x0001;
        /// Accept requests from unprivileged ports
        const INSECURE_PORT = 0x0002;
        /// Map root to the anonymous ids
        const ROOTSQUASH = 0x0004;
        /// Map every user to the anonymous ids
        const ALLSQUASH = 0x0008;
        /// Reply before writes reach stable storage
        const ASYNC = 0x0010;
        /// Delay writes to batch them
        const GATHERED_WRITES = 0x0020;
        /// Disable READDIRPLUS
        const NOREADDIRPLUS = 0x0040;
        /// Pass security labels through
        const SECURITY_LABEL = 0x0080;
        /// Show filesystems mounted below the export
        const NOHIDE = 0x0200;
        /// Skip subtree checking
        const NOSUBTREECHECK = 0x0400;
        /// Skip authentication of lock requests
        const NOAUTHNLM = 0x0800;
        /// fsid given explicitly
        const FSID = 0x2000;
        /// Let clients cross into child mounts
        const CROSSMOUNT = 0x4000;
        /// Disable ACL support
        const NOACL = 0x8000;
        /// Part of the NFSv4 pseudo tree only
        const V4ROOT = 0x10000;
    }
}

const CLASS_COUNT: usize = 6;

/// Which client list an export lives on, keyed by how its host pattern
/// matches clients.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ClientClass {
    /// Fully qualified host name
    Fqdn,
    /// IP subnet
    Subnetwork,
    /// Host name pattern
    #[default]
    Wildcard,
    /// NIS netgroup
    Netgroup,
    /// Any client
    Anonymous,
    /// Kerberos/GSS authenticated client
    Gss,
}

impl ClientClass {
    /// Every class, in registry iteration order.
    pub const ALL: [ClientClass; CLASS_COUNT] = [
        ClientClass::Fqdn,
        ClientClass::Subnetwork,
        ClientClass::Wildcard,
        ClientClass::Netgroup,
        ClientClass::Anonymous,
        ClientClass::Gss,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// How a file handle encodes the filesystem identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FsidType {
    /// Device number and inode
    Dev = 0,
    /// Numeric fsid chosen by the administrator
    Num = 1,
    /// Major and minor device numbers and inode
    MajorMinor = 2,
    /// Encoded device number and inode
    EncodeDev = 3,
    /// 4-byte uuid and inode
    Uuid4Inum = 4,
    /// 8-byte uuid
    Uuid8 = 5,
    /// 16-byte uuid
    Uuid16 = 6,
    /// 16-byte uuid and inode
    Uuid16Inum = 7,
}

impl TryFrom<u8> for FsidType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => FsidType::Dev,
            1 => FsidType::Num,
            2 => FsidType::MajorMinor,
            3 => FsidType::EncodeDev,
            4 => FsidType::Uuid4Inum,
            5 => FsidType::Uuid8,
            6 => FsidType::Uuid16,
            7 => FsidType::Uuid16Inum,
            other => return Err(other),
        })
    }
}

fn default_anon_uid() -> u32 {
    ANON_UID
}

fn default_anon_gid() -> u32 {
    ANON_GID
}

/// One entry of the export table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Client list this entry belongs to
    #[serde(default)]
    pub class: ClientClass,
    /// Host pattern the export is offered to
    pub hostname: String,
    /// Exported directory
    pub path: PathBuf,
    /// Path the export was mounted from, if different from `path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<PathBuf>,
    /// Export options
    #[serde(default)]
    pub flags: ExportFlags,
    /// uid squashed users map to
    #[serde(default = "default_anon_uid")]
    pub anon_uid: u32,
    /// gid squashed users map to
    #[serde(default = "default_anon_gid")]
    pub anon_gid: u32,
    /// uids squashed in addition to root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub squash_uids: Vec<u32>,
    /// gids squashed in addition to root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub squash_gids: Vec<u32>,
    /// Numeric fsid, meaningful with [`ExportFlags::FSID`]
    #[serde(default)]
    pub fsid: u32,
    /// Filesystem uuid for uuid-based handles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl ExportEntry {
    /// Creates a wildcard export of `path` with default options.
    pub fn new(hostname: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            class: ClientClass::default(),
            hostname: hostname.into(),
            path: path.into(),
            mount_path: None,
            flags: ExportFlags::empty(),
            anon_uid: ANON_UID,
            anon_gid: ANON_GID,
            squash_uids: Vec::new(),
            squash_gids: Vec::new(),
            fsid: 0,
            uuid: None,
        }
    }

    /// Builder-style setter for the client class.
    pub fn with_class(mut self, class: ClientClass) -> Self {
        self.class = class;
        self
    }

    /// Builder-style setter for the flag set.
    pub fn with_flags(mut self, flags: ExportFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Path the export was mounted from, falling back to `path`.
    pub fn mount_path(&self) -> &Path {
        self.mount_path.as_deref().unwrap_or(&self.path)
    }

    /// The export standing for the pseudo root itself.
    pub fn pseudo_root(root: &Path) -> Self {
        Self {
            class: ClientClass::Wildcard,
            hostname: PSEUDO_HOSTNAME.to_string(),
            path: root.to_path_buf(),
            mount_path: Some(root.to_path_buf()),
            flags: ExportFlags::READONLY
                | ExportFlags::ROOTSQUASH
                | ExportFlags::NOSUBTREECHECK
                | ExportFlags::FSID
                | ExportFlags::CROSSMOUNT,
            anon_uid: ANON_UID,
            anon_gid: ANON_GID,
            squash_uids: Vec::new(),
            squash_gids: Vec::new(),
            fsid: PSEUDO_FSID,
            uuid: None,
        }
    }
}

#[derive(Deserialize)]
struct Snapshot {
    exports: Vec<ExportEntry>,
}

/// Export records grouped by client class.
#[derive(Debug, Clone, Default)]
pub struct ExportRegistry {
    lists: [Vec<ExportEntry>; CLASS_COUNT],
}

impl ExportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `entries` by class, keeping their relative order within each
    /// class.
    pub fn from_entries(entries: impl IntoIterator<Item = ExportEntry>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            registry.add(entry);
        }
        registry
    }

    /// Reads a `{"exports": [...]}` snapshot.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        for export in &snapshot.exports {
            if !export.path.is_absolute() {
                return Err(ConfigError::RelativeExport(export.path.clone()));
            }
            if export.path.components().any(|c| c == Component::ParentDir) {
                return Err(ConfigError::ParentDirExport(export.path.clone()));
            }
        }

        Ok(Self::from_entries(snapshot.exports))
    }

    /// Appends `entry` to its class's list.
    pub fn add(&mut self, entry: ExportEntry) {
        self.lists[entry.class.index()].push(entry);
    }

    /// Entries of one class, in insertion order.
    pub fn list(&self, class: ClientClass) -> &[ExportEntry] {
        &self.lists[class.index()]
    }

    /// All entries, class by class.
    pub fn iter(&self) -> impl Iterator<Item = &ExportEntry> {
        self.lists.iter().flatten()
    }

    /// Total number of entries across classes.
    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Whether no class has any entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
