//! Mount and unmount primitives used to build the pseudo tree.
//!
//! Everything funnels through a [`Mounter`], so the lifecycle code can be
//! driven against the real kernel ([`SyscallMounter`]) or a stand-in.

use super::constants::PROC_MOUNTS;
use super::error::MountError;
use log::{debug, error};
use nix::mount::{mount, umount, umount2, MntFlags, MsFlags};
use nix::sys::stat::stat;
use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

/// Arguments of a single `mount(2)` call.
#[derive(Debug, Clone, Copy)]
pub struct MountArgs<'a> {
    /// Device or directory being mounted
    pub source: Option<&'a Path>,
    /// Mount point
    pub target: &'a Path,
    /// Filesystem type
    pub fstype: Option<&'a str>,
    /// `MS_*` flags
    pub flags: MsFlags,
    /// Filesystem-specific options
    pub data: Option<&'a str>,
}

/// Arguments of a single `umount2(2)` call.
#[derive(Debug, Clone, Copy)]
pub struct UnmountArgs<'a> {
    /// Mount point
    pub target: &'a Path,
    /// `MNT_*` flags; empty means a plain `umount`
    pub flags: MntFlags,
}

/// Something that can mount, unmount and tell mountpoints apart.
pub trait Mounter {
    /// Performs one mount.
    fn mount(&self, args: &MountArgs<'_>) -> Result<(), MountError>;

    /// Performs one unmount.
    fn umount(&self, args: &UnmountArgs<'_>) -> Result<(), MountError>;

    /// Whether `path` is the target of a mount.
    fn is_mountpoint(&self, path: &Path) -> bool;
}

/// [`Mounter`] backed by the mount syscalls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallMounter;

impl Mounter for SyscallMounter {
    fn mount(&self, args: &MountArgs<'_>) -> Result<(), MountError> {
        mount(args.source, args.target, args.fstype, args.flags, args.data)
            .map_err(|errno| MountError::mounting(args.target, errno))
    }

    fn umount(&self, args: &UnmountArgs<'_>) -> Result<(), MountError> {
        let result = if args.flags.is_empty() {
            umount(args.target)
        } else {
            umount2(args.target, args.flags)
        };
        result.map_err(|errno| MountError::unmounting(args.target, errno))
    }

    fn is_mountpoint(&self, path: &Path) -> bool {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        match fs::read_to_string(PROC_MOUNTS) {
            Ok(table) => mount_table_contains(&table, &path),
            Err(e) => {
                debug!("{} unreadable ({}), comparing devices", PROC_MOUNTS, e);
                differs_from_parent(&path)
            }
        }
    }
}

fn differs_from_parent(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return true;
    };
    match (stat(path), stat(parent)) {
        (Ok(own), Ok(up)) => own.st_dev != up.st_dev,
        _ => false,
    }
}

/// Decodes the octal escapes (`\040` and friends) the kernel uses for
/// whitespace and backslashes in mount table fields.
pub fn unescape_mount_field(field: &str) -> PathBuf {
    let raw = field.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let octal = i + 3 < raw.len()
            && raw[i + 1..i + 4]
                .iter()
                .all(|b| (b'0'..=b'7').contains(b));
        if raw[i] == b'\\' && octal {
            let value = raw[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    PathBuf::from(OsString::from_vec(out))
}

/// Whether a `/proc/mounts`-format `table` lists `path` as a mount target.
pub fn mount_table_contains(table: &str, path: &Path) -> bool {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|target| unescape_mount_field(target) == path)
}

fn mount_logged<M: Mounter + ?Sized>(
    mounter: &M,
    args: &MountArgs<'_>,
) -> Result<(), MountError> {
    mounter.mount(args).map_err(|err| {
        error!("{}", err);
        err
    })
}

fn umount_logged<M: Mounter + ?Sized>(
    mounter: &M,
    args: &UnmountArgs<'_>,
) -> Result<(), MountError> {
    mounter.umount(args).map_err(|err| {
        error!("{}", err);
        err
    })
}

/// Makes `dev` visible at `dir`.
pub fn bind_mount<M: Mounter + ?Sized>(
    mounter: &M,
    dev: &Path,
    dir: &Path,
) -> Result<(), MountError> {
    debug!("mount --bind {} {}", dev.display(), dir.display());
    mount_logged(
        mounter,
        &MountArgs {
            source: Some(dev),
            target: dir,
            fstype: Some("bind"),
            flags: MsFlags::MS_BIND,
            data: None,
        },
    )
}

/// Mounts an empty tmpfs at `dir`.
pub fn tmpfs_mount<M: Mounter + ?Sized>(mounter: &M, dir: &Path) -> Result<(), MountError> {
    debug!("mount -t tmpfs tmpfs {}", dir.display());
    mount_logged(
        mounter,
        &MountArgs {
            source: Some(Path::new("tmpfs")),
            target: dir,
            fstype: Some("tmpfs"),
            flags: MsFlags::empty(),
            data: None,
        },
    )
}

/// Detaches `dir` and everything mounted below it right away; the kernel
/// releases it once nothing references it any more.
pub fn lazy_umount<M: Mounter + ?Sized>(mounter: &M, dir: &Path) -> Result<(), MountError> {
    debug!("umount -l {}", dir.display());
    umount_logged(
        mounter,
        &UnmountArgs {
            target: dir,
            flags: MntFlags::MNT_DETACH,
        },
    )
}
