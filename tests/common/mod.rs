#![allow(dead_code)]

use nix::errno::Errno;
use nix::mount::{MntFlags, MsFlags};
use pseudoroot::modules::error::MountError;
use pseudoroot::modules::mounts::{MountArgs, Mounter, UnmountArgs};
use pseudoroot::{Config, ExportEntry, ExportRegistry};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Mount {
        source: Option<PathBuf>,
        target: PathBuf,
        fstype: Option<String>,
        flags: MsFlags,
    },
    Umount {
        target: PathBuf,
        flags: MntFlags,
    },
}

/// Mounter that only keeps a table in memory.
///
/// A lazy detach of a tmpfs it mounted also empties that directory, the way
/// the kernel drops a tmpfs's contents with it.
#[derive(Default)]
pub struct FakeMounter {
    calls: RefCell<Vec<Call>>,
    mounted: RefCell<Vec<(PathBuf, bool)>>,
    failing: Vec<PathBuf>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every mount onto `target` with `EACCES`.
    pub fn failing_on(mut self, target: impl Into<PathBuf>) -> Self {
        self.failing.push(target.into());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Sources of the bind mounts, in the order they were made.
    pub fn bind_sources(&self) -> Vec<PathBuf> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Mount {
                    source: Some(source),
                    flags,
                    ..
                } if flags.contains(MsFlags::MS_BIND) => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn mount_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Mount { .. }))
            .count()
    }

    pub fn active(&self) -> Vec<PathBuf> {
        self.mounted.borrow().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl Mounter for FakeMounter {
    fn mount(&self, args: &MountArgs<'_>) -> Result<(), MountError> {
        self.calls.borrow_mut().push(Call::Mount {
            source: args.source.map(Path::to_path_buf),
            target: args.target.to_path_buf(),
            fstype: args.fstype.map(str::to_string),
            flags: args.flags,
        });
        if self.failing.iter().any(|t| t == args.target) {
            return Err(MountError::mounting(args.target, Errno::EACCES));
        }
        let tmpfs = args.fstype == Some("tmpfs");
        self.mounted
            .borrow_mut()
            .push((args.target.to_path_buf(), tmpfs));
        Ok(())
    }

    fn umount(&self, args: &UnmountArgs<'_>) -> Result<(), MountError> {
        self.calls.borrow_mut().push(Call::Umount {
            target: args.target.to_path_buf(),
            flags: args.flags,
        });

        let mut mounted = self.mounted.borrow_mut();
        let anchored = mounted
            .iter()
            .any(|(path, tmpfs)| *tmpfs && path == args.target);
        let before = mounted.len();
        if args.flags.contains(MntFlags::MNT_DETACH) {
            mounted.retain(|(path, _)| !path.starts_with(args.target));
        } else {
            mounted.retain(|(path, _)| path != args.target);
        }
        if mounted.len() == before {
            return Err(MountError::unmounting(args.target, Errno::EINVAL));
        }
        drop(mounted);

        if anchored {
            if let Ok(entries) = fs::read_dir(args.target) {
                for entry in entries.flatten() {
                    let _ = fs::remove_dir_all(entry.path());
                }
            }
        }
        Ok(())
    }

    fn is_mountpoint(&self, path: &Path) -> bool {
        self.mounted.borrow().iter().any(|(p, _)| p == path)
    }
}

/// A root directory path inside a fresh temp dir. The directory itself is
/// not created.
pub fn temp_root() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("v4root");
    (dir, root)
}

pub fn config_for(root: &Path) -> Config {
    Config::with_root(root)
}

pub fn registry(paths: &[&str]) -> ExportRegistry {
    ExportRegistry::from_entries(paths.iter().map(|p| ExportEntry::new("*", *p)))
}
