mod common;

use anyhow::Result;
use common::{config_for, registry, temp_root, Call, FakeMounter};
use nix::mount::MntFlags;
use pseudoroot::modules::error::{ExportFailure, MountError};
use pseudoroot::modules::mounts::{MountArgs, Mounter, UnmountArgs};
use pseudoroot::modules::pseudo::PseudoRoot;
use pseudoroot::modules::tree::TreeMaintenance;
use pseudoroot::modules::v4root::AnchorStatus;
use pseudoroot::{Config, CreateStatus, FsidType, PseudoRootManager, TeardownReport};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn built(status: CreateStatus) -> pseudoroot::modules::v4root::BuildReport {
    match status {
        CreateStatus::Built(report) => report,
        other => panic!("expected a built pseudo root, got {other:?}"),
    }
}

#[test]
fn test_disabled_does_nothing() {
    let (_dir, root) = temp_root();
    let config = Config {
        enabled: false,
        ..config_for(&root)
    };
    let manager = PseudoRootManager::new(&config, FakeMounter::new());

    let status = manager.create(&registry(&["/srv/a", "/srv/b"]));

    assert!(matches!(status, CreateStatus::Disabled));
    assert!(manager.mounter().calls().is_empty());
    assert!(!root.exists());
    assert!(manager.pseudo().chkroot(FsidType::Num, 0, None).is_none());
}

#[test]
fn test_root_file_means_no_mounts() -> Result<()> {
    let (_dir, root) = temp_root();
    fs::write(&root, "")?;
    let manager = PseudoRootManager::new(&config_for(&root), FakeMounter::new());

    let status = manager.create(&registry(&["/srv/a"]));

    assert!(matches!(status, CreateStatus::Aborted(_)));
    assert_eq!(manager.mounter().mount_count(), 0);
    assert!(manager.pseudo().chkroot(FsidType::Num, 0, None).is_none());
    Ok(())
}

#[test]
fn test_create_then_destroy() -> Result<()> {
    let (_dir, root) = temp_root();
    let manager = PseudoRootManager::new(&config_for(&root), FakeMounter::new());

    let report = built(manager.create(&registry(&["/srv/nfs", "/srv/nfs/home", "/data"])));
    assert!(matches!(report.anchor, AnchorStatus::Mounted));
    assert!(report.is_complete());
    assert_eq!(report.mounted(), 3);
    assert!(root.join("srv/nfs/home").is_dir());
    assert!(root.join("data").is_dir());
    assert_eq!(manager.mounter().active().len(), 4);

    let teardown = manager.destroy();
    assert!(teardown.is_clean());
    assert!(manager.mounter().active().is_empty());
    assert!(!root.exists());
    assert!(matches!(
        manager.mounter().calls().last(),
        Some(Call::Umount { flags, .. }) if *flags == MntFlags::MNT_DETACH
    ));

    assert!(matches!(manager.destroy(), TeardownReport::NotPresent));
    Ok(())
}

#[test]
fn test_binds_follow_path_length() {
    let (_dir, root) = temp_root();
    let manager = PseudoRootManager::new(&config_for(&root), FakeMounter::new());

    built(manager.create(&registry(&["/a", "/a/b/c", "/x"])));

    assert_eq!(
        manager.mounter().bind_sources(),
        vec![
            PathBuf::from("/a"),
            PathBuf::from("/x"),
            PathBuf::from("/a/b/c")
        ]
    );
}

#[test]
fn test_bind_targets_under_root() {
    let (_dir, root) = temp_root();
    let manager = PseudoRootManager::new(&config_for(&root), FakeMounter::new());

    let report = built(manager.create(&registry(&["/srv/nfs"])));

    assert_eq!(report.outcomes[0].target, root.join("srv/nfs"));
    let expected = root.join("srv/nfs");
    assert!(manager
        .mounter()
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Mount { target, .. } if *target == expected)));
}

#[test]
fn test_failed_export_does_not_stop_others() {
    let (_dir, root) = temp_root();
    let mounter = FakeMounter::new().failing_on(root.join("srv/broken"));
    let manager = PseudoRootManager::new(&config_for(&root), mounter);

    let exports = registry(&["/srv/ok", "/srv/broken", "/srv/ok/deeper"]);
    let report = built(manager.create(&exports));

    assert!(!report.is_complete());
    assert_eq!(report.mounted(), 2);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].export_path, PathBuf::from("/srv/broken"));
    assert!(matches!(failures[0].result, Err(ExportFailure::Bind(_))));

    // the root export is still published
    assert!(manager.pseudo().chkroot(FsidType::Num, 0, None).is_some());
}

#[test]
fn test_anchor_failure_still_binds() {
    let (_dir, root) = temp_root();
    let mounter = FakeMounter::new().failing_on(&root);
    let manager = PseudoRootManager::new(&config_for(&root), mounter);

    let report = built(manager.create(&registry(&["/srv/a"])));

    assert!(matches!(report.anchor, AnchorStatus::Failed(_)));
    assert!(report.is_complete());
}

#[test]
fn test_existing_mountpoint_is_reused() {
    let (_dir, root) = temp_root();
    let manager = PseudoRootManager::new(&config_for(&root), FakeMounter::new());

    built(manager.create(&registry(&["/srv/a"])));
    let report = built(manager.create(&registry(&["/srv/a"])));

    assert!(matches!(report.anchor, AnchorStatus::AlreadyMounted));
    let tmpfs_mounts = manager
        .mounter()
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Mount { fstype: Some(t), .. } if t == "tmpfs"))
        .count();
    assert_eq!(tmpfs_mounts, 1);
}

#[test]
fn test_lookups_follow_lifecycle() {
    let (_dir, root) = temp_root();
    let manager = PseudoRootManager::new(&config_for(&root), FakeMounter::new());
    let pseudo = manager.pseudo();
    let root_str = root.to_string_lossy().into_owned();
    let inside = format!("{}/srv/nfs", root_str);

    assert!(pseudo.chkroot(FsidType::Num, 0, None).is_none());
    assert_eq!(pseudo.maproot(&inside), None);

    built(manager.create(&registry(&["/srv/nfs"])));

    let export = pseudo.chkroot(FsidType::Num, 0, None).expect("published");
    assert_eq!(export.path, root);
    assert!(pseudo.chkroot(FsidType::Num, 7, None).is_none());
    assert!(pseudo.chkroot(FsidType::Uuid16, 0, None).is_none());
    assert_eq!(pseudo.maproot(&inside).as_deref(), Some("/srv/nfs"));
    assert_eq!(pseudo.maproot(&root_str).as_deref(), Some(root_str.as_str()));
    assert_eq!(pseudo.maproot("/elsewhere/srv/nfs"), None);
    assert!(pseudo.export(&root_str).is_some());
    assert!(pseudo.export(&inside).is_none());

    manager.destroy();

    assert!(pseudo.chkroot(FsidType::Num, 0, None).is_none());
    assert_eq!(pseudo.maproot(&inside), None);
    assert!(pseudo.export(&root_str).is_none());
}

#[test]
fn test_helper_tree_mode() -> Result<()> {
    let (_dir, root) = temp_root();
    let config = Config {
        tree: TreeMaintenance::Helper {
            mkdir: PathBuf::from("mkdir"),
            rmdir: PathBuf::from("rmdir"),
            timeout_secs: Some(10),
        },
        ..config_for(&root)
    };
    let manager = PseudoRootManager::new(&config, FakeMounter::new());

    let report = built(manager.create(&registry(&["/srv/nfs/home"])));
    assert!(report.is_complete());
    assert!(root.join("srv/nfs/home").is_dir());

    assert!(manager.destroy().is_clean());
    assert!(!root.exists());
    Ok(())
}

#[test]
fn test_parent_components_never_bound() {
    let (_dir, root) = temp_root();
    let manager = PseudoRootManager::new(&config_for(&root), FakeMounter::new());

    let report = built(manager.create(&registry(&["/srv/a", "/srv/../../etc"])));

    assert_eq!(report.mounted(), 1);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0].result,
        Err(ExportFailure::OutsideRoot(path)) if path == Path::new("/srv/../../etc")
    ));
    assert_eq!(manager.mounter().bind_sources(), vec![PathBuf::from("/srv/a")]);
    assert!(!root.join("etc").exists());
}

/// Records whether the root export was still published at each unmount.
#[derive(Default)]
struct PublishWatcher {
    pseudo: RefCell<Option<Arc<PseudoRoot>>>,
    seen: RefCell<Vec<bool>>,
}

impl PublishWatcher {
    fn watch(&self, pseudo: Arc<PseudoRoot>) {
        *self.pseudo.borrow_mut() = Some(pseudo);
    }
}

impl Mounter for PublishWatcher {
    fn mount(&self, _args: &MountArgs<'_>) -> Result<(), MountError> {
        Ok(())
    }

    fn umount(&self, _args: &UnmountArgs<'_>) -> Result<(), MountError> {
        if let Some(pseudo) = self.pseudo.borrow().as_ref() {
            self.seen.borrow_mut().push(pseudo.is_published());
        }
        Ok(())
    }

    fn is_mountpoint(&self, _path: &Path) -> bool {
        false
    }
}

#[test]
fn test_unpublished_before_detach() {
    let (_dir, root) = temp_root();
    let manager = PseudoRootManager::new(&config_for(&root), PublishWatcher::default());
    manager.mounter().watch(manager.pseudo());

    built(manager.create(&registry(&["/srv/a"])));
    assert!(manager.pseudo().is_published());

    manager.destroy();
    assert_eq!(*manager.mounter().seen.borrow(), vec![false]);
}
