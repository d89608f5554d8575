//! Default paths, modes and identities.

use std::time::Duration;

// Pseudo root layout
/// Root directory used when none is configured.
pub const DEFAULT_PSEUDO_ROOT: &str = "/var/lib/nfs/v4root";
/// Mode of a freshly created root directory.
pub const ROOT_MODE: u32 = 0o755;

// Synthesized export identity
/// Host pattern of the root export.
pub const PSEUDO_HOSTNAME: &str = "*";
/// Numeric fsid that names the pseudo root in file handles.
pub const PSEUDO_FSID: u32 = 0;
/// Anonymous uid (`nobody`).
pub const ANON_UID: u32 = 65534;
/// Anonymous gid (`nogroup`).
pub const ANON_GID: u32 = 65534;

// Helper programs for directory maintenance
/// Default `mkdir` helper.
pub const MKDIR_CMD: &str = "/bin/mkdir";
/// Default `rmdir` helper.
pub const RMDIR_CMD: &str = "/bin/rmdir";
/// How long a helper may run before it is killed.
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(30);

/// Size of the buffer used for captured helper output and argv traces.
pub const BUFSIZ: usize = 8192;

/// Mount table consulted to recognise mountpoints.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";
