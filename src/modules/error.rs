//! Error types for pseudo root construction and teardown.
//!
//! None of these escape the lifecycle operations as panics or early returns:
//! they are logged where they happen and collected into reports.

use nix::errno::Errno;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A failed `mount(2)` or `umount(2)` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{op} {} failed: errno {} ({})", .target.display(), errno_code(.errno), .errno.desc())]
pub struct MountError {
    /// Either "mounting" or "unmounting"
    pub op: &'static str,
    /// Mount target
    pub target: PathBuf,
    /// Error reported by the kernel
    pub errno: Errno,
}

fn errno_code(errno: &Errno) -> i32 {
    *errno as i32
}

impl MountError {
    /// Error for a failed mount of `target`.
    pub fn mounting(target: impl Into<PathBuf>, errno: Errno) -> Self {
        Self {
            op: "mounting",
            target: target.into(),
            errno,
        }
    }

    /// Error for a failed unmount of `target`.
    pub fn unmounting(target: impl Into<PathBuf>, errno: Errno) -> Self {
        Self {
            op: "unmounting",
            target: target.into(),
            errno,
        }
    }
}

/// Reasons the pseudo root directory could not be prepared.
#[derive(Error, Debug)]
pub enum RootError {
    /// The root could not be examined
    #[error("{}: {source}", .path.display())]
    Stat {
        /// Root directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The root was missing and could not be created
    #[error("Unable to create {}: {source}", .path.display())]
    Create {
        /// Root directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Something other than a directory is in the way
    #[error("{}: Not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Failure of a helper subprocess.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The output pipe could not be created
    #[error("pipe() failed: {0}")]
    Pipe(#[source] Errno),

    /// The helper could not be started
    #[error("unable to run {program}: {source}")]
    Spawn {
        /// Helper program
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the helper failed
    #[error("waiting for {program} failed: {source}")]
    Wait {
        /// Helper program
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The helper, or something it left running, outlived the timeout
    #[error("{program} did not exit within {timeout:?}")]
    TimedOut {
        /// Helper program
        program: String,
        /// The limit that was exceeded
        timeout: Duration,
    },

    /// The helper exited non-zero or printed something
    #[error("{program} failed (exit code {code:?}){}", diagnostic_suffix(.diagnostic))]
    Failed {
        /// Helper program
        program: String,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Captured output
        diagnostic: Option<String>,
    },
}

fn diagnostic_suffix(diagnostic: &Option<String>) -> String {
    diagnostic
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

/// Failure to create or remove part of the directory tree.
#[derive(Error, Debug)]
pub enum TreeError {
    /// In-process directory call failed
    #[error("{}: {source}", .path.display())]
    Io {
        /// Directory being created or removed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Helper program failed
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Why a single export did not end up mounted in the pseudo tree.
#[derive(Error, Debug)]
pub enum ExportFailure {
    /// The export path would land outside the pseudo root
    #[error("{} escapes the pseudo root", .0.display())]
    OutsideRoot(PathBuf),

    /// The mount point directory could not be created
    #[error("creating mount point: {0}")]
    MakePath(#[source] TreeError),

    /// The bind mount failed
    #[error(transparent)]
    Bind(#[from] MountError),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("reading {}: {source}", .path.display())]
    Read {
        /// File being loaded
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for what was expected
    #[error("parsing {}: {source}", .path.display())]
    Parse {
        /// File being loaded
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// Root given as a relative path
    #[error("pseudo root must be an absolute path: {}", .0.display())]
    RelativeRoot(PathBuf),

    /// Root given as `/`
    #[error("pseudo root cannot be the filesystem root")]
    SystemRoot,

    /// Export given as a relative path
    #[error("export path must be absolute: {}", .0.display())]
    RelativeExport(PathBuf),

    /// Export path containing `..`
    #[error("export path must not contain '..': {}", .0.display())]
    ParentDirExport(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_error_message() {
        let err = MountError::mounting("/var/lib/nfs/v4root/srv", Errno::ENOENT);
        assert_eq!(
            err.to_string(),
            "mounting /var/lib/nfs/v4root/srv failed: errno 2 (No such file or directory)"
        );
    }

    #[test]
    fn test_failed_exec_message() {
        let err = ExecError::Failed {
            program: "/bin/rmdir".into(),
            code: Some(1),
            diagnostic: Some("rmdir: failed to remove 'x': Directory not empty".into()),
        };
        assert!(err.to_string().ends_with("Directory not empty"));

        let quiet = ExecError::Failed {
            program: "/bin/rmdir".into(),
            code: Some(1),
            diagnostic: None,
        };
        assert_eq!(quiet.to_string(), "/bin/rmdir failed (exit code Some(1))");
    }
}
