//! Background detachment for `serve --daemon`.

use anyhow::{Context, Result};
use log::{error, info, warn};
use nix::sys::stat::{self, Mode};
use nix::unistd::{self, fork, ForkResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Detaches the service from its terminal and tracks it in a PID file.
pub struct Daemon {
    pid_file: PathBuf,
    work_dir: PathBuf,
}

impl Daemon {
    /// # Arguments
    ///
    /// * `pid_file` - Where the daemon's process ID is written
    /// * `work_dir` - Working directory for the daemon process
    pub fn new(pid_file: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Where the PID file is written.
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Double-forks into the background.
    ///
    /// Only the final grandchild returns; both intermediate processes exit.
    ///
    /// # Returns
    ///
    /// * `Ok(())` in the detached process, with stdio on `/dev/null` and the
    ///   PID file written
    /// * `Err` if a fork, `setsid` or the PID file failed
    pub fn start(&self) -> Result<()> {
        // SAFETY: no other threads exist yet when the binary daemonizes
        match unsafe { fork() } {
            Ok(ForkResult::Parent { .. }) => std::process::exit(0),
            Ok(ForkResult::Child) => {}
            Err(err) => {
                error!("First fork failed: {}", err);
                return Err(err.into());
            }
        }

        unistd::setsid().context("setsid failed")?;

        // SAFETY: as above, still single-threaded
        match unsafe { fork() } {
            Ok(ForkResult::Parent { .. }) => std::process::exit(0),
            Ok(ForkResult::Child) => {}
            Err(err) => {
                error!("Second fork failed: {}", err);
                return Err(err.into());
            }
        }

        stat::umask(Mode::from_bits_truncate(0o022));
        std::env::set_current_dir(&self.work_dir)
            .with_context(|| format!("Failed to enter {}", self.work_dir.display()))?;
        self.redirect_stdio()?;
        self.write_pid_file()?;

        info!("Daemon started with pid {}", std::process::id());
        Ok(())
    }

    pub(crate) fn write_pid_file(&self) -> Result<()> {
        let mut file = File::create(&self.pid_file)
            .with_context(|| format!("Failed to create {}", self.pid_file.display()))?;
        writeln!(file, "{}", std::process::id())?;
        Ok(())
    }

    /// Removes the PID file on shutdown. A file that is already gone is fine.
    pub fn remove_pid_file(&self) {
        match fs::remove_file(&self.pid_file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.pid_file.display(), e),
        }
    }

    fn redirect_stdio(&self) -> Result<()> {
        let null_file = File::options().read(true).write(true).open("/dev/null")?;
        let null_fd = null_file.as_raw_fd();

        for fd in 0..3 {
            unistd::dup2(null_fd, fd)?;
        }
        Ok(())
    }
}
