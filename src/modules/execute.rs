//! Runs the helper programs that maintain the pseudo root's directory tree.
//!
//! The child's stdout and stderr share one pipe. Whatever the helper prints
//! is treated as a diagnostic: the first buffer of it is logged as an error
//! and handed back in the [`ExecOutcome`].

use super::constants::BUFSIZ;
use super::error::ExecError;
use log::{debug, error, log_enabled, Level};
use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::FromRawFd;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a helper run that got as far as exiting.
#[derive(Debug)]
pub struct ExecOutcome {
    /// How the helper exited
    pub status: ExitStatus,
    /// Captured output, cut at the last newline inside the first
    /// [`BUFSIZ`] bytes.
    pub diagnostic: Option<String>,
}

impl ExecOutcome {
    /// Exit code, `None` if the helper was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Zero exit status and nothing printed.
    pub fn success(&self) -> bool {
        self.status.success() && self.diagnostic.is_none()
    }
}

// Logs the argument vector when call tracing is on.
fn show_argv<S: AsRef<OsStr>>(msg: &str, argv: &[S]) {
    if !log_enabled!(Level::Debug) {
        return;
    }

    let mut buf = String::with_capacity(BUFSIZ);
    buf.push_str(msg);
    buf.push(' ');
    for arg in argv {
        let arg = arg.as_ref().to_string_lossy();
        if buf.len() + arg.len() >= BUFSIZ {
            break;
        }
        buf.push_str(&arg);
        buf.push(' ');
    }
    debug!("{}", buf);
}

fn capture(mut reader: File) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BUFSIZ);
    let _ = (&mut reader).take(BUFSIZ as u64).read_to_end(&mut buf);
    // Keep draining so a chatty child never blocks on a full pipe.
    let _ = io::copy(&mut reader, &mut io::sink());
    buf
}

fn diagnostic_line(captured: &[u8]) -> Option<String> {
    if captured.is_empty() {
        return None;
    }
    let end = captured
        .iter()
        .rposition(|&b| b == b'\n')
        .unwrap_or(captured.len());
    Some(String::from_utf8_lossy(&captured[..end]).into_owned())
}

fn wait(
    child: &mut Child,
    program: &str,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
) -> Result<ExitStatus, ExecError> {
    let wait_error = |source: io::Error| ExecError::Wait {
        program: program.to_string(),
        source,
    };

    let (Some(timeout), Some(deadline)) = (timeout, deadline) else {
        return child.wait().map_err(wait_error);
    };

    loop {
        match child.try_wait().map_err(wait_error)? {
            Some(status) => return Ok(status),
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::TimedOut {
                    program: program.to_string(),
                    timeout,
                });
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

// Output stays open for as long as anything the helper left behind holds the
// write end, so the drain is bounded by the same deadline as the wait.
fn collect(
    output: &Receiver<Vec<u8>>,
    program: &str,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
) -> Result<Vec<u8>, ExecError> {
    let (Some(timeout), Some(deadline)) = (timeout, deadline) else {
        return Ok(output.recv().unwrap_or_default());
    };

    match output.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(captured) => Ok(captured),
        Err(RecvTimeoutError::Disconnected) => Ok(Vec::new()),
        Err(RecvTimeoutError::Timeout) => Err(ExecError::TimedOut {
            program: program.to_string(),
            timeout,
        }),
    }
}

/// Runs `program` with `argv` (including `argv[0]`) and waits for it.
///
/// `timeout` bounds the whole call: the child's exit and the collection of
/// its output. `None` waits for as long as the child and anything it leaves
/// running keep the output open. Every failure is logged before it is
/// returned.
pub fn execute<S: AsRef<OsStr>>(
    program: &Path,
    argv: &[S],
    timeout: Option<Duration>,
) -> Result<ExecOutcome, ExecError> {
    let name = program.display().to_string();
    show_argv("executing:", argv);

    let (read_fd, write_fd) = pipe2(OFlag::O_CLOEXEC).map_err(|errno| {
        let err = ExecError::Pipe(errno);
        error!("{}", err);
        err
    })?;
    // SAFETY: both descriptors come straight from pipe2 and have no other owner.
    let reader = unsafe { File::from_raw_fd(read_fd) };
    let writer = unsafe { File::from_raw_fd(write_fd) };

    // Our copies of the write end die with the command inside this closure,
    // so the reader sees EOF once the child exits.
    let spawned = writer.try_clone().and_then(|stderr| {
        let mut cmd = Command::new(program);
        if let Some((arg0, args)) = argv.split_first() {
            cmd.arg0(arg0).args(args);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr))
            .spawn()
    });

    let mut child = spawned.map_err(|source| {
        let err = ExecError::Spawn {
            program: name.clone(),
            source,
        };
        error!("{}", err);
        err
    })?;
    let deadline = timeout.map(|t| Instant::now() + t);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(capture(reader));
    });

    let (status, captured) = wait(&mut child, &name, timeout, deadline)
        .and_then(|status| {
            collect(&rx, &name, timeout, deadline).map(|captured| (status, captured))
        })
        .map_err(|err| {
            error!("{}", err);
            err
        })?;

    let diagnostic = diagnostic_line(&captured);
    if let Some(text) = &diagnostic {
        error!("Error: {}", text);
    }

    Ok(ExecOutcome { status, diagnostic })
}

fn execute_checked<S: AsRef<OsStr>>(
    program: &Path,
    argv: &[S],
    timeout: Option<Duration>,
) -> Result<(), ExecError> {
    let outcome = execute(program, argv, timeout)?;
    if outcome.success() {
        Ok(())
    } else {
        Err(ExecError::Failed {
            program: program.display().to_string(),
            code: outcome.code(),
            diagnostic: outcome.diagnostic,
        })
    }
}

/// `mkdir -p dir`
pub fn exec_mkpath(
    mkdir: &Path,
    dir: &Path,
    timeout: Option<Duration>,
) -> Result<(), ExecError> {
    execute_checked(
        mkdir,
        &[mkdir.as_os_str(), OsStr::new("-p"), dir.as_os_str()],
        timeout,
    )
}

/// `rmdir dir`
pub fn exec_rmdir(
    rmdir: &Path,
    dir: &Path,
    timeout: Option<Duration>,
) -> Result<(), ExecError> {
    execute_checked(rmdir, &[rmdir.as_os_str(), dir.as_os_str()], timeout)
}
