// SPDX-License-Identifier: GPL-3.0-only

//! System command helpers
//!
//! Both the camera and audio backends drive the board through fixed command
//! lines (`tinyplay`, `lsof`, `pkill`, ...). Commands are built as plain data
//! first so the exact argument vectors can be checked without hardware, then
//! turned into [`std::process::Command`] at the last moment.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Read};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Poll interval while waiting on a child with a deadline
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A command line: program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCommand {
    program: String,
    args: Vec<String>,
}

impl SystemCommand {
    /// Create a command without arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Create a command, prefixed with `sudo` when `use_sudo` is set
    pub fn privileged(use_sudo: bool, program: impl Into<String>) -> Self {
        if use_sudo {
            Self::new("sudo").arg(program)
        } else {
            Self::new(program)
        }
    }

    /// `kill -9 <pid>...`
    pub fn kill(use_sudo: bool, pids: &BTreeSet<u32>) -> Self {
        Self::privileged(use_sudo, "kill")
            .arg("-9")
            .args(pids.iter().map(u32::to_string))
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector including the program
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Build the `std::process::Command`
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Run to completion capturing stdout and stderr
    pub fn output(&self) -> io::Result<Output> {
        debug!(command = %self, "Running command");
        self.to_command().stdin(Stdio::null()).output()
    }

    /// Run to completion with all output discarded, ignoring any failure
    ///
    /// Returns the exit status when the process could be started.
    pub fn run_quiet(&self) -> Option<ExitStatus> {
        debug!(command = %self, "Running command (quiet)");
        match self
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(command = %self, error = %e, "Command could not be started");
                None
            }
        }
    }

    /// Run capturing stdout, killing the child if it outlives `timeout`
    ///
    /// Returns `Ok(None)` on timeout. Stderr is discarded. The child runs in
    /// its own process group and the whole group is killed on timeout. The
    /// call never waits past the deadline, even when a process that escaped
    /// the group still holds stdout open.
    pub fn output_with_timeout(&self, timeout: Duration) -> io::Result<Option<Output>> {
        debug!(command = %self, timeout_ms = timeout.as_millis() as u64, "Running command with timeout");

        let mut command = self.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;

        // Drain stdout on a separate thread so a full pipe cannot stall the child
        let mut stdout = child.stdout.take();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(out) = stdout.as_mut() {
                let _ = out.read_to_end(&mut buf);
            }
            let _ = tx.send(buf);
        });

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                kill_group(&mut child);
                debug!(command = %self, "Command timed out");
                return Ok(None);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        };

        // A leftover grandchild may keep the pipe open after the child exits
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining.max(WAIT_POLL_INTERVAL)) {
            Ok(stdout) => Ok(Some(Output {
                status,
                stdout,
                stderr: Vec::new(),
            })),
            Err(_) => {
                kill_group(&mut child);
                debug!(command = %self, "Command output still open at deadline");
                Ok(None)
            }
        }
    }
}

/// SIGKILL the child's process group, then reap the child
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: plain syscall on a group id we created; failures are ignored
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}
