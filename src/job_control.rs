//! Process groups, signal dispositions and the controlling terminal.
//!
//! Every spawned segment leads its own process group. When the interpreter
//! runs a foreground job on a terminal, the job's first process takes the
//! terminal in `pre_exec`, before it can read from it, and the interpreter
//! takes it back when the [`TerminalLease`] is dropped.

use std::io::{self, IsTerminal};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};

use tracing::warn;

use crate::status::TerminalStatus;

/// Terminal-generated signals whose disposition the interpreter changes and
/// every child must restore to default.
pub const TERMINAL_SIGNALS: [libc::c_int; 5] = [
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTSTP,
    libc::SIGTTIN,
    libc::SIGTTOU,
];

/// Run a libc call until it stops failing with `EINTR`.
fn retry_on_interrupt(mut call: impl FnMut() -> libc::c_int) -> io::Result<libc::c_int> {
    loop {
        let rc = call();
        if rc >= 0 {
            return Ok(rc);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Make `pid` (0 for the caller) the leader of a new group with its own id.
///
/// Called from both sides of the fork; whichever runs second finds the
/// child already exec'd (`EACCES`) or gone (`ESRCH`), which is fine.
pub fn lead_own_group(pid: libc::pid_t) -> io::Result<()> {
    match retry_on_interrupt(|| unsafe { libc::setpgid(pid, 0) }) {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.raw_os_error(), Some(libc::EACCES | libc::ESRCH)) => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn process_group_id(pid: libc::pid_t) -> io::Result<libc::pid_t> {
    retry_on_interrupt(|| unsafe { libc::getpgid(pid) })
}

/// Process group of the calling process.
pub fn own_process_group() -> libc::pid_t {
    unsafe { libc::getpgrp() }
}

/// Interpreter-side dispositions set once at startup. Quit and terminal stop
/// are ignored so the prompt survives them; background tty access is ignored
/// so the interpreter can take the terminal back from a finished job. SIGINT
/// is handled by `ctrlc`.
pub fn ignore_job_control_signals() -> io::Result<()> {
    for signal in [libc::SIGQUIT, libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU] {
        if unsafe { libc::signal(signal, libc::SIG_IGN) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Child-side: put every terminal-control signal back to `SIG_DFL`.
/// Async-signal-safe; meant for the window between fork and exec.
pub fn restore_default_signals() {
    for signal in TERMINAL_SIGNALS {
        unsafe {
            libc::signal(signal, libc::SIG_DFL);
        }
    }
}

/// Make `pgid` the foreground group of the terminal on `tty`.
///
/// `SIGTTOU` is ignored around the call: a caller outside the current
/// foreground group would otherwise be stopped by it. Async-signal-safe.
pub fn set_foreground_group(tty: RawFd, pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::from(io::ErrorKind::InvalidInput));
    }

    let previous = unsafe { libc::signal(libc::SIGTTOU, libc::SIG_IGN) };
    let result = retry_on_interrupt(|| unsafe { libc::tcsetpgrp(tty, pgid) }).map(drop);
    if previous != libc::SIG_ERR {
        unsafe { libc::signal(libc::SIGTTOU, previous) };
    }
    result
}

/// The interpreter's claim on its controlling terminal while a foreground
/// job holds it. Dropping the lease makes the interpreter's group the
/// foreground group again.
#[derive(Debug)]
pub struct TerminalLease {
    tty: OwnedFd,
    interpreter_group: libc::pid_t,
}

impl TerminalLease {
    /// `Ok(None)` when standard input is not a terminal.
    pub fn claim() -> io::Result<Option<Self>> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }
        // Close-on-exec duplicate, so it is still open in `pre_exec` after
        // fd 0 has been replaced by a pipe.
        let tty = stdin.as_fd().try_clone_to_owned()?;
        Ok(Some(Self {
            tty,
            interpreter_group: own_process_group(),
        }))
    }

    pub fn raw_fd(&self) -> RawFd {
        self.tty.as_raw_fd()
    }

    pub fn hand_to(&self, pgid: libc::pid_t) -> io::Result<()> {
        set_foreground_group(self.raw_fd(), pgid)
    }
}

impl Drop for TerminalLease {
    fn drop(&mut self) {
        if let Err(e) = set_foreground_group(self.raw_fd(), self.interpreter_group) {
            warn!(error = %e, "could not take the terminal back");
        }
    }
}

/// Block until `pid` terminates or stops.
pub fn wait_for_pid(pid: libc::pid_t) -> io::Result<TerminalStatus> {
    let mut raw_status: libc::c_int = 0;
    loop {
        retry_on_interrupt(|| unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) })?;
        if let Some(status) = TerminalStatus::from_wait_status(raw_status) {
            return Ok(status);
        }
    }
}
