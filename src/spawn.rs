//! Segment spawner: one command segment in, at most one child process out.
//!
//! The child is prepared in `pre_exec`, i.e. after fork and after the pipe
//! endpoints have been spliced onto stdin/stdout, and before exec:
//!
//! 1. become leader of a new process group,
//! 2. for a foreground job's first process on a terminal, make that group
//!    the terminal's foreground group,
//! 3. restore default dispositions for terminal-control signals,
//! 4. apply the segment's redirections (these override pipe wiring).
//!
//! Taking the terminal before exec means the job can never read the tty
//! while still in a background group.
//!
//! Pipe endpoints are created close-on-exec, so every endpoint the child did
//! not receive as stdin/stdout is gone once the new image starts.

use std::io;
use std::os::fd::RawFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};

use os_pipe::{PipeReader, PipeWriter};
use tracing::{debug, trace};

use crate::errors::{ExecError, SpawnError};
use crate::job_control;
use crate::lookup;
use crate::parser::Segment;
use crate::redirect::{self, RedirectPlan};

/// A launched segment. Only the job waiter reaps it.
#[derive(Debug)]
pub struct ProcessHandle {
    position: usize,
    child: Child,
}

impl ProcessHandle {
    pub fn pid(&self) -> libc::pid_t {
        self.child.id() as libc::pid_t
    }

    /// Index of the segment within its pipeline (0-based).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Non-blocking status check.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}

/// Spawn one segment with optional pipe endpoints attached. With `terminal`
/// set, the new process group becomes that terminal's foreground group.
///
/// Returns `Ok(None)` when the segment has no program name left once
/// redirections are taken out.
pub fn spawn(
    position: usize,
    segment: Segment,
    upstream: Option<PipeReader>,
    downstream: Option<PipeWriter>,
    terminal: Option<RawFd>,
) -> Result<Option<ProcessHandle>, SpawnError> {
    let (args, redirections) = redirect::extract_redirections(segment.tokens())?;
    let Some((program, args)) = args.split_first() else {
        trace!(position, "segment has no program; nothing to spawn");
        return Ok(None);
    };

    if lookup::find_executable(program).is_none() {
        return Err(SpawnError::CommandNotFound(program.clone()));
    }

    let plan = RedirectPlan::prepare(&redirections)?;

    let mut command = Command::new(program);
    command.args(args);
    if let Some(reader) = upstream {
        command.stdin(Stdio::from(reader));
    }
    if let Some(writer) = downstream {
        command.stdout(Stdio::from(writer));
    }

    unsafe {
        command.pre_exec(move || {
            prepare_child(&plan, terminal);
            Ok(())
        });
    }

    let child = command
        .spawn()
        .map_err(|source| classify_spawn_failure(program, source))?;

    let pid = child.id() as libc::pid_t;
    // Also set from the parent so the group exists before anyone signals it.
    if let Err(e) = job_control::lead_own_group(pid) {
        trace!(pid, error = %e, "parent-side setpgid failed");
    }

    debug!(position, program = %program, pid, "spawned segment");
    Ok(Some(ProcessHandle { position, child }))
}

/// Runs in the child between fork and exec. Never returns on redirection
/// failure: the child exits with status 1 and the parent carries on.
fn prepare_child(plan: &RedirectPlan, terminal: Option<RawFd>) {
    // On failure the child stays in the interpreter's group, as in any shell.
    let _ = job_control::lead_own_group(0);
    if let Some(tty) = terminal {
        let _ = job_control::set_foreground_group(tty, unsafe { libc::getpid() });
    }
    job_control::restore_default_signals();

    if let Err(failure) = plan.attach() {
        plan.write_failure(failure, libc::STDERR_FILENO);
        unsafe { libc::_exit(1) };
    }
}

/// `fork` itself failing (resource exhaustion) stops the whole pipeline;
/// anything else reported by the spawn call is the exec step failing.
fn classify_spawn_failure(program: &str, source: io::Error) -> SpawnError {
    match source.raw_os_error() {
        Some(libc::EAGAIN | libc::ENOMEM) => SpawnError::ProcessCreationFailed {
            program: program.to_string(),
            source,
        },
        _ => ExecError::ImageReplacementFailed {
            program: program.to_string(),
            source,
        }
        .into(),
    }
}
