use std::io::Write;

use tracing::{debug, warn};

use crate::job_control;
use crate::pipeline::Job;
use crate::spawn::ProcessHandle;
use crate::status::TerminalStatus;

/// Exit code recorded when the last segment never became a process.
const NOT_LAUNCHED_EXIT_CODE: i32 = 127;

/// What waiting on a job produced.
#[derive(Debug)]
pub enum WaitOutcome {
    /// Every handle was reaped. `last` is the last segment's status, if that
    /// segment was spawned at all.
    Finished { last: Option<TerminalStatus> },
    /// A foreground process stopped (Ctrl-Z); the job is no longer tracked.
    Stopped { pid: libc::pid_t },
    /// Launched in the background; the handles were not waited on.
    Background { handles: Vec<ProcessHandle> },
}

impl WaitOutcome {
    /// `$?`-style code for the supervisor.
    pub fn exit_code(&self) -> i32 {
        match self {
            WaitOutcome::Finished { last: Some(status) } => status.exit_code(),
            WaitOutcome::Finished { last: None } => NOT_LAUNCHED_EXIT_CODE,
            WaitOutcome::Stopped { .. } => 128 + libc::SIGTSTP,
            WaitOutcome::Background { .. } => 0,
        }
    }
}

/// Job waiter. The only place that reaps foreground handles.
///
/// Foreground: block until every handle terminates, then report the last
/// segment's status if it is abnormal. Background: announce the job by its
/// first pid and return at once. A terminal lease held by the job is
/// released, handing the terminal back, before anything is reported.
pub fn wait(mut job: Job, out: &mut dyn Write, err: &mut dyn Write) -> WaitOutcome {
    let single = job.is_single();
    if job.background {
        return announce_background(job, single, out);
    }

    let terminal = job.terminal.take();
    let last_position = job.last_position();
    let mut last = None;
    for handle in &job.handles {
        let pid = handle.pid();
        match job_control::wait_for_pid(pid) {
            Ok(TerminalStatus::Stopped(signal)) => {
                debug!(pid, signal, "foreground process stopped");
                drop(terminal);
                let _ = writeln!(out, "[{pid}] Stopped");
                return WaitOutcome::Stopped { pid };
            }
            Ok(status) => {
                debug!(pid, ?status, position = handle.position(), "reaped");
                if handle.position() == last_position {
                    last = Some(status);
                }
            }
            Err(e) => warn!(pid, error = %e, "waitpid failed"),
        }
    }
    drop(terminal);

    report(last, single, err);
    WaitOutcome::Finished { last }
}

fn announce_background(job: Job, single: bool, out: &mut dyn Write) -> WaitOutcome {
    if let Some(pid) = job.leader_pid() {
        let kind = if single { "Process" } else { "Pipeline" };
        let _ = writeln!(out, "[{pid}] {kind} running in background");
        debug!(pid, "background job launched");
    }
    WaitOutcome::Background {
        handles: job.handles,
    }
}

/// Only the last segment is surfaced; earlier abnormal statuses are not.
fn report(last: Option<TerminalStatus>, single: bool, err: &mut dyn Write) {
    let Some(status) = last.filter(|status| status.is_abnormal()) else {
        return;
    };
    let noun = if single { "command" } else { "pipeline" };
    let _ = match status {
        TerminalStatus::Exited(code) => writeln!(err, "peri: {noun} exited with status {code}"),
        TerminalStatus::Signaled(signal) => {
            writeln!(err, "peri: {noun} terminated by signal {signal}")
        }
        TerminalStatus::Stopped(_) => Ok(()),
    };
}

/// A background job kept around only so it can be reaped later.
struct BackgroundJob {
    leader: libc::pid_t,
    handles: Vec<ProcessHandle>,
}

/// Background jobs awaiting a non-blocking reap. Only used when background
/// reaping is turned on; otherwise background handles are simply dropped and
/// their processes linger as zombies until the interpreter exits.
#[derive(Default)]
pub struct BackgroundJobs {
    jobs: Vec<BackgroundJob>,
}

impl BackgroundJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handles: Vec<ProcessHandle>) {
        let Some(leader) = handles.first().map(ProcessHandle::pid) else {
            return;
        };
        self.jobs.push(BackgroundJob { leader, handles });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Non-blocking poll of every tracked process. Prints `[pid] Done` for
    /// each job whose processes have all exited and forgets it.
    pub fn reap(&mut self, out: &mut dyn Write) {
        self.jobs.retain_mut(|job| {
            job.handles.retain_mut(|handle| match handle.try_wait() {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    warn!(pid = handle.pid(), error = %e, "error checking background process");
                    false
                }
            });

            if job.handles.is_empty() {
                let _ = writeln!(out, "[{}] Done", job.leader);
                return false;
            }
            true
        });
    }
}
