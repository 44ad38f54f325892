/// How a waited-on process ended (or paused).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Exited(i32),
    Signaled(i32),
    Stopped(i32),
}

impl TerminalStatus {
    /// Decode a raw `waitpid` status. `None` for statuses that are neither an
    /// exit, a termination nor a stop (e.g. `WIFCONTINUED`).
    pub fn from_wait_status(raw_status: libc::c_int) -> Option<Self> {
        if unsafe { libc::WIFEXITED(raw_status) } {
            return Some(Self::Exited(unsafe { libc::WEXITSTATUS(raw_status) }));
        }

        if unsafe { libc::WIFSIGNALED(raw_status) } {
            return Some(Self::Signaled(unsafe { libc::WTERMSIG(raw_status) }));
        }

        if unsafe { libc::WIFSTOPPED(raw_status) } {
            return Some(Self::Stopped(unsafe { libc::WSTOPSIG(raw_status) }));
        }

        None
    }

    /// Shell-style exit code: the exit status itself, or `128 + signal`.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(signal) | Self::Stopped(signal) => 128 + signal,
        }
    }

    /// Non-zero exit or death by signal.
    pub fn is_abnormal(self) -> bool {
        match self {
            Self::Exited(code) => code != 0,
            Self::Signaled(_) => true,
            Self::Stopped(_) => false,
        }
    }
}
