use std::ffi::{CStr, CString};
use std::io;

use crate::errors::RedirectionError;

/// Permission bits for files created by `>` and `>>`.
pub const CREATE_MODE: libc::c_uint = 0o644;

/// A single I/O redirection taken out of a segment's token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirection {
    /// `< path`
    In(String),
    /// `> path` (truncate) or `>> path` (append)
    Out { path: String, append: bool },
}

impl Redirection {
    pub fn path(&self) -> &str {
        match self {
            Redirection::In(path) | Redirection::Out { path, .. } => path,
        }
    }

    fn target_fd(&self) -> libc::c_int {
        match self {
            Redirection::In(_) => libc::STDIN_FILENO,
            Redirection::Out { .. } => libc::STDOUT_FILENO,
        }
    }

    fn open_flags(&self) -> libc::c_int {
        match self {
            Redirection::In(_) => libc::O_RDONLY,
            Redirection::Out { append: false, .. } => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            Redirection::Out { append: true, .. } => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
        }
    }
}

/// Separate redirect operators from regular arguments, scanning left to right.
/// Returns the remaining program arguments and the redirections in the order
/// they appeared.
pub fn extract_redirections(
    tokens: &[String],
) -> Result<(Vec<String>, Vec<Redirection>), RedirectionError> {
    let mut args = Vec::new();
    let mut redirections = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i].as_str();

        match token {
            ">" => {
                i += 1;
                let path = expect_filename(i, tokens, ">")?;
                redirections.push(Redirection::Out { path, append: false });
            }
            ">>" => {
                i += 1;
                let path = expect_filename(i, tokens, ">>")?;
                redirections.push(Redirection::Out { path, append: true });
            }
            "<" => {
                i += 1;
                let path = expect_filename(i, tokens, "<")?;
                redirections.push(Redirection::In(path));
            }
            _ => args.push(token.to_string()),
        }

        i += 1;
    }

    Ok((args, redirections))
}

fn expect_filename(
    i: usize,
    tokens: &[String],
    operator: &'static str,
) -> Result<String, RedirectionError> {
    tokens
        .get(i)
        .cloned()
        .ok_or(RedirectionError::MissingOperand { operator })
}

/// One redirection with everything the child needs already allocated.
#[derive(Debug)]
struct PreparedRedirect {
    path: CString,
    flags: libc::c_int,
    target_fd: libc::c_int,
}

/// A redirection step that failed in the child: which one, and the errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachFailure {
    step: usize,
    errno: libc::c_int,
}

impl AttachFailure {
    fn last_os_error(step: usize) -> Self {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO);
        Self { step, errno }
    }
}

/// Redirections ready to be applied between fork and exec.
///
/// Paths are converted to C strings up front, so neither [`RedirectPlan::attach`]
/// nor [`RedirectPlan::write_failure`] allocates: between fork and exec only
/// `open`/`dup2`/`close`/`write` are issued.
#[derive(Debug, Default)]
pub struct RedirectPlan {
    steps: Vec<PreparedRedirect>,
}

impl RedirectPlan {
    pub fn prepare(redirections: &[Redirection]) -> Result<Self, RedirectionError> {
        let steps = redirections
            .iter()
            .map(|redirection| {
                let path = CString::new(redirection.path()).map_err(|e| {
                    RedirectionError::OpenFailed {
                        path: redirection.path().to_string(),
                        source: io::Error::new(io::ErrorKind::InvalidInput, e),
                    }
                })?;
                Ok(PreparedRedirect {
                    path,
                    flags: redirection.open_flags(),
                    target_fd: redirection.target_fd(),
                })
            })
            .collect::<Result<Vec<_>, RedirectionError>>()?;

        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Open each file in order and splice it onto the calling process's
    /// standard stream, replacing whatever was attached (pipe ends included).
    /// A later step for the same stream overwrites an earlier one.
    ///
    /// Only meant to run in a freshly forked child: it rewires fds 0 and 1 of
    /// the current process.
    pub fn attach(&self) -> Result<(), AttachFailure> {
        for (index, step) in self.steps.iter().enumerate() {
            let fd = unsafe { libc::open(step.path.as_ptr(), step.flags, CREATE_MODE) };
            if fd < 0 {
                return Err(AttachFailure::last_os_error(index));
            }

            // open() may hand back the target fd itself if it was closed.
            if fd == step.target_fd {
                continue;
            }

            let rc = unsafe { libc::dup2(fd, step.target_fd) };
            let failure = AttachFailure::last_os_error(index);
            unsafe { libc::close(fd) };
            if rc < 0 {
                return Err(failure);
            }
        }
        Ok(())
    }

    /// Write `peri: <path>: <os error>` for a failed step to `fd`.
    pub fn write_failure(&self, failure: AttachFailure, fd: libc::c_int) {
        let mut reason: [libc::c_char; 128] = [0; 128];
        let known = unsafe { libc::strerror_r(failure.errno, reason.as_mut_ptr(), reason.len()) } == 0;
        let reason: &[u8] = if known {
            unsafe { CStr::from_ptr(reason.as_ptr()) }.to_bytes()
        } else {
            b"unknown error"
        };
        let path = self
            .steps
            .get(failure.step)
            .map_or(&b"?"[..], |step| step.path.as_bytes());

        let parts: [&[u8]; 5] = [b"peri: ", path, b": ", reason, b"\n"];
        for part in parts {
            write_raw(fd, part);
        }
    }
}

/// `write(2)` the whole buffer, giving up on the first error.
fn write_raw(fd: libc::c_int, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len()) };
        if n < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
            continue;
        }
        if n <= 0 {
            return;
        }
        bytes = &bytes[n as usize..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn simple_stdout_redirect() {
        let (args, redirs) = extract_redirections(&tokens(&["echo", "hello", ">", "out.txt"])).unwrap();
        assert_eq!(args, vec!["echo", "hello"]);
        assert_eq!(
            redirs,
            vec![Redirection::Out { path: "out.txt".into(), append: false }]
        );
    }

    #[test]
    fn append_redirect() {
        let (args, redirs) = extract_redirections(&tokens(&["echo", "hello", ">>", "out.txt"])).unwrap();
        assert_eq!(args, vec!["echo", "hello"]);
        assert_eq!(
            redirs,
            vec![Redirection::Out { path: "out.txt".into(), append: true }]
        );
    }

    #[test]
    fn stdin_redirect() {
        let (args, redirs) = extract_redirections(&tokens(&["sort", "<", "data.txt"])).unwrap();
        assert_eq!(args, vec!["sort"]);
        assert_eq!(redirs, vec![Redirection::In("data.txt".into())]);
        assert_eq!(redirs[0].target_fd(), libc::STDIN_FILENO);
    }

    #[test]
    fn redirection_in_the_middle_keeps_later_args() {
        let (args, redirs) = extract_redirections(&tokens(&["grep", "<", "in.txt", "-n", "foo"])).unwrap();
        assert_eq!(args, vec!["grep", "-n", "foo"]);
        assert_eq!(redirs.len(), 1);
    }

    #[test]
    fn missing_filename_is_error() {
        let err = extract_redirections(&tokens(&["echo", ">"])).unwrap_err();
        assert!(matches!(err, RedirectionError::MissingOperand { operator: ">" }));
        assert_eq!(err.to_string(), "syntax error: expected filename after '>'");
    }

    #[test]
    fn operator_consumes_next_token_even_if_it_looks_like_an_operator() {
        let (args, redirs) = extract_redirections(&tokens(&["cat", "<", ">"])).unwrap();
        assert_eq!(args, vec!["cat"]);
        assert_eq!(redirs, vec![Redirection::In(">".into())]);
    }

    #[test]
    fn multiple_redirections_keep_order() {
        let (args, redirs) = extract_redirections(&tokens(&[
            "cmd", ">", "a.txt", "<", "in.txt", ">>", "b.txt",
        ]))
        .unwrap();
        assert_eq!(args, vec!["cmd"]);
        let paths: Vec<&str> = redirs.iter().map(Redirection::path).collect();
        assert_eq!(paths, vec!["a.txt", "in.txt", "b.txt"]);
    }

    #[test]
    fn only_redirections_leaves_no_program() {
        let (args, redirs) = extract_redirections(&tokens(&[">", "out.txt"])).unwrap();
        assert!(args.is_empty());
        assert_eq!(redirs.len(), 1);
    }

    #[test]
    fn open_flags_match_operator() {
        let trunc = Redirection::Out { path: "f".into(), append: false };
        let append = Redirection::Out { path: "f".into(), append: true };
        assert_ne!(trunc.open_flags() & libc::O_TRUNC, 0);
        assert_eq!(trunc.open_flags() & libc::O_APPEND, 0);
        assert_ne!(append.open_flags() & libc::O_APPEND, 0);
        assert_eq!(Redirection::In("f".into()).open_flags(), libc::O_RDONLY);
    }

    #[test]
    fn prepare_rejects_interior_nul() {
        let err = RedirectPlan::prepare(&[Redirection::In("bad\0path".into())]).unwrap_err();
        assert!(matches!(err, RedirectionError::OpenFailed { .. }));
    }

    #[test]
    fn prepare_keeps_every_step() {
        let plan = RedirectPlan::prepare(&[
            Redirection::In("in.txt".into()),
            Redirection::Out { path: "out.txt".into(), append: false },
        ])
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert!(!plan.is_empty());
        assert!(RedirectPlan::default().is_empty());
    }

    #[test]
    fn failed_open_reports_step_and_errno_without_rewiring() {
        let plan = RedirectPlan::prepare(&[
            Redirection::In("/peri/no/such/input".into()),
            Redirection::Out { path: "/peri/never/opened".into(), append: false },
        ])
        .unwrap();
        let failure = plan.attach().unwrap_err();
        assert_eq!(failure, AttachFailure { step: 0, errno: libc::ENOENT });
    }

    #[test]
    fn failure_message_names_path_and_reason() {
        use std::io::Read;
        use std::os::fd::AsRawFd;

        let plan = RedirectPlan::prepare(&[Redirection::In("/peri/no/such/input".into())]).unwrap();
        let (mut reader, writer) = os_pipe::pipe().unwrap();
        plan.write_failure(AttachFailure { step: 0, errno: libc::ENOENT }, writer.as_raw_fd());
        drop(writer);

        let mut message = String::new();
        reader.read_to_string(&mut message).unwrap();
        assert_eq!(message, "peri: /peri/no/such/input: No such file or directory\n");
    }
}
