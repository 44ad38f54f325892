//! Interactive supervisor: prompt, read, record, dispatch.

use std::io::{self, BufRead, Write};

use tracing::warn;

use crate::builtins::{self, Builtin, BuiltinAction};
use crate::errors::ParseError;
use crate::executor;
use crate::history::History;
use crate::jobs::BackgroundJobs;
use crate::parser::{self, Pipeline};

/// Longest input line, including the newline; longer lines are truncated.
pub const MAX_LINE: usize = 1024;

pub struct Shell {
    history: History,
    background_jobs: Option<BackgroundJobs>,
    /// Hand the terminal to foreground jobs (when stdin is one).
    claim_terminal: bool,
    last_exit_code: i32,
}

impl Shell {
    pub fn new(history_size: usize, reap_background: bool) -> Self {
        Self {
            history: History::new(history_size),
            background_jobs: reap_background.then(BackgroundJobs::new),
            claim_terminal: true,
            last_exit_code: 0,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run until `exit` or end of input. Returns the interpreter's exit code.
    pub fn run(&mut self, input: &mut impl BufRead) -> i32 {
        let mut stdout = io::stdout();

        loop {
            if let Some(jobs) = self.background_jobs.as_mut() {
                jobs.reap(&mut stdout);
            }

            print!("{}", prompt());
            if stdout.flush().is_err() {
                break;
            }

            match read_line(input) {
                Ok(None) => {
                    println!();
                    break;
                }
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Some(code) = self.dispatch(&line) {
                        return code;
                    }
                }
                Err(error) => {
                    eprintln!("peri: error reading input: {error}");
                    break;
                }
            }
        }

        self.last_exit_code
    }

    /// Handle one non-empty line. Returns `Some(code)` when the interpreter
    /// should exit.
    pub fn dispatch(&mut self, line: &str) -> Option<i32> {
        self.history.push(line);

        let tokens = parser::tokenize(line);
        let builtin = Builtin::classify(tokens.first()?);
        let action = builtins::execute(
            builtin,
            &tokens[1..],
            &self.history,
            &mut io::stdout(),
            &mut io::stderr(),
        );

        match action {
            Some(BuiltinAction::Exit(code)) => return Some(code),
            Some(BuiltinAction::Continue(code)) => self.last_exit_code = code,
            None => self.run_pipeline(tokens),
        }
        None
    }

    fn run_pipeline(&mut self, tokens: Vec<String>) {
        match Pipeline::from_tokens(tokens) {
            Ok(pipeline) => {
                self.last_exit_code =
                    executor::execute(pipeline, self.claim_terminal, self.background_jobs.as_mut());
            }
            Err(ParseError::Empty) => {}
            Err(e) => {
                eprintln!("peri: {e}");
                self.last_exit_code = 1;
            }
        }
    }
}

/// `<user>@peri:<cwd>> `
fn prompt() -> String {
    let cwd = match std::env::current_dir() {
        Ok(path) => path.display().to_string(),
        Err(e) => {
            warn!(error = %e, "could not read current directory");
            "unknown".to_string()
        }
    };
    let user = std::env::var("USER").unwrap_or_else(|_| "user".to_string());
    format!("{user}@peri:{cwd}> ")
}

/// Read one line without its newline. `Ok(None)` at end of input. Lines
/// longer than `MAX_LINE - 1` bytes are cut at the last character boundary
/// that fits; invalid UTF-8 is replaced.
pub fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }

    let mut line = String::from_utf8_lossy(&buf).into_owned();
    if line.len() > MAX_LINE - 1 {
        let mut end = MAX_LINE - 1;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        line.truncate(end);
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_lines_until_eof() {
        let mut input = Cursor::new("ls -l\npwd");
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("ls -l"));
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("pwd"));
        assert_eq!(read_line(&mut input).unwrap(), None);
    }

    #[test]
    fn long_lines_are_truncated() {
        let long = "a".repeat(MAX_LINE * 2);
        let mut input = Cursor::new(format!("{long}\nnext\n"));
        let line = read_line(&mut input).unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE - 1);
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("next"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(MAX_LINE);
        let mut input = Cursor::new(long);
        let line = read_line(&mut input).unwrap().unwrap();
        assert!(line.len() <= MAX_LINE - 1);
        assert!(line.chars().all(|c| c == 'é'));
    }

    #[test]
    fn prompt_names_the_interpreter() {
        assert!(prompt().contains("@peri:"));
        assert!(prompt().ends_with("> "));
    }

    #[test]
    fn builtins_are_recorded_and_exit_stops() {
        let mut shell = Shell::new(5, false);
        assert_eq!(shell.dispatch("history"), None);
        assert_eq!(shell.dispatch("exit 3"), Some(3));
        assert_eq!(shell.history().iter().collect::<Vec<_>>(), vec!["history", "exit 3"]);
    }
}
