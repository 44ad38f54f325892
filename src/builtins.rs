use std::io::Write;

use crate::history::History;

/// What the first token of a line names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ChangeDirectory,
    ShowHistory,
    Exit,
    /// Not a builtin: the line is an external pipeline.
    External,
}

impl Builtin {
    pub fn classify(program: &str) -> Self {
        match program {
            "cd" => Builtin::ChangeDirectory,
            "history" => Builtin::ShowHistory,
            "exit" => Builtin::Exit,
            _ => Builtin::External,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BuiltinAction {
    Continue(i32),
    Exit(i32),
}

/// Run a builtin, writing output to the provided streams.
/// Returns `None` for [`Builtin::External`].
pub fn execute(
    builtin: Builtin,
    args: &[String],
    history: &History,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Option<BuiltinAction> {
    let action = match builtin {
        Builtin::ChangeDirectory => BuiltinAction::Continue(builtin_cd(args, stderr)),
        Builtin::ShowHistory => BuiltinAction::Continue(builtin_history(history, stdout, stderr)),
        Builtin::Exit => builtin_exit(args, stderr),
        Builtin::External => return None,
    };
    Some(action)
}

fn builtin_cd(args: &[String], stderr: &mut dyn Write) -> i32 {
    let Some(target) = args.first() else {
        let _ = writeln!(stderr, "peri: expected argument to \"cd\"");
        return 1;
    };

    if let Err(e) = std::env::set_current_dir(target) {
        let _ = writeln!(stderr, "peri: {target}: {e}");
        return 1;
    }

    0
}

fn builtin_history(history: &History, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    match history.write_to(stdout) {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(stderr, "peri: history: {e}");
            1
        }
    }
}

fn builtin_exit(args: &[String], stderr: &mut dyn Write) -> BuiltinAction {
    match args.first() {
        None => BuiltinAction::Exit(0),
        Some(s) => match s.parse::<i32>() {
            Ok(code) => BuiltinAction::Exit(code),
            Err(_) => {
                let _ = writeln!(stderr, "exit: {s}: numeric argument required");
                BuiltinAction::Exit(2)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(builtin: Builtin, args: &[&str], history: &History) -> (Option<BuiltinAction>, String, String) {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let action = execute(builtin, &args, history, &mut out, &mut err);
        (
            action,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn classify_matches_first_token_only() {
        assert_eq!(Builtin::classify("cd"), Builtin::ChangeDirectory);
        assert_eq!(Builtin::classify("history"), Builtin::ShowHistory);
        assert_eq!(Builtin::classify("exit"), Builtin::Exit);
        assert_eq!(Builtin::classify("ls"), Builtin::External);
        assert_eq!(Builtin::classify("CD"), Builtin::External);
    }

    #[test]
    fn external_is_not_executed_here() {
        let (action, out, err) = run(Builtin::External, &[], &History::default());
        assert!(action.is_none());
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn cd_without_argument_complains() {
        let (action, _, err) = run(Builtin::ChangeDirectory, &[], &History::default());
        assert_eq!(action, Some(BuiltinAction::Continue(1)));
        assert_eq!(err, "peri: expected argument to \"cd\"\n");
    }

    #[test]
    fn cd_to_missing_directory_fails() {
        let (action, _, err) = run(
            Builtin::ChangeDirectory,
            &["/peri/does/not/exist"],
            &History::default(),
        );
        assert_eq!(action, Some(BuiltinAction::Continue(1)));
        assert!(err.starts_with("peri: /peri/does/not/exist: "), "stderr was: {err}");
    }

    #[test]
    fn history_lists_entries() {
        let mut history = History::default();
        history.push("ls");
        let (action, out, _) = run(Builtin::ShowHistory, &[], &history);
        assert_eq!(action, Some(BuiltinAction::Continue(0)));
        assert_eq!(out, "1 ls\n");
    }

    #[test]
    fn exit_codes() {
        let history = History::default();
        assert_eq!(run(Builtin::Exit, &[], &history).0, Some(BuiltinAction::Exit(0)));
        assert_eq!(run(Builtin::Exit, &["7"], &history).0, Some(BuiltinAction::Exit(7)));

        let (action, _, err) = run(Builtin::Exit, &["soon"], &history);
        assert_eq!(action, Some(BuiltinAction::Exit(2)));
        assert_eq!(err, "exit: soon: numeric argument required\n");
    }
}
