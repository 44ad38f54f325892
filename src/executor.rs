use std::io;

use tracing::debug;

use crate::jobs::{self, BackgroundJobs, WaitOutcome};
use crate::parser::Pipeline;
use crate::pipeline;

/// Execute a parsed pipeline: build it, report segments that could not be
/// launched, then wait (or announce it as a background job). With
/// `claim_terminal`, a foreground job gets the terminal while it runs.
/// Returns the exit code (0 = success, 127 = last segment not launched,
/// 128+N = last segment killed by signal N).
pub fn execute(
    pipeline: Pipeline,
    claim_terminal: bool,
    background_jobs: Option<&mut BackgroundJobs>,
) -> i32 {
    let Pipeline {
        segments,
        background,
    } = pipeline;

    let mut job = match pipeline::launch(segments, background, claim_terminal) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("peri: {e}");
            return 1;
        }
    };

    for failure in job.take_failures() {
        eprintln!("peri: {}", failure.error);
    }

    let outcome = jobs::wait(job, &mut io::stdout(), &mut io::stderr());
    let code = outcome.exit_code();

    if let (WaitOutcome::Background { handles }, Some(jobs)) = (outcome, background_jobs) {
        debug!(count = handles.len(), "tracking background job for reaping");
        jobs.add(handles);
    }

    code
}
