use std::io::{self, Write};

use clap::Parser;
use tracing::warn;

use peri::cli::CliArgs;
use peri::job_control;
use peri::logging;
use peri::shell::Shell;

fn main() {
    let args = CliArgs::parse();

    if let Err(e) = logging::init_logging(args.log_level) {
        eprintln!("peri: failed to initialise logging: {e}");
    }

    ctrlc::set_handler(|| {
        println!();
        let _ = io::stdout().flush();
    })
    .expect("Failed to set Ctrl-C handler");

    if let Err(e) = job_control::ignore_job_control_signals() {
        warn!(error = %e, "could not ignore SIGQUIT/SIGTSTP");
    }

    let mut shell = Shell::new(args.history_size, args.reap_background);
    let exit_code = shell.run(&mut io::stdin().lock());

    std::process::exit(exit_code);
}
