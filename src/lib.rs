//! `peri`: an interactive command interpreter whose core is a pipeline
//! execution engine.
//!
//! - [`redirect`] turns `<`, `>`, `>>` into stream attachments in the child
//! - [`spawn`] creates one process per command segment
//! - [`pipeline`] wires N segments together with N−1 pipes
//! - [`jobs`] waits for a foreground job or announces a background one
//!
//! [`shell`] is the read-dispatch loop that drives them.

pub mod builtins;
pub mod cli;
pub mod errors;
pub mod executor;
pub mod history;
pub mod job_control;
pub mod jobs;
pub mod logging;
pub mod lookup;
pub mod parser;
pub mod pipeline;
pub mod redirect;
pub mod shell;
pub mod spawn;
pub mod status;
