//! Failure classes of the pipeline engine.
//!
//! Display text is the user-facing diagnostic without the `peri: ` prefix;
//! whoever prints the error adds it.

use std::io;

use thiserror::Error;

use crate::parser::MAX_SEGMENTS;

/// A pipe for the pipeline could not be allocated. Nothing was spawned.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("pipe creation failed: {0}")]
    CreationFailed(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum RedirectionError {
    #[error("syntax error: expected filename after '{operator}'")]
    MissingOperand { operator: &'static str },

    #[error("{path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("{program}: {source}")]
    ImageReplacementFailed {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Why a single segment did not produce a process.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("{program}: fork failed: {source}")]
    ProcessCreationFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Redirection(#[from] RedirectionError),
}

impl SpawnError {
    /// Whether the segments after this one must not be spawned.
    pub fn aborts_pipeline(&self) -> bool {
        matches!(self, SpawnError::ProcessCreationFailed { .. })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("too many commands in pipeline (max {})", MAX_SEGMENTS)]
    TooManySegments,
}
