//! Pipeline builder: N segments, N−1 pipes, one spawn per segment.

use os_pipe::{PipeReader, PipeWriter};
use tracing::{debug, trace, warn};

use crate::errors::{ChannelError, SpawnError};
use crate::job_control::TerminalLease;
use crate::parser::Segment;
use crate::spawn::{self, ProcessHandle};

/// One anonymous pipe. Each end is taken exactly once, by the segment that
/// gets it as stdin or stdout; whatever is left is closed by dropping.
struct Channel {
    reader: Option<PipeReader>,
    writer: Option<PipeWriter>,
}

/// A segment that produced no process.
#[derive(Debug)]
pub struct SegmentFailure {
    pub position: usize,
    pub error: SpawnError,
}

/// Everything `build` launched, in spawn order, plus what it could not launch.
#[derive(Debug)]
pub struct Job {
    pub handles: Vec<ProcessHandle>,
    pub failures: Vec<SegmentFailure>,
    pub segment_count: usize,
    pub channel_count: usize,
    pub background: bool,
    /// Held while a foreground job owns the terminal.
    pub terminal: Option<TerminalLease>,
}

impl Job {
    /// Position of the segment whose status gets reported.
    pub fn last_position(&self) -> usize {
        self.segment_count.saturating_sub(1)
    }

    /// Pid of the first spawned process, used to name the job.
    pub fn leader_pid(&self) -> Option<libc::pid_t> {
        self.handles.first().map(ProcessHandle::pid)
    }

    pub fn is_single(&self) -> bool {
        self.segment_count == 1
    }

    pub fn take_failures(&mut self) -> Vec<SegmentFailure> {
        std::mem::take(&mut self.failures)
    }
}

/// Launch every segment, wiring segment i's stdout to segment i+1's stdin.
///
/// Pipe allocation failure aborts before anything is spawned. Per-segment
/// failures are collected in [`Job::failures`]; only a fork failure stops the
/// remaining segments from being spawned. By the time this returns the parent
/// holds no pipe endpoint at all.
pub fn build(segments: Vec<Segment>, background: bool) -> Result<Job, ChannelError> {
    launch(segments, background, false)
}

/// [`build`], and for a foreground job with `claim_terminal` set and a
/// terminal on stdin, give the terminal to the first spawned process's group
/// before that process runs. The lease in [`Job::terminal`] takes it back.
pub fn launch(
    segments: Vec<Segment>,
    background: bool,
    claim_terminal: bool,
) -> Result<Job, ChannelError> {
    let segment_count = segments.len();
    let mut channels = allocate_channels(segment_count.saturating_sub(1))?;

    let terminal = if claim_terminal && !background {
        TerminalLease::claim()
            .inspect_err(|e| warn!(error = %e, "could not claim the terminal for the job"))
            .ok()
            .flatten()
    } else {
        None
    };

    let mut job = Job {
        handles: Vec::with_capacity(segment_count),
        failures: Vec::new(),
        segment_count,
        channel_count: channels.len(),
        background,
        terminal,
    };

    for (position, segment) in segments.into_iter().enumerate() {
        let upstream = position
            .checked_sub(1)
            .and_then(|previous| channels[previous].reader.take());
        let downstream = channels
            .get_mut(position)
            .and_then(|channel| channel.writer.take());

        let tty = match (&job.terminal, job.handles.is_empty()) {
            (Some(lease), true) => Some(lease.raw_fd()),
            _ => None,
        };

        match spawn::spawn(position, segment, upstream, downstream, tty) {
            Ok(Some(handle)) => {
                if let (Some(lease), Some(_)) = (&job.terminal, tty) {
                    // Set from both sides of the fork, like the process group.
                    if let Err(e) = lease.hand_to(handle.pid()) {
                        debug!(pid = handle.pid(), error = %e, "parent-side terminal handoff failed");
                    }
                }
                job.handles.push(handle);
            }
            Ok(None) => {}
            Err(error) => {
                let abort = error.aborts_pipeline();
                debug!(position, %error, abort, "segment not spawned");
                job.failures.push(SegmentFailure { position, error });
                if abort {
                    break;
                }
            }
        }
    }

    // A write end left open here would keep the last reader from ever seeing
    // end-of-stream.
    drop(channels);
    trace!(
        spawned = job.handles.len(),
        channels = job.channel_count,
        "pipeline built; parent endpoints closed"
    );

    Ok(job)
}

fn allocate_channels(count: usize) -> Result<Vec<Channel>, ChannelError> {
    let channels = (0..count)
        .map(|_| {
            os_pipe::pipe()
                .map(|(reader, writer)| Channel {
                    reader: Some(reader),
                    writer: Some(writer),
                })
                .map_err(ChannelError::CreationFailed)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if count > 0 {
        debug!(count, "allocated pipeline channels");
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_count_is_segments_minus_one() {
        assert_eq!(allocate_channels(0).unwrap().len(), 0);
        let channels = allocate_channels(3).unwrap();
        assert_eq!(channels.len(), 3);
        assert!(channels.iter().all(|c| c.reader.is_some() && c.writer.is_some()));
    }

    #[test]
    fn empty_pipeline_builds_empty_job() {
        let job = build(Vec::new(), false).unwrap();
        assert!(job.handles.is_empty());
        assert_eq!(job.channel_count, 0);
        assert_eq!(job.leader_pid(), None);
    }

    #[test]
    fn all_segments_missing_leaves_no_handles() {
        let job = build(
            vec![
                Segment::parse("peri-missing-one"),
                Segment::parse("peri-missing-two"),
            ],
            false,
        )
        .unwrap();
        assert!(job.handles.is_empty());
        assert_eq!(job.channel_count, 1);
        let positions: Vec<usize> = job.failures.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }
}
