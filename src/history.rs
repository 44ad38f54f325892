use std::collections::VecDeque;
use std::io::{self, Write};

/// Default number of remembered lines.
pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded command history (oldest → newest). Pushing onto a full buffer
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: &str) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_string());
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// `"<n> <line>"` per entry, numbered from 1.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        for (i, line) in self.iter().enumerate() {
            writeln!(out, "{} {}", i + 1, line)?;
        }
        Ok(())
    }
}
