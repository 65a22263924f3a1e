//! Bounded message history with FIFO eviction.

use std::collections::VecDeque;

use crate::error::{DomainError, DomainResult};

/// Number of messages kept when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Fixed-capacity, oldest-first log of recently broadcast messages.
///
/// When the buffer is full, pushing evicts the oldest entry before the new
/// one is appended, so `len() <= capacity()` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryBuffer {
    entries: VecDeque<String>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer holding at most `capacity` messages.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidHistoryCapacity` if `capacity` is zero.
    pub fn new(capacity: usize) -> DomainResult<Self> {
        if capacity == 0 {
            return Err(DomainError::InvalidHistoryCapacity { capacity });
        }

        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Appends a message, evicting the oldest one first if the buffer is full.
    ///
    /// Returns the evicted message, if any.
    pub fn push(&mut self, message: impl Into<String>) -> Option<String> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(message.into());
        evicted
    }

    /// Joins all entries with `\n`, oldest first.
    ///
    /// Returns `None` when the buffer is empty so that callers send nothing.
    pub fn replay(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }

        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(entry);
        }
        Some(out)
    }

    /// Returns a copy of the stored messages, oldest first.
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}
