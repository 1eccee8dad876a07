//! Bounded FIFO core shared by both mailbox variants.
//!
//! Holds no synchronization of its own; each variant wraps it in a mutex and
//! supplies its own way of waiting for room or for data.

use std::collections::VecDeque;

use crate::domain::Fragment;

/// Outcome of inserting into the queue.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Push {
    Stored,
    /// At capacity; the fragment is handed back so the caller can retry.
    Full(Fragment),
    Closed,
}

/// Outcome of removing from the queue.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Pop {
    Item(Fragment),
    Empty,
    /// Closed and fully drained.
    Closed,
}

#[derive(Debug)]
pub(super) struct Slots {
    queue: VecDeque<Fragment>,
    capacity: usize,
    closed: bool,
}

impl Slots {
    pub(super) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            closed: false,
        }
    }

    pub(super) fn push(&mut self, fragment: Fragment) -> Push {
        if self.closed {
            return Push::Closed;
        }
        if self.queue.len() >= self.capacity {
            return Push::Full(fragment);
        }
        self.queue.push_back(fragment);
        Push::Stored
    }

    /// Pending fragments stay readable after `close`.
    pub(super) fn pop(&mut self) -> Pop {
        match self.queue.pop_front() {
            Some(fragment) => Pop::Item(fragment),
            None if self.closed => Pop::Closed,
            None => Pop::Empty,
        }
    }

    pub(super) fn close(&mut self) {
        self.closed = true;
    }

    pub(super) fn reopen(&mut self) {
        self.closed = false;
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(super) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }
}
