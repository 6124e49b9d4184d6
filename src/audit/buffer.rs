//! Bounded in-memory FIFO for records the durable store could not accept.
//!
//! # Invariants
//! - `len() <= capacity` at all times
//! - Pushing into a full buffer evicts the oldest entry and counts a drop
//! - Drain order is insertion order
//!
//! # Design Decisions
//! - A single `Mutex<VecDeque>`; `drain` takes everything in one critical section
//! - `restore_front` puts failed flush entries back ahead of newer ones

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::observability::metrics;

#[derive(Debug)]
struct BufferInner<T> {
    entries: VecDeque<T>,
    dropped: u64,
    active: bool,
}

/// Point-in-time view of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferSnapshot {
    pub depth: usize,
    pub capacity: usize,
    pub dropped: u64,
    pub active: bool,
}

/// Bounded FIFO with drop-oldest overflow.
#[derive(Debug)]
pub struct FallbackBuffer<T> {
    capacity: usize,
    inner: Mutex<BufferInner<T>>,
}

impl<T> FallbackBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(BufferInner {
                entries: VecDeque::with_capacity(capacity),
                dropped: 0,
                active: false,
            }),
        }
    }

    /// Enqueue at the back. Returns true if an older entry was evicted.
    pub fn push(&self, entry: T) -> bool {
        let mut inner = self.inner.lock().expect("fallback buffer mutex poisoned");
        let evicted = if inner.entries.len() >= self.capacity {
            inner.entries.pop_front();
            inner.dropped += 1;
            true
        } else {
            false
        };
        inner.entries.push_back(entry);
        inner.active = true;
        metrics::record_buffer_depth(inner.entries.len());
        evicted
    }

    /// Take every buffered entry, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.inner.lock().expect("fallback buffer mutex poisoned");
        let drained: Vec<T> = inner.entries.drain(..).collect();
        metrics::record_buffer_depth(0);
        drained
    }

    /// Put `failed` back ahead of anything enqueued since the drain.
    ///
    /// Capacity still applies; overflow drops the oldest entries. Returns the
    /// number dropped. The active flag afterwards reflects whether anything is left.
    pub fn restore_front(&self, failed: Vec<T>) -> u64 {
        let mut inner = self.inner.lock().expect("fallback buffer mutex poisoned");
        for entry in failed.into_iter().rev() {
            inner.entries.push_front(entry);
        }

        let mut dropped = 0;
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
            dropped += 1;
        }
        inner.dropped += dropped;

        inner.active = !inner.entries.is_empty();
        metrics::record_buffer_depth(inner.entries.len());
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("fallback buffer mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted since startup.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().expect("fallback buffer mutex poisoned").dropped
    }

    /// True from the first push until a flush leaves the buffer empty.
    pub fn is_active(&self) -> bool {
        self.inner.lock().expect("fallback buffer mutex poisoned").active
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        let inner = self.inner.lock().expect("fallback buffer mutex poisoned");
        BufferSnapshot {
            depth: inner.entries.len(),
            capacity: self.capacity,
            dropped: inner.dropped,
            active: inner.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = FallbackBuffer::new(2);
        assert!(!buffer.push(1));
        assert!(!buffer.push(2));
        assert!(buffer.push(3));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.drain(), vec![2, 3]);
    }

    #[test]
    fn test_restore_front_keeps_failed_ahead_of_new() {
        let buffer = FallbackBuffer::new(10);
        buffer.push("a");
        buffer.push("b");
        buffer.push("c");

        let drained = buffer.drain();
        assert!(buffer.is_empty());
        assert!(buffer.is_active());

        // Arrived while the flush was running.
        buffer.push("d");

        let failed: Vec<_> = drained.into_iter().filter(|e| *e != "b").collect();
        assert_eq!(buffer.restore_front(failed), 0);
        assert_eq!(buffer.drain(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_restore_front_enforces_capacity() {
        let buffer = FallbackBuffer::new(3);
        buffer.push(1);
        buffer.push(2);
        let drained = buffer.drain();
        buffer.push(3);
        buffer.push(4);

        assert_eq!(buffer.restore_front(drained), 1);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.drain(), vec![2, 3, 4]);
    }

    #[test]
    fn test_active_cleared_only_when_empty() {
        let buffer = FallbackBuffer::new(4);
        assert!(!buffer.is_active());

        buffer.push(1);
        let drained = buffer.drain();
        buffer.restore_front(drained);
        assert!(buffer.is_active());

        buffer.drain();
        buffer.restore_front(Vec::new());
        let snapshot = buffer.snapshot();
        assert!(!snapshot.active);
        assert_eq!(snapshot.depth, 0);
        assert_eq!(snapshot.capacity, 4);
    }

    #[test]
    fn test_overlapping_flushes_keep_active() {
        let buffer = FallbackBuffer::new(4);
        buffer.push(1);

        // Second flush starts while the first still holds the entry.
        let first = buffer.drain();
        let second = buffer.drain();
        assert!(second.is_empty());

        buffer.restore_front(second);
        buffer.restore_front(first);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.depth, 1);
        assert!(snapshot.active);
    }
}
