//! Fixed-capacity signal store for one direction of traffic.

use super::signal::Signal;
use crate::error::{BridgeError, BridgeResult};
use std::collections::VecDeque;

/// FIFO of whole signals with a hard capacity.
///
/// The ring never grows past `capacity` entries and never reorders; the
/// blocking behaviour around a full ring lives in the endpoint.
#[derive(Debug)]
pub struct RingBuffer {
    slots: VecDeque<Signal>,
    capacity: usize,
    max_signal_len: usize,
    queued_bytes: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize, max_signal_len: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
            max_signal_len,
            queued_bytes: 0,
        }
    }

    /// Reject a payload that could never be enqueued, whatever the fill level.
    pub fn check_len(&self, len: usize) -> BridgeResult<()> {
        if len > self.max_signal_len {
            return Err(BridgeError::SignalTooLong {
                len,
                max: self.max_signal_len,
            });
        }
        Ok(())
    }

    /// Append a signal; the ring is left untouched on error.
    pub fn enqueue(&mut self, signal: Signal) -> BridgeResult<()> {
        self.check_len(signal.len())?;
        if self.is_full() {
            return Err(BridgeError::BufferFull {
                capacity: self.capacity,
            });
        }
        self.queued_bytes += signal.len();
        self.slots.push_back(signal);
        Ok(())
    }

    /// Remove the oldest signal.
    pub fn dequeue(&mut self) -> Option<Signal> {
        let signal = self.slots.pop_front()?;
        self.queued_bytes = self.queued_bytes.saturating_sub(signal.len());
        Some(signal)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots left.
    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.slots.len())
    }

    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    /// Verify the structural invariants; a violation means the ring is corrupt.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.slots.len() > self.capacity {
            return Err(format!(
                "{} signals queued in a ring of capacity {}",
                self.slots.len(),
                self.capacity
            ));
        }
        if self.slots.is_empty() && self.queued_bytes != 0 {
            return Err(format!(
                "empty ring still accounts for {} bytes",
                self.queued_bytes
            ));
        }
        let bound = self.slots.len().saturating_mul(self.max_signal_len);
        if self.queued_bytes > bound {
            return Err(format!(
                "{} bytes accounted for {} signals of at most {} bytes",
                self.queued_bytes,
                self.slots.len(),
                self.max_signal_len
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_byte_count(&mut self) {
        self.queued_bytes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut ring = RingBuffer::new(3, 16);
        ring.enqueue(Signal::from("one\n")).unwrap();
        ring.enqueue(Signal::from("two\n")).unwrap();

        assert_eq!(ring.dequeue().unwrap(), b"one\n");
        assert_eq!(ring.dequeue().unwrap(), b"two\n");
        assert!(ring.dequeue().is_none());
    }

    #[test]
    fn test_invariants_hold_with_unbounded_signal_len() {
        let mut ring = RingBuffer::new(4, usize::MAX);
        ring.enqueue(Signal::from("one\n")).unwrap();
        ring.enqueue(Signal::from("two\n")).unwrap();

        assert_eq!(ring.check_invariants(), Ok(()));
        assert_eq!(ring.queued_bytes(), 8);
    }

    #[test]
    fn test_capacity_boundary() {
        let mut ring = RingBuffer::new(2, 16);
        ring.enqueue(Signal::from("a\n")).unwrap();
        ring.enqueue(Signal::from("b\n")).unwrap();

        let err = ring.enqueue(Signal::from("c\n")).unwrap_err();
        assert_eq!(err, BridgeError::BufferFull { capacity: 2 });
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.room(), 0);

        ring.dequeue();
        assert_eq!(ring.room(), 1);
        ring.enqueue(Signal::from("c\n")).unwrap();
    }

    #[test]
    fn test_oversize_leaves_ring_unchanged() {
        let mut ring = RingBuffer::new(2, 4);
        ring.enqueue(Signal::from("ok\n")).unwrap();

        let err = ring.enqueue(Signal::from("toolong\n")).unwrap_err();
        assert_eq!(err, BridgeError::SignalTooLong { len: 8, max: 4 });
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.queued_bytes(), 3);
    }

    #[test]
    fn test_exactly_max_len_accepted() {
        let mut ring = RingBuffer::new(1, 4);
        ring.enqueue(Signal::from("abc\n")).unwrap();
        assert_eq!(ring.queued_bytes(), 4);
    }

    #[test]
    fn test_invariant_check_detects_drift() {
        let mut ring = RingBuffer::new(2, 8);
        ring.enqueue(Signal::from("x\n")).unwrap();
        assert!(ring.check_invariants().is_ok());

        ring.corrupt_byte_count();
        ring.dequeue();
        assert!(ring.check_invariants().is_err());
    }
}
