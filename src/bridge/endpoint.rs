//! One side of a device pair: its receive ring, open count and wait queues.
//!
//! All state of an endpoint sits behind a single mutex. Two condition
//! variables hang off it:
//!
//! - `readable`: readers of this endpoint waiting for a signal
//! - `writable`: peer writers waiting for room in this endpoint's ring
//!
//! Blocked readers (and blocked writers) are served strictly in arrival order
//! through ticket queues; only the waiter at the head of its queue may take a
//! signal or a free slot. No function here ever takes a second endpoint's lock.

use super::naming::Side;
use super::ring::RingBuffer;
use super::signal::Signal;
use crate::error::{BridgeError, BridgeResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Traffic counters of one endpoint's receive ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStats {
    /// Signals enqueued into this endpoint by the peer
    pub signals_received: u64,
    pub bytes_received: u64,
    /// Signals handed to readers of this endpoint
    pub signals_delivered: u64,
    pub bytes_delivered: u64,
}

/// Point-in-time view of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub name: String,
    pub minor: usize,
    pub side: Side,
    pub open_count: usize,
    pub queued_signals: usize,
    pub queued_bytes: usize,
    pub capacity: usize,
    pub blocked_readers: usize,
    pub blocked_writers: usize,
    pub stats: EndpointStats,
}

#[derive(Debug)]
struct EndpointState {
    ring: RingBuffer,
    open_count: usize,
    /// Bumped every time `open_count` drops back to zero.
    closed_epoch: u64,
    /// Bumped every time the peer's `open_count` drops back to zero.
    hangup_epoch: u64,
    shutdown: bool,
    readers: VecDeque<u64>,
    /// Waiting writers with the number of slots each one needs.
    writers: VecDeque<(u64, usize)>,
    next_ticket: u64,
    stats: EndpointStats,
}

impl EndpointState {
    fn take_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        ticket
    }
}

fn leave_queue(queue: &mut VecDeque<u64>, ticket: u64) {
    if let Some(pos) = queue.iter().position(|t| *t == ticket) {
        queue.remove(pos);
    }
}

/// Absolute deadline for a relative timeout; `None` waits forever.
fn deadline_for(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

/// One side of a `DevicePair`.
#[derive(Debug)]
pub struct Endpoint {
    name: String,
    minor: usize,
    side: Side,
    state: Mutex<EndpointState>,
    readable: Condvar,
    writable: Condvar,
    faulted: Arc<AtomicBool>,
}

impl Endpoint {
    pub(crate) fn new(
        name: String,
        minor: usize,
        side: Side,
        capacity: usize,
        max_signal_len: usize,
        faulted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name,
            minor,
            side,
            state: Mutex::new(EndpointState {
                ring: RingBuffer::new(capacity, max_signal_len),
                open_count: 0,
                closed_epoch: 0,
                hangup_epoch: 0,
                shutdown: false,
                readers: VecDeque::new(),
                writers: VecDeque::new(),
                next_ticket: 0,
                stats: EndpointStats::default(),
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            faulted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn minor(&self) -> usize {
        self.minor
    }

    fn check_alive(&self, st: &EndpointState) -> BridgeResult<()> {
        if st.shutdown {
            return Err(BridgeError::DriverShutdown);
        }
        if self.faulted.load(Ordering::Acquire) {
            return Err(BridgeError::PairFaulted { minor: self.minor });
        }
        Ok(())
    }

    /// Mark the pair as aborted and wake every local waiter.
    fn fault(&self, reason: &str) -> BridgeError {
        error!(
            device = %self.name,
            minor = self.minor,
            "Ring invariant violated, aborting pair: {}",
            reason
        );
        self.faulted.store(true, Ordering::Release);
        self.readable.notify_all();
        self.writable.notify_all();
        BridgeError::PairFaulted { minor: self.minor }
    }

    /// Verify the ring after a mutation; a broken invariant poisons the pair.
    fn verify(&self, st: &EndpointState) -> BridgeResult<()> {
        st.ring.check_invariants().map_err(|reason| self.fault(&reason))
    }

    pub(crate) fn open(&self) -> BridgeResult<usize> {
        let mut st = self.state.lock();
        self.check_alive(&st)?;
        st.open_count += 1;
        Ok(st.open_count)
    }

    /// Drop one reference. Returns `true` when the endpoint became fully closed.
    pub(crate) fn release(&self) -> bool {
        let mut st = self.state.lock();
        st.open_count = st.open_count.saturating_sub(1);
        let fully_closed = st.open_count == 0;
        if fully_closed {
            st.closed_epoch = st.closed_epoch.wrapping_add(1);
        }
        // Wake everyone: a waiter whose own handle was just closed must notice.
        self.readable.notify_all();
        self.writable.notify_all();
        fully_closed
    }

    /// Called on the peer after its `release`.
    pub(crate) fn peer_released(&self, peer_fully_closed: bool) {
        let mut st = self.state.lock();
        if peer_fully_closed {
            st.hangup_epoch = st.hangup_epoch.wrapping_add(1);
        }
        self.readable.notify_all();
        self.writable.notify_all();
    }

    pub(crate) fn shutdown(&self) {
        let mut st = self.state.lock();
        st.shutdown = true;
        self.readable.notify_all();
        self.writable.notify_all();
    }

    /// Wake every waiter so it re-examines the pair's state.
    pub(crate) fn wake_all(&self) {
        let _st = self.state.lock();
        self.readable.notify_all();
        self.writable.notify_all();
    }

    fn push(&self, st: &mut MutexGuard<'_, EndpointState>, signal: Signal) -> BridgeResult<()> {
        let len = signal.len() as u64;
        st.ring.enqueue(signal)?;
        self.verify(st)?;
        st.stats.signals_received += 1;
        st.stats.bytes_received += len;
        self.readable.notify_all();
        Ok(())
    }

    fn push_all(
        &self,
        st: &mut MutexGuard<'_, EndpointState>,
        signals: Vec<Signal>,
    ) -> BridgeResult<()> {
        for signal in signals {
            self.push(st, signal)?;
        }
        Ok(())
    }

    fn pop(&self, st: &mut MutexGuard<'_, EndpointState>) -> BridgeResult<Signal> {
        let signal = st
            .ring
            .dequeue()
            .ok_or_else(|| self.fault("dequeue from an empty ring"))?;
        self.verify(st)?;
        st.stats.signals_delivered += 1;
        st.stats.bytes_delivered += signal.len() as u64;
        self.writable.notify_all();
        Ok(signal)
    }

    /// Enqueue a signal written by the peer.
    ///
    /// `writer_closed` is the closed flag of the writing handle. A full ring
    /// blocks up to `timeout`: `Some(ZERO)` fails at once with `BufferFull`,
    /// `None` waits indefinitely.
    pub(crate) fn enqueue(
        &self,
        signal: Signal,
        timeout: Option<Duration>,
        writer_closed: &AtomicBool,
    ) -> BridgeResult<()> {
        self.enqueue_batch(vec![signal], timeout, writer_closed)
    }

    /// Enqueue several signals as one unit: either all of them land, in
    /// order and with no other writer's signal in between, or none does.
    ///
    /// The writer waits until the ring has room for the whole batch. A batch
    /// larger than the ring's capacity can never fit and fails at once with
    /// `BufferFull`.
    pub(crate) fn enqueue_batch(
        &self,
        signals: Vec<Signal>,
        timeout: Option<Duration>,
        writer_closed: &AtomicBool,
    ) -> BridgeResult<()> {
        let need = signals.len();
        let mut st = self.state.lock();
        self.check_alive(&st)?;
        if writer_closed.load(Ordering::Acquire) {
            return Err(BridgeError::HandleClosed);
        }
        for signal in &signals {
            st.ring.check_len(signal.len())?;
        }
        if need == 0 {
            return Ok(());
        }
        if need > st.ring.capacity() {
            return Err(BridgeError::BufferFull {
                capacity: st.ring.capacity(),
            });
        }

        // Queued writers keep the slots they are waiting for.
        let owed: usize = st.writers.iter().map(|(_, n)| n).sum();
        if st.ring.room() >= owed + need {
            return self.push_all(&mut st, signals);
        }
        if timeout == Some(Duration::ZERO) {
            return Err(BridgeError::BufferFull {
                capacity: st.ring.capacity(),
            });
        }

        let closed_epoch = st.closed_epoch;
        let deadline = deadline_for(timeout);
        let ticket = st.take_ticket();
        st.writers.push_back((ticket, need));
        debug!(device = %self.name, ticket, need, "Writer waiting for room");

        let mut pending = Some(signals);
        let result = loop {
            if let Err(e) = self.check_alive(&st) {
                break Err(e);
            }
            if writer_closed.load(Ordering::Acquire) {
                break Err(BridgeError::HandleClosed);
            }
            if st.writers.front().map(|(t, _)| *t) == Some(ticket) && st.ring.room() >= need {
                match pending.take() {
                    Some(signals) => break self.push_all(&mut st, signals),
                    None => break Err(BridgeError::PairFaulted { minor: self.minor }),
                }
            }
            if st.closed_epoch != closed_epoch {
                break Err(BridgeError::PortClosed(self.name.clone()));
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break Err(BridgeError::Timeout(timeout.unwrap_or_default()));
                    }
                    self.writable.wait_until(&mut st, deadline);
                }
                None => self.writable.wait(&mut st),
            }
        };

        if let Some(pos) = st.writers.iter().position(|(t, _)| *t == ticket) {
            st.writers.remove(pos);
        }
        if !st.writers.is_empty() && !st.ring.is_full() {
            self.writable.notify_all();
        }
        result
    }

    /// Dequeue the next signal for a reader holding a handle on this endpoint.
    ///
    /// `reader_closed` is the closed flag of the reading handle.
    pub(crate) fn dequeue(
        &self,
        timeout: Option<Duration>,
        reader_closed: &AtomicBool,
    ) -> BridgeResult<Signal> {
        let mut st = self.state.lock();
        self.check_alive(&st)?;
        if reader_closed.load(Ordering::Acquire) {
            return Err(BridgeError::HandleClosed);
        }

        // Every queued reader is owed one signal before a newcomer gets any.
        if st.ring.len() > st.readers.len() {
            return self.pop(&mut st);
        }
        if timeout == Some(Duration::ZERO) {
            return Err(BridgeError::WouldBlock);
        }

        let closed_epoch = st.closed_epoch;
        let hangup_epoch = st.hangup_epoch;
        let deadline = deadline_for(timeout);
        let ticket = st.take_ticket();
        st.readers.push_back(ticket);
        debug!(device = %self.name, ticket, "Reader waiting for a signal");

        let result = loop {
            if let Err(e) = self.check_alive(&st) {
                break Err(e);
            }
            if st.closed_epoch != closed_epoch {
                break Err(BridgeError::PortClosed(self.name.clone()));
            }
            if reader_closed.load(Ordering::Acquire) {
                break Err(BridgeError::HandleClosed);
            }
            if st.readers.front() == Some(&ticket) && !st.ring.is_empty() {
                break self.pop(&mut st);
            }
            if st.hangup_epoch != hangup_epoch {
                break Err(BridgeError::PortClosed(self.name.clone()));
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break Err(BridgeError::Timeout(timeout.unwrap_or_default()));
                    }
                    self.readable.wait_until(&mut st, deadline);
                }
                None => self.readable.wait(&mut st),
            }
        };

        leave_queue(&mut st.readers, ticket);
        if !st.readers.is_empty() && !st.ring.is_empty() {
            self.readable.notify_all();
        }
        result
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    pub fn queued_signals(&self) -> usize {
        self.state.lock().ring.len()
    }

    pub fn queued_bytes(&self) -> usize {
        self.state.lock().ring.queued_bytes()
    }

    pub fn room(&self) -> usize {
        self.state.lock().ring.room()
    }

    pub fn status(&self) -> EndpointStatus {
        let st = self.state.lock();
        EndpointStatus {
            name: self.name.clone(),
            minor: self.minor,
            side: self.side,
            open_count: st.open_count,
            queued_signals: st.ring.len(),
            queued_bytes: st.ring.queued_bytes(),
            capacity: st.ring.capacity(),
            blocked_readers: st.readers.len(),
            blocked_writers: st.writers.len(),
            stats: st.stats,
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_ring(&self) {
        self.state.lock().ring.corrupt_byte_count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn endpoint(capacity: usize) -> Arc<Endpoint> {
        Arc::new(Endpoint::new(
            "ttyExogenous0".into(),
            0,
            Side::Exogenous,
            capacity,
            32,
            Arc::new(AtomicBool::new(false)),
        ))
    }

    #[test]
    fn test_poll_on_empty_would_block() {
        let ep = endpoint(2);
        let closed = AtomicBool::new(false);
        assert_eq!(
            ep.dequeue(Some(Duration::ZERO), &closed),
            Err(BridgeError::WouldBlock)
        );
    }

    #[test]
    fn test_timeout_keeps_later_signal() {
        let ep = endpoint(2);
        let closed = AtomicBool::new(false);
        let start = Instant::now();
        let err = ep
            .dequeue(Some(Duration::from_millis(30)), &closed)
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
        assert!(start.elapsed() >= Duration::from_millis(30));

        ep.enqueue(Signal::from("late\n"), None, &closed).unwrap();
        assert_eq!(ep.dequeue(Some(Duration::ZERO), &closed).unwrap(), b"late\n");
    }

    #[test]
    fn test_full_ring_non_blocking_write() {
        let ep = endpoint(1);
        let closed = AtomicBool::new(false);
        ep.enqueue(Signal::from("a\n"), Some(Duration::ZERO), &closed)
            .unwrap();
        assert_eq!(
            ep.enqueue(Signal::from("b\n"), Some(Duration::ZERO), &closed),
            Err(BridgeError::BufferFull { capacity: 1 })
        );
        assert_eq!(ep.queued_signals(), 1);
    }

    #[test]
    fn test_blocked_writer_resumes_after_read() {
        let ep = endpoint(1);
        let closed = Arc::new(AtomicBool::new(false));
        ep.enqueue(Signal::from("a\n"), None, &closed).unwrap();

        let writer = {
            let ep = Arc::clone(&ep);
            let closed = Arc::clone(&closed);
            thread::spawn(move || ep.enqueue(Signal::from("b\n"), None, &closed))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(ep.status().blocked_writers, 1);
        assert_eq!(ep.dequeue(None, &closed).unwrap(), b"a\n");
        writer.join().unwrap().unwrap();
        assert_eq!(ep.dequeue(None, &closed).unwrap(), b"b\n");
    }

    #[test]
    fn test_queued_writer_only_reserves_what_it_needs() {
        let ep = endpoint(3);
        let closed = AtomicBool::new(false);
        // A waiter that has been woken but not yet run still owns one slot.
        ep.state.lock().writers.push_back((u64::MAX, 1));

        ep.enqueue(Signal::from("a\n"), Some(Duration::ZERO), &closed)
            .unwrap();
        ep.enqueue(Signal::from("b\n"), Some(Duration::ZERO), &closed)
            .unwrap();
        assert_eq!(
            ep.enqueue(Signal::from("c\n"), Some(Duration::ZERO), &closed),
            Err(BridgeError::BufferFull { capacity: 3 })
        );
        assert_eq!(ep.room(), 1);
    }

    #[test]
    fn test_blocked_batch_waits_for_room_for_all_lines() {
        let ep = endpoint(2);
        let closed = Arc::new(AtomicBool::new(false));
        ep.enqueue(Signal::from("1\n"), None, &closed).unwrap();
        ep.enqueue(Signal::from("2\n"), None, &closed).unwrap();

        let writer = {
            let ep = Arc::clone(&ep);
            let closed = Arc::clone(&closed);
            thread::spawn(move || {
                ep.enqueue_batch(vec![Signal::from("x\n"), Signal::from("y\n")], None, &closed)
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ep.dequeue(None, &closed).unwrap(), b"1\n");
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ep.status().blocked_writers, 1);
        assert_eq!(ep.queued_signals(), 1);

        assert_eq!(ep.dequeue(None, &closed).unwrap(), b"2\n");
        writer.join().unwrap().unwrap();
        assert_eq!(ep.dequeue(None, &closed).unwrap(), b"x\n");
        assert_eq!(ep.dequeue(None, &closed).unwrap(), b"y\n");
    }

    #[test]
    fn test_readers_served_in_arrival_order() {
        let ep = endpoint(4);
        let closed = Arc::new(AtomicBool::new(false));
        let mut readers = Vec::new();

        for _ in 0..3 {
            let ep = Arc::clone(&ep);
            let closed = Arc::clone(&closed);
            readers.push(thread::spawn(move || ep.dequeue(None, &closed)));
            // Give each reader time to queue before the next arrives.
            thread::sleep(Duration::from_millis(30));
        }

        for text in ["1\n", "2\n", "3\n"] {
            ep.enqueue(Signal::from(text), None, &closed).unwrap();
        }

        let got: Vec<_> = readers
            .into_iter()
            .map(|r| r.join().unwrap().unwrap())
            .collect();
        assert_eq!(got, vec![Signal::from("1\n"), Signal::from("2\n"), Signal::from("3\n")]);
    }

    #[test]
    fn test_corrupt_ring_faults_pair() {
        let ep = endpoint(2);
        let closed = AtomicBool::new(false);
        ep.enqueue(Signal::from("x\n"), None, &closed).unwrap();
        ep.corrupt_ring();

        assert_eq!(
            ep.dequeue(None, &closed),
            Err(BridgeError::PairFaulted { minor: 0 })
        );
        assert_eq!(
            ep.enqueue(Signal::from("y\n"), None, &closed),
            Err(BridgeError::PairFaulted { minor: 0 })
        );
    }

    #[test]
    fn test_status_counts_traffic() {
        let ep = endpoint(2);
        let closed = AtomicBool::new(false);
        ep.open().unwrap();
        ep.enqueue(Signal::from("abc\n"), None, &closed).unwrap();
        ep.dequeue(None, &closed).unwrap();

        let status = ep.status();
        assert_eq!(status.open_count, 1);
        assert_eq!(status.stats.signals_received, 1);
        assert_eq!(status.stats.bytes_delivered, 4);
        assert_eq!(status.queued_signals, 0);
    }
}
