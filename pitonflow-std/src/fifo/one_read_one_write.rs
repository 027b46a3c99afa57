//! FIFO with 1 read and 1 write

use pitonflow::*;

use super::tracker::{FifoTracker, TrackerOp};

/// Synchronous FIFO with one read port and one write port.
///
/// An enqueue is accepted only if the FIFO is not full at the beginning of the cycle, even if a dequeue happens in
/// the same cycle. A one-slot or two-slot `Fifo` is used as a staging buffer.
#[derive(Debug)]
pub struct Fifo<V> {
    mem: Vec<Option<V>>,
    tracker: Instance<FifoTracker>,
    len: usize,
}

impl<V> Fifo<V> {
    /// Creates a new FIFO with `slots` slots.
    pub fn new(slots: usize) -> Self {
        let tracker = Instance::new("fifo_tracker", FifoTracker::new(slots));
        Self { mem: (0..slots).map(|_| None).collect(), tracker, len: 0 }
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize { self.mem.len() }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize { self.len }

    /// Returns `true` if empty.
    pub fn is_empty(&self) -> bool { self.tracker.comb(&TrackerOp::default(), &()).0.empty }

    /// Returns `true` if full.
    pub fn is_full(&self) -> bool { self.tracker.comb(&TrackerOp::default(), &()).0.full }

    /// Returns the head.
    pub fn head(&self) -> Option<&V> {
        let status = self.tracker.comb(&TrackerOp::default(), &()).0;
        if status.empty {
            return None;
        }
        self.mem[status.rptr].as_ref()
    }

    /// Iterates from the head to the tail.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        let rptr = self.tracker.comb(&TrackerOp::default(), &()).0.rptr;
        (0..self.len).filter_map(move |i| self.mem[(rptr + i) % self.mem.len()].as_ref())
    }

    /// Advances one cycle: dequeues the head if `deq`, and enqueues `enq` if given.
    ///
    /// Returns the dequeued value. Returns `Err(enq)` without changing anything if the FIFO is full.
    pub fn tick(&mut self, enq: Option<V>, deq: bool) -> Result<Option<V>, V> {
        let op = TrackerOp { enq: enq.is_some(), deq };
        let (status, _) = self.tracker.comb(&op, &());
        if let Some(value) = enq {
            if status.full {
                return Err(value);
            }
            self.mem[status.wptr] = Some(value);
            self.len += 1;
        }

        let op = TrackerOp { enq: op.enq, deq: deq && !status.empty };
        let output = if op.deq {
            self.len -= 1;
            self.mem[status.rptr].take()
        } else {
            None
        };
        let _ = self.tracker.tick(&op, &());
        Ok(output)
    }

    /// Enqueues a value.
    pub fn push(&mut self, value: V) -> Result<(), V> { self.tick(Some(value), false).map(|_| ()) }

    /// Dequeues the head.
    pub fn pop(&mut self) -> Option<V> { self.tick(None, true).ok().flatten() }

    /// Drops every value.
    pub fn clear(&mut self) {
        self.mem.iter_mut().for_each(|slot| *slot = None);
        self.tracker.reset();
        self.len = 0;
    }
}
