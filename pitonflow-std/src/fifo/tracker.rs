//! FIFO Tracker.

use pitonflow::*;

use crate::*;

/// Ingress signal of FIFO tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Signal)]
pub struct TrackerOp {
    /// Enqueue in this cycle.
    pub enq: bool,
    /// Dequeue in this cycle.
    pub deq: bool,
}

/// Egress signal of FIFO tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStatus {
    /// Slot written by the next enqueue.
    pub wptr: usize,
    /// Slot read by the next dequeue.
    pub rptr: usize,
    /// Full
    pub full: bool,
    /// Empty
    pub empty: bool,
}

/// Registers of FIFO tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerState {
    wptr: usize,
    rptr: usize,
    last_op: TrackerOp,
}

/// Tracks the read and write pointers of a FIFO with `slots` slots.
///
/// Equal pointers mean either full or empty: the FIFO is full if the last operation that moved a pointer was an
/// enqueue only, and empty otherwise.
#[derive(Debug, Clone)]
pub struct FifoTracker {
    slots: usize,
}

impl FifoTracker {
    /// Creates a new tracker.
    pub fn new(slots: usize) -> Self {
        assert!(slots > 0, "FIFO should have at least one slot");
        Self { slots }
    }

    /// Returns the number of slots.
    pub fn slots(&self) -> usize { self.slots }
}

impl Fsm for FifoTracker {
    type EgressBwd = ();
    type EgressFwd = TrackerStatus;
    type IngressBwd = ();
    type IngressFwd = TrackerOp;
    type State = TrackerState;

    fn init(&self) -> TrackerState { TrackerState { wptr: 0, rptr: 0, last_op: TrackerOp { enq: false, deq: true } } }

    fn step(&self, op: &TrackerOp, _: &(), state: &TrackerState) -> (TrackerStatus, (), TrackerState) {
        let equal_ptrs = state.wptr == state.rptr;
        let full = equal_ptrs && state.last_op.enq;
        let empty = equal_ptrs && state.last_op.deq;

        let status = TrackerStatus { wptr: state.wptr, rptr: state.rptr, full, empty };
        let state_next = TrackerState {
            wptr: counter_next(state.wptr, op.enq, self.slots),
            rptr: counter_next(state.rptr, op.deq, self.slots),
            last_op: if op.enq != op.deq { *op } else { state.last_op },
        };
        (status, (), state_next)
    }
}
