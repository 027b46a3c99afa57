//! Counter modules.

use crate::*;

/// Returns the next value of a circular pointer over `slots` values.
pub const fn counter_next(value: usize, up: bool, slots: usize) -> usize {
    if !up {
        value
    } else if value + 1 >= slots {
        0
    } else {
        value + 1
    }
}

/// Counter up and down, bounded by `[0, max]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpDownCounter {
    count: usize,
    max: usize,
}

impl UpDownCounter {
    /// Creates a new counter.
    pub fn new(init: usize, max: usize) -> Self {
        assert!(init <= max, "initial count {} exceeds maximum {}", init, max);
        Self { count: init, max }
    }

    /// Returns the count.
    pub fn count(&self) -> usize { self.count }

    /// Returns the maximum count.
    pub fn max(&self) -> usize { self.max }

    /// Adds `up` and subtracts `down` in one cycle.
    ///
    /// Returns the new count, or `None` without updating if it would leave `[0, max]`.
    pub fn update(&mut self, up: usize, down: usize) -> Option<usize> {
        let count_next = (self.count + up).checked_sub(down)?;
        if count_next > self.max {
            return None;
        }
        self.count = count_next;
        Some(count_next)
    }

    /// Sets the count.
    pub fn set(&mut self, count: usize) {
        assert!(count <= self.max);
        self.count = count;
    }
}

/// Credit counter: the local view of the free slots of a remote receive buffer.
///
/// Starts full. Consuming a credit with none available, or returning more credits than the capacity, is a protocol
/// violation and panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditCounter {
    inner: UpDownCounter,
}

impl CreditCounter {
    /// Creates a counter holding `capacity` credits.
    pub fn new(capacity: usize) -> Self { Self { inner: UpDownCounter::new(capacity, capacity) } }

    /// Returns the capacity.
    pub fn capacity(&self) -> usize { self.inner.max() }

    /// Returns the number of available credits.
    pub fn available(&self) -> usize { self.inner.count() }

    /// Returns the number of consumed but not yet returned credits.
    pub fn outstanding(&self) -> usize { self.inner.max() - self.inner.count() }

    /// Consumes a credit.
    pub fn consume(&mut self) {
        if self.inner.update(0, 1).is_none() {
            panic!("{}", ProtocolViolation::CreditUnderflow);
        }
    }

    /// Returns a credit.
    pub fn restore(&mut self) {
        if self.inner.update(1, 0).is_none() {
            panic!("{}", ProtocolViolation::CreditOverflow { capacity: self.capacity() });
        }
    }

    /// Returns every outstanding credit.
    pub fn reset(&mut self) { self.inner.set(self.inner.max()) }
}
