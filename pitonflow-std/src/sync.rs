//! Synchronizers for signals crossing clock domains.

/// N-flop synchronizer.
///
/// The input is sampled at every tick of the receiving domain, and is visible at the output after `stages` ticks.
#[derive(Debug, Clone)]
pub struct Synchronizer<T> {
    flops: Vec<T>,
}

impl<T: Clone> Synchronizer<T> {
    /// Creates a new synchronizer with every flop holding `init`.
    pub fn new(stages: usize, init: T) -> Self {
        assert!(stages > 0, "synchronizer should have at least one stage");
        Self { flops: vec![init; stages] }
    }

    /// Returns the number of stages.
    pub fn stages(&self) -> usize { self.flops.len() }

    /// Returns the output of the last flop.
    pub fn output(&self) -> &T { &self.flops[self.flops.len() - 1] }

    /// Samples `input` and returns the new output.
    pub fn tick(&mut self, input: T) -> &T {
        self.flops.rotate_right(1);
        self.flops[0] = input;
        self.output()
    }

    /// Sets every flop to `value`.
    pub fn reset(&mut self, value: T) { self.flops.iter_mut().for_each(|flop| *flop = value.clone()) }
}

/// Reset synchronizer: asynchronous assertion, synchronous deassertion.
///
/// The input is active-low: `release == false` holds the receiving domain in reset. The output drops as soon as the
/// input drops, without waiting for a tick, and rises only after the input has been high for `stages` ticks.
#[derive(Debug, Clone)]
pub struct ResetSynchronizer {
    sync: Synchronizer<bool>,
}

impl ResetSynchronizer {
    /// Creates a new reset synchronizer, asserting reset.
    pub fn new(stages: usize) -> Self { Self { sync: Synchronizer::new(stages, false) } }

    /// Returns `true` if the receiving domain is released from reset, given the current input.
    pub fn released(&self, release: bool) -> bool { release && *self.sync.output() }

    /// Samples `release` and returns whether the receiving domain is released.
    pub fn tick(&mut self, release: bool) -> bool {
        if !release {
            self.sync.reset(false);
            return false;
        }
        *self.sync.tick(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synchronizer_latency() {
        let mut sync = Synchronizer::new(2, 0);
        assert_eq!(*sync.tick(5), 0);
        assert_eq!(*sync.tick(6), 5);
        assert_eq!(*sync.tick(6), 6);
        sync.reset(1);
        assert_eq!(*sync.output(), 1);
    }

    #[test]
    fn reset_asserts_asynchronously() {
        let mut rst = ResetSynchronizer::new(2);
        assert!(!rst.tick(true));
        assert!(rst.tick(true));
        assert!(rst.released(true));
        assert!(!rst.released(false));
        assert!(!rst.tick(false));
        assert!(!rst.tick(true));
        assert!(rst.tick(true));
    }
}
