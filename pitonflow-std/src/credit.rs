//! Credit-based Control Flow.

use std::marker::PhantomData;

use pitonflow::*;

use crate::*;

/// Forward ingress of [`ValidReadyToCredit`].
#[derive(Debug, Clone)]
pub struct VrIngress<V: Signal> {
    /// Producer's data.
    pub data: Valid<V>,
    /// Whether the link is allowed to carry traffic.
    pub enabled: bool,
}

/// Backward egress of [`ValidReadyToCredit`].
#[derive(Debug, Clone, Copy)]
pub struct CreditGate {
    /// Whether a credit is available for the channel.
    pub credit_avail: bool,
    /// Whether the staging buffer accepts data.
    pub ready: Ready,
}

/// Converts the valid-ready protocol into the valid-credit protocol.
///
/// It has no registers: `ready` is asserted to the producer iff the link is enabled, a credit is available, and the
/// staging buffer has room. The egress is valid exactly in the cycles where a transfer happens, and each such cycle
/// consumes one credit in the credit counter.
#[derive(Debug)]
pub struct ValidReadyToCredit<V: Signal> {
    _marker: PhantomData<V>,
}

impl<V: Signal> ValidReadyToCredit<V> {
    /// Creates a new converter.
    pub fn new() -> Self { Self { _marker: PhantomData } }
}

impl<V: Signal> Default for ValidReadyToCredit<V> {
    fn default() -> Self { Self::new() }
}

impl<V: Signal> Fsm for ValidReadyToCredit<V> {
    type EgressBwd = CreditGate;
    type EgressFwd = Valid<V>;
    type IngressBwd = Ready;
    type IngressFwd = VrIngress<V>;
    type State = ();

    fn init(&self) {}

    fn step(&self, ingress_fwd: &VrIngress<V>, egress_bwd: &CreditGate, state: &()) -> (Valid<V>, Ready, ()) {
        let ingress_bwd = Ready::new(ingress_fwd.enabled && egress_bwd.credit_avail && egress_bwd.ready.ready);
        let egress_fwd = Valid::new(ingress_fwd.data.fire(ingress_bwd), ingress_fwd.data.inner.clone());
        (egress_fwd, ingress_bwd, *state)
    }
}

/// Converts the valid-credit protocol into the valid-ready protocol, by using a FIFO to keep the data.
///
/// The FIFO has as many slots as the credits the remote sender starts with, so it never overflows in a correct
/// system. Every dequeue returns a credit.
#[derive(Debug)]
pub struct CreditToValidReady<V> {
    fifo: Fifo<V>,
    max_occupancy: usize,
}

impl<V: Signal + Default> CreditToValidReady<V> {
    /// Creates a new converter with `depth` slots.
    pub fn new(depth: usize) -> Self { Self { fifo: Fifo::new(depth), max_occupancy: 0 } }

    /// Returns the number of slots.
    pub fn depth(&self) -> usize { self.fifo.capacity() }

    /// Returns the number of buffered flits.
    pub fn occupancy(&self) -> usize { self.fifo.len() }

    /// Returns the maximum occupancy since creation.
    pub fn max_occupancy(&self) -> usize { self.max_occupancy }

    /// Returns the egress in the current cycle.
    pub fn peek(&self) -> Valid<V> { self.fifo.head().cloned().into() }

    /// Advances one cycle.
    ///
    /// Returns the egress in this cycle, and a credit iff it was transferred.
    ///
    /// # Panics
    ///
    /// Panics with [`ProtocolViolation::BufferOverflow`] if `ingress` arrives while the FIFO is full.
    pub fn tick(&mut self, ingress: Valid<V>, egress_ready: bool) -> (Valid<V>, Credit) {
        let egress = self.peek();
        let deq = egress.fire(Ready::new(egress_ready));
        if self.fifo.tick(ingress.into_option(), deq).is_err() {
            panic!("{}", ProtocolViolation::BufferOverflow { capacity: self.fifo.capacity() });
        }
        self.max_occupancy = self.max_occupancy.max(self.fifo.len());
        (egress, Credit::new(deq))
    }

    /// Drops every buffered flit.
    pub fn clear(&mut self) { self.fifo.clear() }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Word = Bits<16>;

    #[test]
    fn ready_requires_credit_and_enable() {
        let conv = Instance::new("vr_to_credit", ValidReadyToCredit::<Word>::new());
        let ingress = VrIngress { data: Valid::valid(Word::new(0xaaaa)), enabled: true };
        let gate = CreditGate { credit_avail: true, ready: Ready::new(true) };

        let (egress, ready) = conv.comb(&ingress, &gate);
        assert!(ready.ready && egress.valid);
        assert_eq!(egress.inner.value(), 0xaaaa);

        let (egress, ready) = conv.comb(&ingress, &CreditGate { credit_avail: false, ..gate });
        assert!(!ready.ready && !egress.valid);

        let (egress, ready) = conv.comb(&VrIngress { enabled: false, ..ingress }, &gate);
        assert!(!ready.ready && !egress.valid);
    }

    #[test]
    fn credit_on_dequeue() {
        let mut conv = CreditToValidReady::<Word>::new(2);
        let (egress, credit) = conv.tick(Valid::valid(Word::new(1)), true);
        assert!(!egress.valid && !credit.credit);
        let (egress, credit) = conv.tick(Valid::valid(Word::new(2)), false);
        assert_eq!(egress.into_option(), Some(Word::new(1)));
        assert!(!credit.credit);
        let (egress, credit) = conv.tick(Valid::invalid(), true);
        assert_eq!(egress.into_option(), Some(Word::new(1)));
        assert!(credit.credit);
        assert_eq!(conv.peek().into_option(), Some(Word::new(2)));
        assert_eq!(conv.max_occupancy(), 2);
    }

    #[test]
    #[should_panic(expected = "overflowed despite credit gating")]
    fn overflow_is_fatal() {
        let mut conv = CreditToValidReady::<Word>::new(1);
        conv.tick(Valid::valid(Word::new(1)), false);
        conv.tick(Valid::valid(Word::new(2)), false);
    }
}
