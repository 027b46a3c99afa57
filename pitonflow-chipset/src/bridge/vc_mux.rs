//! Transmit path: admits flits from the chip side and multiplexes them onto link frames.

use std::array;

use pitonflow::*;
use pitonflow_std::*;

use crate::*;

/// Depth of the per-channel staging buffers.
const STAGING_DEPTH: usize = 2;

/// Virtual-channel multiplexer.
///
/// Each channel has a [`ValidReadyToCredit`] converter in front of a staging buffer. Admitted flits hold a credit, so
/// every flit in a staging buffer may be sent. A round-robin arbiter picks the channel of the next data frame.
#[derive(Debug)]
pub struct VcMux<V: Signal, const N: usize> {
    converters: [Instance<ValidReadyToCredit<V>>; N],
    staging: [Fifo<V>; N],
    arbiter: Instance<RrArbiter<N>>,
}

impl<V: Signal + Default, const N: usize> VcMux<V, N> {
    /// Creates a new multiplexer.
    pub fn new() -> Self {
        Self {
            converters: array::from_fn(|_| Instance::new("vr_to_credit", ValidReadyToCredit::new())),
            staging: array::from_fn(|_| Fifo::new(STAGING_DEPTH)),
            arbiter: Instance::new("rr_arbiter", RrArbiter),
        }
    }

    fn gate(&self, channel: usize, enabled: bool, tracker: &CreditTracker<N>) -> (VrIngress<V>, CreditGate) {
        let ingress = VrIngress { data: Valid::invalid(), enabled };
        let gate = CreditGate {
            credit_avail: tracker.credits_available(channel) > 0,
            ready: Ready::new(!self.staging[channel].is_full()),
        };
        (ingress, gate)
    }

    /// Returns the ready signals to the producers in the current cycle.
    pub fn ready(&self, enabled: bool, tracker: &CreditTracker<N>) -> [Ready; N] {
        array::from_fn(|channel| {
            let (ingress, gate) = self.gate(channel, enabled, tracker);
            self.converters[channel].comb(&ingress, &gate).1
        })
    }

    /// Returns the number of flits in the staging buffer of the channel.
    pub fn staged(&self, channel: usize) -> usize { self.staging[channel].len() }

    /// Advances one core cycle.
    ///
    /// Admits the producers' flits that are transferred in this cycle, consuming their credits. If `tx_ready`, builds
    /// the frame to send from a staged flit and the pending credit returns. Returns the frame and the ready signals.
    pub fn tick(
        &mut self, enabled: bool, ingress: &[Valid<V>; N], tracker: &mut CreditTracker<N>, tx_ready: bool,
    ) -> (Option<LinkFrame<V, N>>, [Ready; N]) {
        let mut admitted = Vec::with_capacity(N);
        let mut ready = [Ready::default(); N];
        for channel in 0..N {
            let (mut vr_ingress, gate) = self.gate(channel, enabled, tracker);
            vr_ingress.data = ingress[channel].clone();
            let (egress, channel_ready) = self.converters[channel].tick(&vr_ingress, &gate);
            ready[channel] = channel_ready;
            admitted.push(egress.into_option());
        }

        let requests = array::from_fn(|channel| !self.staging[channel].is_empty());
        let (grant, _) = self.arbiter.tick(&requests, &tx_ready);
        let grant = grant.filter(|_| tx_ready);

        let mut data = None;
        for (channel, enq) in admitted.into_iter().enumerate() {
            if enq.is_some() {
                tracker.consume(channel);
            }
            let deq = grant == Some(channel);
            let output = ok_or!(
                self.staging[channel].tick(enq, deq),
                panic!("{}", ProtocolViolation::BufferOverflow { capacity: STAGING_DEPTH })
            );
            if let Some(flit) = output {
                data = Some((ChannelId::from_index(channel), flit));
            }
        }

        if !tx_ready || (data.is_none() && !tracker.needs_credit_frame()) {
            return (None, ready);
        }
        let credit_back = tracker.returns();
        tracker.returns_sent(&credit_back);
        let frame = LinkFrame::new(data, credit_back);
        (Some(frame), ready)
    }

    /// Drops every staged flit.
    pub fn clear(&mut self) {
        self.staging.iter_mut().for_each(Fifo::clear);
        self.arbiter.reset();
    }
}

impl<V: Signal + Default, const N: usize> Default for VcMux<V, N> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Word = Bits<16>;

    fn tracker(depth: usize, threshold: usize) -> CreditTracker<3> {
        CreditTracker::new(&[depth; 3], &[depth; 3], threshold).unwrap()
    }

    #[test]
    fn admit_then_send() {
        let mut mux = VcMux::<Word, 3>::new();
        let mut tracker = tracker(1, 1);
        let ingress = [Valid::invalid(), Valid::valid(Word::new(0xaaaa)), Valid::invalid()];

        let (frame, ready) = mux.tick(true, &ingress, &mut tracker, true);
        assert!(frame.is_none());
        assert!(ready[1].ready);
        assert_eq!(tracker.credits_available(1), 0);
        assert_eq!(mux.staged(1), 1);

        let (frame, ready) = mux.tick(true, &ingress, &mut tracker, true);
        assert!(!ready[1].ready);
        let frame = frame.unwrap();
        assert_eq!(frame.channel.value(), 2);
        assert_eq!(frame.flit().map(|(_, flit)| flit.value()), Some(0xaaaa));
    }

    #[test]
    fn gated_admits_nothing() {
        let mut mux = VcMux::<Word, 3>::new();
        let mut tracker = tracker(2, 1);
        let ingress = [Valid::valid(Word::new(1)); 3];
        let (frame, ready) = mux.tick(false, &ingress, &mut tracker, true);
        assert!(frame.is_none());
        assert!(ready.iter().all(|ready| !ready.ready));
        assert_eq!(tracker.credits_outstanding(0), 0);
    }

    #[test]
    fn credit_only_frame_when_draining() {
        let mut mux = VcMux::<Word, 3>::new();
        let mut tracker = tracker(2, 1);
        tracker.slot_freed(2);
        let (frame, _) = mux.tick(true, &[Valid::invalid(); 3], &mut tracker, false);
        assert!(frame.is_none());
        assert_eq!(tracker.pending(2), 1);

        let (frame, _) = mux.tick(true, &[Valid::invalid(); 3], &mut tracker, true);
        let frame = frame.unwrap();
        assert_eq!(frame.credit_back, [false, false, true]);
        assert!(!frame.data.valid);
        assert_eq!(tracker.pending(2), 0);
    }
}
