//! Receive path: demultiplexes link frames into per-channel buffers.

use std::array;

use pitonflow::*;
use pitonflow_std::*;

use crate::*;

/// Virtual-channel demultiplexer.
///
/// Each channel has a [`CreditToValidReady`] converter whose buffer is as deep as the credits of the remote sender.
#[derive(Debug)]
pub struct VcDemux<V, const N: usize> {
    converters: [CreditToValidReady<V>; N],
}

impl<V: Signal + Default, const N: usize> VcDemux<V, N> {
    /// Creates a new demultiplexer.
    pub fn new(depths: &[usize]) -> Self {
        assert_eq!(depths.len(), N);
        Self { converters: array::from_fn(|channel| CreditToValidReady::new(depths[channel])) }
    }

    /// Returns the flits offered to the consumers in the current cycle.
    pub fn peek(&self) -> [Valid<V>; N] { array::from_fn(|channel| self.converters[channel].peek()) }

    /// Returns the number of buffered flits of the channel.
    pub fn occupancy(&self, channel: usize) -> usize { self.converters[channel].occupancy() }

    /// Returns the maximum number of buffered flits of the channel so far.
    pub fn max_occupancy(&self, channel: usize) -> usize { self.converters[channel].max_occupancy() }

    /// Advances one core cycle.
    ///
    /// Buffers the flit of `frame`, if any, and returns the flits transferred to the consumers with the freed slots.
    pub fn tick(&mut self, frame: Option<&LinkFrame<V, N>>, egress_ready: &[bool; N]) -> ([Valid<V>; N], [Credit; N]) {
        let flit = frame.and_then(LinkFrame::flit).map(|(channel, flit)| (channel.index(), flit.clone()));

        let mut egress: [Valid<V>; N] = array::from_fn(|_| Valid::invalid());
        let mut freed = [Credit::default(); N];
        for (channel, converter) in self.converters.iter_mut().enumerate() {
            let ingress = match &flit {
                Some((index, flit)) if *index == channel => Valid::valid(flit.clone()),
                _ => Valid::invalid(),
            };
            let (output, credit) = converter.tick(ingress, egress_ready[channel]);
            egress[channel] = Valid::new(credit.credit, output.inner);
            freed[channel] = credit;
        }
        (egress, freed)
    }

    /// Drops every buffered flit.
    pub fn clear(&mut self) { self.converters.iter_mut().for_each(CreditToValidReady::clear) }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Word = Bits<16>;

    #[test]
    fn demux_by_tag() {
        let mut demux = VcDemux::<Word, 3>::new(&[2, 2, 2]);
        let frame = LinkFrame::new(Some((ChannelId::from_index(2), Word::new(7))), [false; 3]);
        let (egress, freed) = demux.tick(Some(&frame), &[true; 3]);
        assert!(egress.iter().all(|flit| !flit.valid));
        assert!(freed.iter().all(|credit| !credit.credit));
        assert_eq!(demux.occupancy(2), 1);

        let (egress, freed) = demux.tick(None, &[true, true, false]);
        assert!(!egress[2].valid && !freed[2].credit);
        assert_eq!(demux.peek()[2].into_option(), Some(Word::new(7)));

        let (egress, freed) = demux.tick(None, &[true; 3]);
        assert_eq!(egress[2].into_option(), Some(Word::new(7)));
        assert!(freed[2].credit);
        assert_eq!(demux.occupancy(2), 0);
    }
}
