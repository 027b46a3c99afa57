//! Credit-based bridge between the on-chip network and the physical link.
//!
//! The bridge has two clock domains:
//!
//! - Core domain ([`Bridge::tick_core`]): valid-ready ports to the chip, the credit tracker, the multiplexer and the
//!   demultiplexer.
//! - Link domain ([`Bridge::tick_link`]): serializes frames onto the link and deserializes received frames.
//!
//! Frames cross between the two domains only through two asynchronous FIFOs. The gate from the reset sequencer is
//! registered in the core domain, and reaches the link domain through a reset synchronizer.

mod vc_demux;
mod vc_mux;

use std::array;

use pitonflow::*;
use pitonflow_std::*;
pub use vc_demux::VcDemux;
pub use vc_mux::VcMux;

use crate::*;

/// Status of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Gated by the reset sequencer, or latched down by a link fault.
    Down,
    /// Carrying traffic.
    Up,
}

/// Outputs of the core domain in a cycle.
#[derive(Debug, Clone)]
pub struct CoreEgress<V: Signal, const N: usize> {
    /// Ready signals to the producers.
    pub ready: [Ready; N],
    /// Flits offered to the consumers.
    pub data: [Valid<V>; N],
}

/// Statistics of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Flits admitted from the producer.
    pub flits_sent: u64,
    /// Flits transferred to the consumer.
    pub flits_delivered: u64,
    /// Credit returns sent to the remote bridge.
    pub credits_returned: u64,
    /// Maximum occupancy of the receive buffer.
    pub max_occupancy: usize,
}

/// Statistics of a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStats<const N: usize> {
    /// Per-channel statistics.
    pub channels: [ChannelStats; N],
    /// Frames sent on the link.
    pub frames_sent: u64,
    /// Frames received from the link and accepted.
    pub frames_received: u64,
    /// Frames sent without data.
    pub credit_only_frames: u64,
    /// Frames received while gated or down.
    pub frames_dropped: u64,
    /// Link faults detected.
    pub faults: u64,
}

impl<const N: usize> Default for LinkStats<N> {
    fn default() -> Self {
        Self {
            channels: array::from_fn(|_| ChannelStats::default()),
            frames_sent: 0,
            frames_received: 0,
            credit_only_frames: 0,
            frames_dropped: 0,
            faults: 0,
        }
    }
}

/// Frames in a bridge's clock-domain crossing FIFOs, counted for a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InFlight {
    /// Flits waiting to be sent.
    pub tx_data: usize,
    /// Credit returns waiting to be sent.
    pub tx_returns: usize,
    /// Received flits waiting for the core domain.
    pub rx_data: usize,
    /// Received credit returns waiting for the core domain.
    pub rx_returns: usize,
}

/// Credit-based link bridge.
#[derive(Debug)]
pub struct Bridge<V: Signal, const N: usize> {
    name: String,

    // Core domain.
    gate: bool,
    tracker: CreditTracker<N>,
    mux: VcMux<V, N>,
    demux: VcDemux<V, N>,
    core_ticks: u64,

    // Crossing.
    tx_cdc: AsyncFifo<LinkFrame<V, N>>,
    rx_cdc: AsyncFifo<LinkFrame<V, N>>,

    // Link domain.
    link_rst: ResetSynchronizer,
    link_up: bool,
    fault: Option<LinkFault>,
    link_ticks: u64,

    stats: LinkStats<N>,
}

impl<V: Signal + Default, const N: usize> Bridge<V, N> {
    /// Creates a new bridge talking to a remote bridge configured with `remote`.
    pub fn new(name: &str, local: &BridgeConfig, remote: &BridgeConfig) -> Result<Self, ConfigError> {
        local.validate_pair(remote)?;
        let tracker = CreditTracker::new(&local.buffer_depth, &remote.buffer_depth, local.send_credit_threshold)?;
        Ok(Self {
            name: name.to_string(),
            gate: false,
            tracker,
            mux: VcMux::new(),
            demux: VcDemux::new(&local.buffer_depth),
            core_ticks: 0,
            tx_cdc: AsyncFifo::new(local.crossing_depth, local.sync_stages),
            rx_cdc: AsyncFifo::new(local.crossing_depth, local.sync_stages),
            link_rst: ResetSynchronizer::new(local.sync_stages),
            link_up: false,
            fault: None,
            link_ticks: 0,
            stats: LinkStats::default(),
        })
    }

    /// Returns the name.
    pub fn name(&self) -> &str { &self.name }

    /// Returns the credit tracker.
    pub fn tracker(&self) -> &CreditTracker<N> { &self.tracker }

    /// Returns the statistics.
    pub fn stats(&self) -> &LinkStats<N> { &self.stats }

    /// Returns the latched link fault.
    pub fn fault(&self) -> Option<&LinkFault> { self.fault.as_ref() }

    /// Returns the status of the link.
    pub fn status(&self) -> LinkStatus {
        if self.link_up && self.fault.is_none() {
            LinkStatus::Up
        } else {
            LinkStatus::Down
        }
    }

    /// Returns the number of flits staged for sending on the channel.
    pub fn staged(&self, channel: usize) -> usize { self.mux.staged(channel) }

    /// Returns the number of received flits buffered on the channel.
    pub fn occupancy(&self, channel: usize) -> usize { self.demux.occupancy(channel) }

    /// Counts the frames in the crossing FIFOs for the channel.
    pub fn in_flight(&self, channel: usize) -> InFlight {
        let count = |fifo: &AsyncFifo<LinkFrame<V, N>>| {
            fifo.iter().fold((0, 0), |(data, returns), frame| {
                let has_data = frame.flit().map_or(false, |(id, _)| id.index() == channel);
                (data + usize::from(has_data), returns + usize::from(frame.credit_back[channel]))
            })
        };
        let (tx_data, tx_returns) = count(&self.tx_cdc);
        let (rx_data, rx_returns) = count(&self.rx_cdc);
        InFlight { tx_data, tx_returns, rx_data, rx_returns }
    }

    /// Returns the core-domain outputs in the current cycle, without advancing.
    pub fn peek_core(&self, gate: bool) -> CoreEgress<V, N> {
        if !gate {
            return CoreEgress { ready: [Ready::default(); N], data: array::from_fn(|_| Valid::invalid()) };
        }
        CoreEgress { ready: self.mux.ready(gate, &self.tracker), data: self.demux.peek() }
    }

    /// Advances the core domain by one cycle.
    ///
    /// `noc_in` are the producers' flits and `noc_out_ready` the consumers' ready signals. Returns the outputs in this
    /// cycle: a producer's flit is admitted iff it is valid and its ready is asserted, and a consumer receives a flit
    /// iff it is valid and the consumer is ready.
    ///
    /// While `gate` is low, nothing is admitted or delivered, and every buffer and counter is cleared.
    pub fn tick_core(&mut self, gate: bool, noc_in: &[Valid<V>; N], noc_out_ready: &[bool; N]) -> CoreEgress<V, N> {
        self.core_ticks += 1;

        if !gate {
            if self.gate {
                log::info!("{}: gated, dropping in-flight state", self.name);
            }
            self.gate = false;
            self.tracker.reset();
            self.mux.clear();
            self.demux.clear();
            self.tx_cdc.reset();
            self.rx_cdc.reset();
            return self.peek_core(false);
        }
        if !self.gate {
            log::info!("{}: gate released", self.name);
            self.gate = true;
        }

        // Receive.
        let frame = self.rx_cdc.read_tick(true);
        if let Some(frame) = &frame {
            for channel in 0..N {
                if frame.credit_back[channel] {
                    self.tracker.credit_returned(channel);
                }
            }
        }
        let (delivered, freed) = self.demux.tick(frame.as_ref(), noc_out_ready);
        for channel in 0..N {
            if freed[channel].credit {
                self.tracker.slot_freed(channel);
                self.stats.channels[channel].flits_delivered += 1;
            }
            self.stats.channels[channel].max_occupancy = self.demux.max_occupancy(channel);
        }

        // Transmit.
        let tx_ready = !self.tx_cdc.is_full();
        let (frame, ready) = self.mux.tick(true, noc_in, &mut self.tracker, tx_ready);
        for channel in 0..N {
            if noc_in[channel].fire(ready[channel]) {
                self.stats.channels[channel].flits_sent += 1;
            }
        }
        if let Some(frame) = &frame {
            log::trace!("{}: frame {:?}", self.name, frame);
            for channel in 0..N {
                self.stats.channels[channel].credits_returned += u64::from(frame.credit_back[channel]);
            }
            if !frame.data.valid {
                self.stats.credit_only_frames += 1;
            }
        }
        if self.tx_cdc.write_tick(frame).is_err() {
            panic!("{}", ProtocolViolation::CrossingOverflow { capacity: self.tx_cdc.capacity() });
        }

        CoreEgress { ready, data: delivered }
    }

    /// Advances the link domain by one cycle.
    ///
    /// `input` is the serialized frame received in this cycle. Returns the serialized frame to send.
    pub fn tick_link(&mut self, input: Option<Vec<bool>>) -> Option<Vec<bool>> {
        self.link_ticks += 1;
        let released = self.link_rst.tick(self.gate);

        if released != self.link_up {
            log::info!("{}: link {}", self.name, if released { "up" } else { "down" });
            self.link_up = released;
        }
        if !released {
            if let Some(fault) = self.fault.take() {
                log::info!("{}: clearing link fault: {}", self.name, fault);
            }
            if !self.gate && self.tx_cdc.head().is_some() {
                panic!("{}", ProtocolViolation::FrameWhileGated);
            }
        }

        if !released || self.fault.is_some() {
            if input.is_some() {
                self.stats.frames_dropped += 1;
            }
            let _ = self.tx_cdc.read_tick(false);
            let _ = self.rx_cdc.write_tick(None);
            return None;
        }

        // Receive.
        let received = match input.map(|bits| LinkFrame::decode(&bits, self.link_ticks)) {
            Some(Ok(frame)) => {
                self.stats.frames_received += 1;
                Some(frame)
            }
            Some(Err(fault)) => {
                log::warn!("{}: link down: {}", self.name, fault);
                self.stats.frames_dropped += 1;
                self.stats.faults += 1;
                self.fault = Some(fault);
                None
            }
            None => None,
        };
        if self.rx_cdc.write_tick(received).is_err() {
            panic!("{}", ProtocolViolation::CrossingOverflow { capacity: self.rx_cdc.capacity() });
        }

        // Transmit.
        let frame = self.tx_cdc.read_tick(self.fault.is_none())?;
        log::debug!("{}: sending {:?}", self.name, frame);
        self.stats.frames_sent += 1;
        Some(frame.transl())
    }
}
