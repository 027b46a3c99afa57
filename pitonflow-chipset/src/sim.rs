//! Deterministic simulation of the chip, the chipset, and the link between them.
//!
//! The chip-side and chipset-side bridges share one reset sequencer, and are connected by one [`PhysLink`] per
//! direction. Both bridges and the sequencer run on the core clock, and the link domain of both bridges runs on the
//! link clock. Each channel in each direction has a producer queue on the sending side and a consumer on the
//! receiving side.

use std::array;
use std::collections::VecDeque;
use std::fmt;

use itertools::Itertools;
use pitonflow::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::*;

/// Producer queue length up to which random traffic is injected.
const MAX_QUEUED: usize = 4;

/// Core cycles the external reset is held for a scheduled reset.
const RESET_PULSE: u64 = 4;

/// Direction of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From the chip to the chipset.
    ChipToChipset,
    /// From the chipset to the chip.
    ChipsetToChip,
}

impl Direction {
    /// Both directions.
    pub const ALL: [Direction; 2] = [Direction::ChipToChipset, Direction::ChipsetToChip];

    /// Returns the index of the sending bridge, which is also the index of the link.
    fn index(self) -> usize {
        match self {
            Direction::ChipToChipset => 0,
            Direction::ChipsetToChip => 1,
        }
    }

    /// Returns the opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Direction::ChipToChipset => Direction::ChipsetToChip,
            Direction::ChipsetToChip => Direction::ChipToChipset,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ChipToChipset => write!(f, "chip->chipset"),
            Direction::ChipsetToChip => write!(f, "chipset->chip"),
        }
    }
}

/// Behavior of a consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsumerMode {
    /// Always ready.
    Always,
    /// Never ready.
    Never,
    /// Ready with the given probability in each cycle.
    Random(f64),
}

#[derive(Debug)]
struct Endpoint {
    queue: VecDeque<Flit>,
    admitted: Vec<Flit>,
    delivered: Vec<Flit>,
    consumer: ConsumerMode,
    generated: u64,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            admitted: Vec::new(),
            delivered: Vec::new(),
            consumer: ConsumerMode::Always,
            generated: 0,
        }
    }
}

/// Frames sent in a link cycle.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    /// Time of the link cycle.
    pub time_ps: u64,
    /// Gate of the reset sequencer.
    pub gate: bool,
    /// Frame sent in each direction, indexed as [`Direction::ALL`].
    pub frames: [Option<LinkFrame<Flit, NUM_CHANNELS>>; 2],
}

/// Whereabouts of the credits of a channel in a direction.
///
/// Each credit is exactly in one place, so [`CreditLedger::total`] is always the buffer depth while the link is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreditLedger {
    /// Available at the sender.
    pub available: usize,
    /// Held by a flit in the sender's staging buffer.
    pub staged: usize,
    /// Held by a flit in a crossing FIFO or on the wire.
    pub data_in_flight: usize,
    /// Held by a flit in the receiver's buffer.
    pub buffered: usize,
    /// Freed at the receiver, not yet returned.
    pub pending: usize,
    /// Returned, in a crossing FIFO or on the wire.
    pub returns_in_flight: usize,
}

impl CreditLedger {
    /// Returns the number of credits.
    pub fn total(&self) -> usize {
        self.available + self.staged + self.data_in_flight + self.buffered + self.pending + self.returns_in_flight
    }
}

/// Simulated system.
#[derive(Debug)]
pub struct System {
    config: ChipsetConfig,
    clocks: ClockScheduler,
    core: DomainId,

    sequencer: ResetSequencer,
    gate: bool,
    ref_clk_locked: bool,
    chip_clk_locked: bool,
    reset: bool,
    reset_schedule: Vec<u64>,

    bridges: [Bridge<Flit, NUM_CHANNELS>; 2],
    links: [PhysLink; 2],
    endpoints: [[Endpoint; NUM_CHANNELS]; 2],

    rng: StdRng,
    injection_rate: Option<f64>,
    trace: Option<Vec<TraceEntry>>,
    core_ticks: u64,
    rearms: u64,
}

impl System {
    /// Creates a new system. Both clocks start locked and the external reset deasserted.
    pub fn new(config: ChipsetConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut clocks = ClockScheduler::default();
        let core = clocks.add("core", config.clock.core_period_ps, 0)?;
        let _ = clocks.add("link", config.clock.link_period_ps, config.clock.link_phase_ps)?;

        let bridges = [
            Bridge::new("chip", &config.chip, &config.chipset)?,
            Bridge::new("chipset", &config.chipset, &config.chip)?,
        ];
        let links = [PhysLink::new(&config.link, seed ^ 0x1)?, PhysLink::new(&config.link, seed ^ 0x2)?];

        Ok(Self {
            sequencer: ResetSequencer::new(&config.reset)?,
            config,
            clocks,
            core,
            gate: false,
            ref_clk_locked: true,
            chip_clk_locked: true,
            reset: false,
            reset_schedule: Vec::new(),
            bridges,
            links,
            endpoints: array::from_fn(|_| array::from_fn(|_| Endpoint::default())),
            rng: StdRng::seed_from_u64(seed),
            injection_rate: None,
            trace: None,
            core_ticks: 0,
            rearms: 0,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ChipsetConfig { &self.config }

    /// Returns the reset sequencer.
    pub fn sequencer(&self) -> &ResetSequencer { &self.sequencer }

    /// Returns the chip-side bridge.
    pub fn chip(&self) -> &Bridge<Flit, NUM_CHANNELS> { &self.bridges[0] }

    /// Returns the chipset-side bridge.
    pub fn chipset(&self) -> &Bridge<Flit, NUM_CHANNELS> { &self.bridges[1] }

    /// Returns the bridge sending in the direction.
    pub fn sender(&self, direction: Direction) -> &Bridge<Flit, NUM_CHANNELS> { &self.bridges[direction.index()] }

    /// Returns the bridge receiving in the direction.
    pub fn receiver(&self, direction: Direction) -> &Bridge<Flit, NUM_CHANNELS> {
        &self.bridges[direction.reverse().index()]
    }

    /// Returns the number of core cycles so far.
    pub fn core_ticks(&self) -> u64 { self.core_ticks }

    /// Returns the simulated time in picoseconds.
    pub fn now_ps(&self) -> u64 { self.clocks.now_ps() }

    /// Returns how many times the gate dropped after the link was ready.
    pub fn rearms(&self) -> u64 { self.rearms }

    /// Sets the reference clock lock indicator.
    pub fn set_ref_clk_locked(&mut self, locked: bool) { self.ref_clk_locked = locked }

    /// Sets the chip clock lock indicator.
    pub fn set_chip_clk_locked(&mut self, locked: bool) { self.chip_clk_locked = locked }

    /// Asserts or deasserts the external reset.
    pub fn set_reset(&mut self, asserted: bool) { self.reset = asserted }

    /// Schedules an external reset pulse at the given core cycle.
    pub fn schedule_reset(&mut self, core_tick: u64) { self.reset_schedule.push(core_tick) }

    /// Drops the reference clock lock for `ticks` core cycles.
    pub fn glitch_ref_clk_lock(&mut self, ticks: u64) {
        self.set_ref_clk_locked(false);
        self.run_core_ticks(ticks);
        self.set_ref_clk_locked(true);
    }

    /// Drops the chip clock lock for `ticks` core cycles.
    pub fn glitch_chip_clk_lock(&mut self, ticks: u64) {
        self.set_chip_clk_locked(false);
        self.run_core_ticks(ticks);
        self.set_chip_clk_locked(true);
    }

    /// Enqueues a flit at the producer of the channel.
    pub fn send(&mut self, direction: Direction, channel: ChannelId, flit: Flit) {
        self.endpoints[direction.index()][channel.index()].queue.push_back(flit);
    }

    /// Sets the behavior of the consumer of the channel.
    pub fn set_consumer(&mut self, direction: Direction, channel: ChannelId, mode: ConsumerMode) {
        self.endpoints[direction.index()][channel.index()].consumer = mode;
    }

    /// Sets the behavior of every consumer.
    pub fn set_all_consumers(&mut self, mode: ConsumerMode) {
        self.endpoints.iter_mut().flatten().for_each(|endpoint| endpoint.consumer = mode);
    }

    /// Injects random traffic at every producer with the given probability per core cycle, or stops injecting.
    pub fn set_injection_rate(&mut self, rate: Option<f64>) { self.injection_rate = rate }

    /// Returns the flits admitted by the bridge from the producer of the channel.
    pub fn admitted(&self, direction: Direction, channel: ChannelId) -> &[Flit] {
        &self.endpoints[direction.index()][channel.index()].admitted
    }

    /// Returns the flits delivered to the consumer of the channel.
    pub fn delivered(&self, direction: Direction, channel: ChannelId) -> &[Flit] {
        &self.endpoints[direction.index()][channel.index()].delivered
    }

    /// Returns the number of flits waiting at the producer of the channel.
    pub fn queued(&self, direction: Direction, channel: ChannelId) -> usize {
        self.endpoints[direction.index()][channel.index()].queue.len()
    }

    /// Flips a bit of the next frame sent in the direction.
    pub fn corrupt_next(&mut self, direction: Direction, bit: usize) { self.links[direction.index()].corrupt_next(bit) }

    /// Starts recording the frames sent in each link cycle.
    pub fn enable_trace(&mut self) { self.trace = Some(Vec::new()) }

    /// Returns the recorded frames.
    pub fn link_trace(&self) -> &[TraceEntry] { self.trace.as_deref().unwrap_or_default() }

    /// Returns the whereabouts of the credits of the channel in the direction.
    pub fn credit_ledger(&self, direction: Direction, channel: ChannelId) -> CreditLedger {
        let index = channel.index();
        let sender = self.sender(direction);
        let receiver = self.receiver(direction);
        let sender_in_flight = sender.in_flight(index);
        let receiver_in_flight = receiver.in_flight(index);

        let decode = |link: &PhysLink| {
            link.in_flight().filter_map(LinkFrame::<Flit, NUM_CHANNELS>::from_bits).collect::<Vec<_>>()
        };
        let on_wire_data = decode(&self.links[direction.index()])
            .iter()
            .filter(|frame| frame.flit().map_or(false, |(id, _)| id == channel))
            .count();
        let on_wire_returns = decode(&self.links[direction.reverse().index()])
            .iter()
            .filter(|frame| frame.returns_credit(channel))
            .count();

        CreditLedger {
            available: sender.tracker().credits_available(index),
            staged: sender.staged(index),
            data_in_flight: sender_in_flight.tx_data + on_wire_data + receiver_in_flight.rx_data,
            buffered: receiver.occupancy(index),
            pending: receiver.tracker().pending(index),
            returns_in_flight: receiver_in_flight.tx_returns + on_wire_returns + sender_in_flight.rx_returns,
        }
    }

    /// Returns whether every admitted flit has been delivered and no producer has flits left.
    pub fn is_quiescent(&self) -> bool {
        Direction::ALL.into_iter().all(|direction| {
            ChannelId::all().all(|channel| {
                let ledger = self.credit_ledger(direction, channel);
                self.queued(direction, channel) == 0
                    && ledger.staged == 0
                    && ledger.data_in_flight == 0
                    && ledger.buffered == 0
            })
        })
    }

    /// Advances to the next clock edge.
    pub fn step(&mut self) -> Edge {
        let edge = ok_or!(self.clocks.next_edge(), unreachable!("clock domains are registered at construction"));
        if edge.domain == self.core {
            self.core_tick();
        } else {
            self.link_tick(edge.time_ps);
        }
        edge
    }

    /// Advances by `ticks` core cycles.
    pub fn run_core_ticks(&mut self, ticks: u64) {
        let target = self.core_ticks + ticks;
        while self.core_ticks < target {
            let _ = self.step();
        }
    }

    /// Advances until the reset sequencer is ready, for at most `max_ticks` core cycles.
    ///
    /// Returns whether it is ready.
    pub fn run_until_ready(&mut self, max_ticks: u64) -> bool {
        let target = self.core_ticks + max_ticks;
        while !self.sequencer.ready() && self.core_ticks < target {
            let _ = self.step();
        }
        self.sequencer.ready()
    }

    /// Advances until [`System::is_quiescent`], for at most `max_ticks` core cycles.
    ///
    /// Returns whether it is quiescent.
    pub fn run_until_quiescent(&mut self, max_ticks: u64) -> bool {
        let target = self.core_ticks + max_ticks;
        while !self.is_quiescent() && self.core_ticks < target {
            let _ = self.step();
        }
        self.is_quiescent()
    }

    fn inject(&mut self, rate: f64) {
        for (direction, endpoints) in Direction::ALL.into_iter().zip(self.endpoints.iter_mut()) {
            for (index, endpoint) in endpoints.iter_mut().enumerate() {
                if endpoint.queue.len() < MAX_QUEUED && self.rng.gen_bool(rate) {
                    // Unique per direction and channel, so that loss and reordering are detectable.
                    let flit = ((direction.index() as u64) << 62) | ((index as u64) << 56) | endpoint.generated;
                    endpoint.generated += 1;
                    endpoint.queue.push_back(Flit::new(flit));
                }
            }
        }
    }

    fn core_tick(&mut self) {
        if let Some(rate) = self.injection_rate {
            self.inject(rate);
        }
        let tick = self.core_ticks;
        if self.reset_schedule.iter().any(|start| *start == tick) {
            log::info!("asserting external reset at core cycle {}", tick);
            self.reset = true;
        }
        if self.reset_schedule.iter().any(|start| *start + RESET_PULSE == tick) {
            self.reset = false;
        }

        let raw = RawResetInputs {
            ref_clk_locked: self.ref_clk_locked,
            chip_clk_locked: self.chip_clk_locked,
            reset_pin: self.sequencer.reset_level(self.reset),
        };
        let gate = self.sequencer.tick(raw).ready;
        if self.gate && !gate {
            self.rearms += 1;
            self.links.iter_mut().for_each(PhysLink::flush);
        }
        self.gate = gate;

        for direction in Direction::ALL {
            let side = direction.index();
            let consumers = direction.reverse().index();

            let noc_in: [Valid<Flit>; NUM_CHANNELS] =
                array::from_fn(|channel| self.endpoints[side][channel].queue.front().copied().into());
            let mut noc_out_ready = [false; NUM_CHANNELS];
            for (ready, endpoint) in noc_out_ready.iter_mut().zip(&self.endpoints[consumers]) {
                *ready = match endpoint.consumer {
                    ConsumerMode::Always => true,
                    ConsumerMode::Never => false,
                    ConsumerMode::Random(probability) => self.rng.gen_bool(probability.clamp(0.0, 1.0)),
                };
            }

            let egress = self.bridges[side].tick_core(gate, &noc_in, &noc_out_ready);
            for channel in 0..NUM_CHANNELS {
                if noc_in[channel].fire(egress.ready[channel]) {
                    let producer = &mut self.endpoints[side][channel];
                    if let Some(flit) = producer.queue.pop_front() {
                        producer.admitted.push(flit);
                    }
                }
                if let Some(flit) = egress.data[channel].into_option() {
                    self.endpoints[consumers][channel].delivered.push(flit);
                }
            }
        }
        self.core_ticks += 1;
    }

    fn link_tick(&mut self, time_ps: u64) {
        let [to_chipset, to_chip] = [self.links[0].receive(), self.links[1].receive()];
        let sent = [self.bridges[0].tick_link(to_chip), self.bridges[1].tick_link(to_chipset)];

        if let Some(trace) = &mut self.trace {
            let frames = array::from_fn(|side| sent[side].as_deref().and_then(LinkFrame::from_bits));
            trace.push(TraceEntry { time_ps, gate: self.sequencer.ready(), frames });
        }

        let [chip_sent, chipset_sent] = sent;
        self.links[0].transmit(chip_sent);
        self.links[1].transmit(chipset_sent);
    }

    /// Runs random traffic for `cycles` core cycles, then stops injecting and lets every consumer drain.
    pub fn run_random(&mut self, cycles: u64, injection_rate: f64, consumer: ConsumerMode) -> Report {
        self.set_all_consumers(consumer);
        self.set_injection_rate(Some(injection_rate));
        self.run_core_ticks(cycles);
        self.set_injection_rate(None);
        self.set_all_consumers(ConsumerMode::Always);
        self.reset_schedule.clear();
        self.set_reset(false);
        let _ = self.run_until_ready(cycles.max(1_000));
        let _ = self.run_until_quiescent(cycles.max(1_000));
        self.report()
    }

    /// Summarizes the simulation so far.
    pub fn report(&self) -> Report {
        let channels = Direction::ALL
            .into_iter()
            .cartesian_product(ChannelId::all())
            .map(|(direction, channel)| {
                let endpoint = &self.endpoints[direction.index()][channel.index()];
                let receiver = self.receiver(direction).stats();
                let lossless = self.rearms == 0 && self.bridges.iter().all(|bridge| bridge.stats().faults == 0);
                let intact = if lossless {
                    endpoint.delivered == endpoint.admitted
                } else {
                    is_subsequence(&endpoint.delivered, &endpoint.admitted)
                };
                ChannelReport {
                    direction,
                    channel,
                    sent: endpoint.admitted.len(),
                    delivered: endpoint.delivered.len(),
                    queued: endpoint.queue.len(),
                    credits_returned: receiver.channels[channel.index()].credits_returned,
                    max_occupancy: receiver.channels[channel.index()].max_occupancy,
                    depth: self.config.chip.buffer_depth[channel.index()],
                    intact,
                }
            })
            .collect();

        Report {
            core_ticks: self.core_ticks,
            rearms: self.rearms,
            channels,
            bridges: [&self.bridges[0], &self.bridges[1]].map(|bridge| BridgeReport {
                name: bridge.name().to_string(),
                status: bridge.status(),
                frames_sent: bridge.stats().frames_sent,
                credit_only_frames: bridge.stats().credit_only_frames,
                frames_dropped: bridge.stats().frames_dropped,
                faults: bridge.stats().faults,
            }),
        }
    }
}

fn is_subsequence(sub: &[Flit], seq: &[Flit]) -> bool {
    let mut seq = seq.iter();
    sub.iter().all(|flit| seq.any(|other| other == flit))
}

/// Summary of a channel in a direction.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct ChannelReport {
    pub direction: Direction,
    pub channel: ChannelId,
    pub sent: usize,
    pub delivered: usize,
    pub queued: usize,
    pub credits_returned: u64,
    pub max_occupancy: usize,
    pub depth: usize,
    /// Delivered flits are the admitted flits in order. Flits may be missing only if the link was re-armed or faulted.
    pub intact: bool,
}

/// Summary of a bridge.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct BridgeReport {
    pub name: String,
    pub status: LinkStatus,
    pub frames_sent: u64,
    pub credit_only_frames: u64,
    pub frames_dropped: u64,
    pub faults: u64,
}

/// Summary of a simulation.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct Report {
    pub core_ticks: u64,
    pub rearms: u64,
    pub channels: Vec<ChannelReport>,
    pub bridges: [BridgeReport; 2],
}

impl Report {
    /// Checks that every delivered stream is intact and no buffer overflowed.
    pub fn verify(&self) -> Result<(), ChipsetError> {
        match self.channels.iter().find(|channel| !channel.intact || channel.max_occupancy > channel.depth) {
            Some(channel) => Err(ChipsetError::Mismatch { direction: channel.direction, channel: channel.channel }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} core cycles, {} re-arms", self.core_ticks, self.rearms)?;
        for bridge in &self.bridges {
            writeln!(
                f,
                "{:>8}: link {:?}, {} frames sent ({} credit-only), {} dropped, {} faults",
                bridge.name,
                bridge.status,
                bridge.frames_sent,
                bridge.credit_only_frames,
                bridge.frames_dropped,
                bridge.faults
            )?;
        }
        writeln!(
            f,
            "{:<14} {:>3} {:>8} {:>10} {:>7} {:>8} {:>9} {:>6}",
            "direction", "ch", "sent", "delivered", "queued", "credits", "max occ", "intact"
        )?;
        let rows = self.channels.iter().map(|channel| {
            format!(
                "{:<14} {:>3} {:>8} {:>10} {:>7} {:>8} {:>5}/{:<3} {:>6}",
                channel.direction.to_string(),
                channel.channel,
                channel.sent,
                channel.delivered,
                channel.queued,
                channel.credits_returned,
                channel.max_occupancy,
                channel.depth,
                channel.intact
            )
        });
        write!(f, "{}", rows.format("\n"))
    }
}
