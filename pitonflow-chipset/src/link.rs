//! Link frames and the physical link.

use std::collections::VecDeque;
use std::fmt;

use crc::{Crc, CRC_8_AUTOSAR};
use pitonflow::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::*;

/// Virtual channel identifier.
///
/// On the wire channels are numbered from 1, and tag 0 marks a frame without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Creates a channel identifier from its wire tag, `1..=NUM_CHANNELS`.
    pub fn new(tag: u8) -> Option<Self> { (1..=NUM_CHANNELS).contains(&usize::from(tag)).then_some(Self(tag)) }

    /// Creates a channel identifier from its array index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= NUM_CHANNELS`.
    pub fn from_index(index: usize) -> Self {
        assert!(index < NUM_CHANNELS, "channel index {} out of range", index);
        Self(index as u8 + 1)
    }

    /// Returns the wire tag.
    pub fn tag(self) -> u8 { self.0 }

    /// Returns the array index.
    pub fn index(self) -> usize { usize::from(self.0) - 1 }

    /// Iterates over all channels.
    pub fn all() -> impl Iterator<Item = Self> + Clone { (0..NUM_CHANNELS).map(Self::from_index) }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Link fault, detected on a received frame.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkFault {
    #[error("checksum mismatch in the frame received at link tick {tick}")]
    Checksum { tick: u64 },
    #[error("frame carries invalid channel tag {tag}")]
    BadChannel { tag: u64 },
    #[error("frame has {found} bits, expected {expected}")]
    Width { expected: usize, found: usize },
}

/// CRC-8 over the serialized frame without its check field.
///
/// The polynomial (0x2F) detects every error of up to 3 flipped bits in frames of up to 119 payload bits.
const CHECKSUM: Crc<u8> = Crc::<u8>::new(&CRC_8_AUTOSAR);

fn checksum(payload: &[bool]) -> u64 { u64::from(CHECKSUM.checksum(&bitvec_to_bytes(payload))) }

/// Link frame.
///
/// Data validity and credit returns are tagged independently: a frame may carry a flit, credit returns, or both.
/// `channel` is the wire tag of the flit's channel, or 0 if there is no flit. `check` is the CRC-8 of the bits
/// serialized before it.
#[derive(Debug, Clone, PartialEq, Eq, Signal)]
pub struct LinkFrame<V: Signal, const N: usize> {
    /// Flit.
    pub data: Valid<V>,
    /// Channel tag.
    pub channel: Bits<CHANNEL_TAG_WIDTH>,
    /// One credit-return bit per channel.
    pub credit_back: [bool; N],
    /// Checksum.
    pub check: Bits<CHECK_WIDTH>,
}

impl<V: Signal + Default, const N: usize> LinkFrame<V, N> {
    /// Creates a new frame.
    pub fn new(data: Option<(ChannelId, V)>, credit_back: [bool; N]) -> Self {
        let (data, channel) = match data {
            Some((channel, inner)) => (Valid::valid(inner), Bits::new(u64::from(channel.tag()))),
            None => (Valid::invalid(), Bits::new(0)),
        };
        Self { data, channel, credit_back, check: Bits::new(0) }.seal()
    }

    /// Recomputes the check field.
    pub fn seal(mut self) -> Self {
        let bits = self.clone().transl();
        self.check = Bits::new(checksum(&bits[..Self::WIDTH - CHECK_WIDTH]));
        self
    }

    /// Returns the flit with its channel.
    pub fn flit(&self) -> Option<(ChannelId, &V)> {
        let channel = ChannelId::new(u8::try_from(self.channel.value()).ok()?)?;
        self.data.as_option().map(|inner| (channel, inner))
    }

    /// Returns whether the frame returns a credit for the channel.
    pub fn returns_credit(&self, channel: ChannelId) -> bool { self.credit_back[channel.index()] }

    /// Returns whether the frame carries neither a flit nor a credit return.
    pub fn is_idle(&self) -> bool { !self.data.valid && !self.credit_back.iter().any(|bit| *bit) }

    /// Decodes a received frame, checking its checksum and channel tag.
    pub fn decode(bits: &[bool], tick: u64) -> Result<Self, LinkFault> {
        if bits.len() != Self::WIDTH {
            return Err(LinkFault::Width { expected: Self::WIDTH, found: bits.len() });
        }
        let (payload, check) = bits.split_at(Self::WIDTH - CHECK_WIDTH);
        if bitvec_to_u64(check) != Some(checksum(payload)) {
            return Err(LinkFault::Checksum { tick });
        }
        let frame =
            some_or!(Self::from_bits(bits), return Err(LinkFault::Width { expected: Self::WIDTH, found: bits.len() }));

        let tag = frame.channel.value();
        let tag_ok = if frame.data.valid { (1..=N as u64).contains(&tag) } else { tag == 0 };
        if !tag_ok {
            return Err(LinkFault::BadChannel { tag });
        }
        Ok(frame)
    }
}

/// Physical link in one direction.
///
/// A frame transmitted in a link tick is received `latency` link ticks later. Each bit flips independently with
/// probability `bit_error_rate`.
#[derive(Debug)]
pub struct PhysLink {
    pipeline: VecDeque<Option<Vec<bool>>>,
    bit_error_rate: f64,
    rng: StdRng,
    corrupt_next: Option<usize>,
    frames: u64,
    bit_errors: u64,
}

impl PhysLink {
    /// Creates a new link.
    pub fn new(config: &LinkConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pipeline: (0..config.latency).map(|_| None).collect(),
            bit_error_rate: config.bit_error_rate,
            rng: StdRng::seed_from_u64(seed),
            corrupt_next: None,
            frames: 0,
            bit_errors: 0,
        })
    }

    /// Returns the latency in link ticks.
    pub fn latency(&self) -> usize { self.pipeline.len() }

    /// Returns the number of transmitted frames.
    pub fn frames(&self) -> u64 { self.frames }

    /// Returns the number of flipped bits.
    pub fn bit_errors(&self) -> u64 { self.bit_errors }

    /// Receives the frame arriving in this link tick.
    ///
    /// Should be followed by [`PhysLink::transmit`] in the same link tick.
    pub fn receive(&mut self) -> Option<Vec<bool>> { self.pipeline.pop_front().flatten() }

    /// Transmits a frame in this link tick.
    pub fn transmit(&mut self, frame: Option<Vec<bool>>) {
        let frame = frame.map(|mut bits| {
            self.frames += 1;
            if let Some(index) = self.corrupt_next.take() {
                let index = index % bits.len();
                bits[index] = !bits[index];
                self.bit_errors += 1;
            }
            if self.bit_error_rate > 0.0 {
                for bit in bits.iter_mut() {
                    if self.rng.gen_bool(self.bit_error_rate) {
                        *bit = !*bit;
                        self.bit_errors += 1;
                    }
                }
            }
            bits
        });
        self.pipeline.push_back(frame);
    }

    /// Flips the given bit of the next transmitted frame.
    pub fn corrupt_next(&mut self, bit: usize) { self.corrupt_next = Some(bit) }

    /// Iterates over the frames on the wire.
    pub fn in_flight(&self) -> impl Iterator<Item = &[bool]> + '_ { self.pipeline.iter().flatten().map(Vec::as_slice) }

    /// Drops every frame on the wire.
    pub fn flush(&mut self) { self.pipeline.iter_mut().for_each(|frame| *frame = None) }
}
