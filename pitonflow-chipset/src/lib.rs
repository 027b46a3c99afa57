//! Credit-based bridge between the on-chip network and the off-chip link, and the chip bring-up reset sequencer.
//!
//! The chip side of a [`Bridge`] speaks the valid-ready protocol on [`NUM_CHANNELS`] virtual channels. The link side
//! carries [`LinkFrame`]s: one flit tagged with its channel, plus one credit-return bit per channel. The
//! [`ResetSequencer`] gates the bridge: no frame crosses the link until it is ready.

// # Tries to deny all lints (`rustc -W help`).
#![deny(absolute_paths_not_starting_with_crate)]
#![deny(anonymous_parameters)]
#![deny(deprecated_in_future)]
#![deny(explicit_outlives_requirements)]
#![deny(keyword_idents)]
#![deny(macro_use_extern_crate)]
#![deny(missing_debug_implementations)]
#![deny(non_ascii_idents)]
#![deny(rust_2018_idioms)]
#![deny(trivial_numeric_casts)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]
//
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::invalid_rust_codeblocks)]
#![deny(rustdoc::bare_urls)]
//
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::type_complexity)]
#![allow(elided_lifetimes_in_paths)]

use pitonflow::*;
use static_assertions::*;
use thiserror::Error;

pub mod bridge;
pub mod credit_tracker;
pub mod link;
pub mod profile;
pub mod reset_seq;
pub mod sim;

pub use bridge::{Bridge, ChannelStats, CoreEgress, InFlight, LinkStats, LinkStatus};
pub use credit_tracker::CreditTracker;
pub use link::{ChannelId, LinkFault, LinkFrame, PhysLink};
pub use profile::{
    BoardProfile, BridgeConfig, ChipsetConfig, ClockConfig, ConfigError, LinkConfig, ResetConfig, PROFILE_ENV,
};
pub use reset_seq::{
    RawResetInputs, ReleaseStage, ResetFsm, ResetInputs, ResetOutputs, ResetPhase, ResetSequencer, ResetState,
};
pub use sim::{BridgeReport, ChannelReport, ConsumerMode, CreditLedger, Direction, Report, System, TraceEntry};

/// Width of a NoC flit in bits.
pub const NOC_DATA_WIDTH: usize = 64;

/// Width of the channel tag of a link frame in bits.
pub const CHANNEL_TAG_WIDTH: usize = 2;

/// Width of the checksum of a link frame in bits.
pub const CHECK_WIDTH: usize = 8;

/// Number of virtual channels.
pub const NUM_CHANNELS: usize = 3;

/// NoC flit.
pub type Flit = Bits<NOC_DATA_WIDTH>;

/// Width of a serialized link frame in bits.
pub const FRAME_WIDTH: usize = <LinkFrame<Flit, NUM_CHANNELS> as Signal>::WIDTH;

// Tag 0 marks a frame without data.
const_assert!(NUM_CHANNELS < 1 << CHANNEL_TAG_WIDTH);
const_assert!(NOC_DATA_WIDTH <= 64);
const_assert_eq!(FRAME_WIDTH, (NOC_DATA_WIDTH + 1) + CHANNEL_TAG_WIDTH + NUM_CHANNELS + CHECK_WIDTH);

/// Error of the chipset simulator.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ChipsetError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{direction} channel {channel}: delivered stream is not intact")]
    Mismatch { direction: Direction, channel: ChannelId },
}
