//! Chip bring-up reset sequencer.

use pitonflow::*;
use pitonflow_std::*;

use crate::*;

/// Stages of the reset release sequence, in release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStage {
    /// PLL reset released.
    Pll,
    /// PLL and chip resets released.
    Chip,
    /// All resets released.
    Jtag,
}

/// State of the reset sequencer.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    PoweredOff,
    /// Waiting for both clocks to stay locked for the debounce window.
    ClockWait {
        /// Consecutive cycles both clocks have been locked.
        stable: usize,
    },
    /// Waiting for the external reset to be released.
    ResetHold,
    /// Releasing the resets one by one.
    ResetReleaseSequence {
        stage: ReleaseStage,
        /// Cycles spent in the stage.
        settle: usize,
    },
    Ready,
}

/// Encoding of the reset state, for observation.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Signal)]
pub enum ResetPhase {
    PoweredOff,
    ClockWait,
    ResetHold,
    ResetReleaseSequence,
    Ready,
}

impl ResetState {
    /// Returns the phase.
    pub fn phase(&self) -> ResetPhase {
        match self {
            ResetState::PoweredOff => ResetPhase::PoweredOff,
            ResetState::ClockWait { .. } => ResetPhase::ClockWait,
            ResetState::ResetHold => ResetPhase::ResetHold,
            ResetState::ResetReleaseSequence { .. } => ResetPhase::ResetReleaseSequence,
            ResetState::Ready => ResetPhase::Ready,
        }
    }

    /// Returns the outputs in the state.
    pub fn outputs(&self) -> ResetOutputs {
        let released = match self {
            ResetState::PoweredOff | ResetState::ClockWait { .. } | ResetState::ResetHold => 0,
            ResetState::ResetReleaseSequence { stage: ReleaseStage::Pll, .. } => 1,
            ResetState::ResetReleaseSequence { stage: ReleaseStage::Chip, .. } => 2,
            ResetState::ResetReleaseSequence { stage: ReleaseStage::Jtag, .. } | ResetState::Ready => 3,
        };
        let ready = matches!(self, ResetState::Ready);
        ResetOutputs {
            pll_rst_n: released >= 1,
            chip_rst_n: released >= 2,
            jtag_rst_n: released >= 3,
            ready,
            rst_seq_complete_n: !ready,
        }
    }
}

/// Inputs of the reset sequencer, after synchronization and polarity correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetInputs {
    /// Reference clock is locked.
    pub ref_clk_locked: bool,
    /// Chip clock is locked.
    pub chip_clk_locked: bool,
    /// External reset is asserted.
    pub reset: bool,
}

/// Raw asynchronous inputs of the reset sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawResetInputs {
    /// Reference clock lock indicator.
    pub ref_clk_locked: bool,
    /// Chip clock lock indicator.
    pub chip_clk_locked: bool,
    /// Level of the external reset pin.
    pub reset_pin: bool,
}

/// Outputs of the reset sequencer. Resets are active-low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Signal)]
pub struct ResetOutputs {
    /// PLL reset.
    pub pll_rst_n: bool,
    /// Chip reset.
    pub chip_rst_n: bool,
    /// JTAG reset.
    pub jtag_rst_n: bool,
    /// Gate of the bridge.
    pub ready: bool,
    /// Reset sequence complete, active-low.
    pub rst_seq_complete_n: bool,
}

/// Reset sequencer FSM.
#[derive(Debug, Clone)]
pub struct ResetFsm {
    debounce_cycles: usize,
    settle_cycles: usize,
}

impl ResetFsm {
    /// Creates a new FSM.
    pub fn new(config: &ResetConfig) -> Self {
        Self { debounce_cycles: config.debounce_cycles, settle_cycles: config.settle_cycles }
    }
}

impl Fsm for ResetFsm {
    type EgressBwd = ();
    type EgressFwd = ResetOutputs;
    type IngressBwd = ();
    type IngressFwd = ResetInputs;
    type State = ResetState;

    fn init(&self) -> ResetState { ResetState::PoweredOff }

    fn step(&self, input: &ResetInputs, _: &(), state: &ResetState) -> (ResetOutputs, (), ResetState) {
        let locked = input.ref_clk_locked && input.chip_clk_locked;
        let rearm = ResetState::ClockWait { stable: 0 };

        let state_next = match *state {
            ResetState::PoweredOff => rearm,
            ResetState::ClockWait { stable } => {
                if !locked {
                    rearm
                } else if stable + 1 >= self.debounce_cycles {
                    ResetState::ResetHold
                } else {
                    ResetState::ClockWait { stable: stable + 1 }
                }
            }
            _ if !locked => rearm,
            ResetState::ResetHold => {
                if input.reset {
                    ResetState::ResetHold
                } else {
                    ResetState::ResetReleaseSequence { stage: ReleaseStage::Pll, settle: 0 }
                }
            }
            _ if input.reset => rearm,
            ResetState::ResetReleaseSequence { stage, settle } => {
                if settle + 1 < self.settle_cycles {
                    ResetState::ResetReleaseSequence { stage, settle: settle + 1 }
                } else {
                    match stage {
                        ReleaseStage::Pll => ResetState::ResetReleaseSequence { stage: ReleaseStage::Chip, settle: 0 },
                        ReleaseStage::Chip => ResetState::ResetReleaseSequence { stage: ReleaseStage::Jtag, settle: 0 },
                        ReleaseStage::Jtag => ResetState::Ready,
                    }
                }
            }
            ResetState::Ready => ResetState::Ready,
        };

        (state.outputs(), (), state_next)
    }
}

/// Reset sequencer.
///
/// Runs in the core clock domain. Its three inputs are asynchronous, so each goes through a 2-flop synchronizer
/// before reaching the FSM.
#[derive(Debug)]
pub struct ResetSequencer {
    reset_active_high: bool,
    ref_clk_locked: Synchronizer<bool>,
    chip_clk_locked: Synchronizer<bool>,
    reset: Synchronizer<bool>,
    fsm: Instance<ResetFsm>,
}

impl ResetSequencer {
    /// Number of synchronizer stages of each input.
    pub const SYNC_STAGES: usize = 2;

    /// Creates a new sequencer in `PoweredOff`.
    pub fn new(config: &ResetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            reset_active_high: config.reset_active_high,
            ref_clk_locked: Synchronizer::new(Self::SYNC_STAGES, false),
            chip_clk_locked: Synchronizer::new(Self::SYNC_STAGES, false),
            reset: Synchronizer::new(Self::SYNC_STAGES, true),
            fsm: Instance::new("reset_seq", ResetFsm::new(config)),
        })
    }

    /// Returns the pin level that asserts the external reset.
    pub fn reset_level(&self, asserted: bool) -> bool { asserted == self.reset_active_high }

    /// Returns the state.
    pub fn state(&self) -> ResetState { *self.fsm.state() }

    /// Returns the phase.
    pub fn phase(&self) -> ResetPhase { self.fsm.state().phase() }

    /// Returns the outputs.
    pub fn outputs(&self) -> ResetOutputs { self.fsm.state().outputs() }

    /// Returns whether the bridge may carry traffic.
    pub fn ready(&self) -> bool { self.outputs().ready }

    /// Advances one core cycle and returns the outputs after it.
    pub fn tick(&mut self, raw: RawResetInputs) -> ResetOutputs {
        let input = ResetInputs {
            ref_clk_locked: *self.ref_clk_locked.output(),
            chip_clk_locked: *self.chip_clk_locked.output(),
            reset: *self.reset.output(),
        };
        let state = self.state();
        let _ = self.fsm.tick(&input, &());
        let state_next = self.state();

        if state.phase() != state_next.phase() {
            if state_next.phase() == ResetPhase::ClockWait && state.phase() != ResetPhase::PoweredOff {
                if !(input.ref_clk_locked && input.chip_clk_locked) {
                    log::warn!("reset_seq: clock lock lost in {:?}", state.phase());
                } else {
                    log::info!("reset_seq: external reset asserted in {:?}", state.phase());
                }
            }
            log::info!("reset_seq: {:?} -> {:?}", state.phase(), state_next.phase());
        }

        let _ = self.ref_clk_locked.tick(raw.ref_clk_locked);
        let _ = self.chip_clk_locked.tick(raw.chip_clk_locked);
        let _ = self.reset.tick(raw.reset_pin == self.reset_active_high);
        self.outputs()
    }
}
