//! Finite state machine (Mealy machine).

use std::fmt;

/// Finite state machine (Mealy machine).
///
/// The FSM is described by [`Fsm::step`], which computes (1) the current-cycle output for all cycles and (2) the
/// next-cycle state. Between two ticks the outputs are a function of the registered state and the current inputs;
/// the state is replaced only at the tick.
pub trait Fsm: fmt::Debug {
    /// Forward signal from the producer.
    type IngressFwd;

    /// Backward signal from the consumer.
    type EgressBwd;

    /// Forward signal to the consumer.
    type EgressFwd;

    /// Backward signal to the producer.
    type IngressBwd;

    /// Registers.
    type State: fmt::Debug + Clone;

    /// Returns the value of registers after reset.
    fn init(&self) -> Self::State;

    /// Computes the current-cycle outputs and the next-cycle state.
    fn step(
        &self, ingress_fwd: &Self::IngressFwd, egress_bwd: &Self::EgressBwd, state: &Self::State,
    ) -> (Self::EgressFwd, Self::IngressBwd, Self::State);
}

/// Clocked instance of an FSM.
#[derive(Debug)]
pub struct Instance<F: Fsm> {
    module_name: String,
    fsm: F,
    state: F::State,
    ticks: u64,
}

impl<F: Fsm> Instance<F> {
    /// Creates a new instance in its reset state.
    pub fn new(module_name: &str, fsm: F) -> Self {
        let state = fsm.init();
        Self { module_name: module_name.to_string(), fsm, state, ticks: 0 }
    }

    /// Returns module name.
    pub fn module_name(&self) -> &str { &self.module_name }

    /// Returns the FSM.
    pub fn fsm(&self) -> &F { &self.fsm }

    /// Returns the registered state.
    pub fn state(&self) -> &F::State { &self.state }

    /// Returns the number of ticks since the last reset.
    pub fn ticks(&self) -> u64 { self.ticks }

    /// Computes the current-cycle outputs without updating registers.
    pub fn comb(&self, ingress_fwd: &F::IngressFwd, egress_bwd: &F::EgressBwd) -> (F::EgressFwd, F::IngressBwd) {
        let (egress_fwd, ingress_bwd, _) = self.fsm.step(ingress_fwd, egress_bwd, &self.state);
        (egress_fwd, ingress_bwd)
    }

    /// Computes the current-cycle outputs and updates registers.
    pub fn tick(&mut self, ingress_fwd: &F::IngressFwd, egress_bwd: &F::EgressBwd) -> (F::EgressFwd, F::IngressBwd) {
        let (egress_fwd, ingress_bwd, state_next) = self.fsm.step(ingress_fwd, egress_bwd, &self.state);
        log::trace!("{}: {:?} -> {:?}", self.module_name, self.state, state_next);
        self.state = state_next;
        self.ticks += 1;
        (egress_fwd, ingress_bwd)
    }

    /// Resets registers.
    pub fn reset(&mut self) {
        self.state = self.fsm.init();
        self.ticks = 0;
    }
}
