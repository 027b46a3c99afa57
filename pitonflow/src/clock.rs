//! Clock domains.

use itertools::Itertools;
use thiserror::Error;

/// Clock configuration error.
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("clock domain `{name}` has a zero period")]
    ZeroPeriod { name: String },
    #[error("no clock domains are registered")]
    NoDomains,
}

/// Identifier of a clock domain in a [`ClockScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(usize);

/// Clock domain.
#[derive(Debug, Clone)]
pub struct ClockDomain {
    name: String,
    period_ps: u64,
    phase_ps: u64,
    next_edge_ps: u64,
    ticks: u64,
}

impl ClockDomain {
    /// Returns the name.
    pub fn name(&self) -> &str { &self.name }

    /// Returns the period in picoseconds.
    pub fn period_ps(&self) -> u64 { self.period_ps }

    /// Returns the offset of the first rising edge in picoseconds.
    pub fn phase_ps(&self) -> u64 { self.phase_ps }

    /// Returns the number of rising edges so far.
    pub fn ticks(&self) -> u64 { self.ticks }
}

/// Rising edge of a clock domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Clock domain.
    pub domain: DomainId,
    /// Time of the edge in picoseconds.
    pub time_ps: u64,
    /// Index of the edge in its domain, starting from 0.
    pub tick: u64,
}

/// Interleaves rising edges of independently clocked domains.
///
/// Edges are produced in time order. Edges of different domains at the same time are produced in registration
/// order, so a simulation is fully deterministic.
#[derive(Debug, Default)]
pub struct ClockScheduler {
    domains: Vec<ClockDomain>,
    now_ps: u64,
}

impl ClockScheduler {
    /// Registers a clock domain.
    pub fn add(&mut self, name: &str, period_ps: u64, phase_ps: u64) -> Result<DomainId, ClockError> {
        if period_ps == 0 {
            return Err(ClockError::ZeroPeriod { name: name.to_string() });
        }
        self.domains.push(ClockDomain {
            name: name.to_string(),
            period_ps,
            phase_ps,
            next_edge_ps: self.now_ps + phase_ps,
            ticks: 0,
        });
        Ok(DomainId(self.domains.len() - 1))
    }

    /// Returns the clock domain.
    pub fn domain(&self, id: DomainId) -> &ClockDomain { &self.domains[id.0] }

    /// Returns the time of the last produced edge in picoseconds.
    pub fn now_ps(&self) -> u64 { self.now_ps }

    /// Advances to the next rising edge.
    pub fn next_edge(&mut self) -> Result<Edge, ClockError> {
        let index = self.domains.iter().position_min_by_key(|domain| domain.next_edge_ps).ok_or(ClockError::NoDomains)?;
        let domain = &mut self.domains[index];

        let edge = Edge { domain: DomainId(index), time_ps: domain.next_edge_ps, tick: domain.ticks };
        domain.next_edge_ps += domain.period_ps;
        domain.ticks += 1;
        self.now_ps = edge.time_ps;

        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_by_period() {
        let mut clocks = ClockScheduler::default();
        let fast = clocks.add("fast", 2, 0).unwrap();
        let slow = clocks.add("slow", 3, 0).unwrap();

        let order = (0..7).map(|_| clocks.next_edge().unwrap()).map(|edge| (edge.domain, edge.time_ps)).collect_vec();
        assert_eq!(order, vec![(fast, 0), (slow, 0), (fast, 2), (slow, 3), (fast, 4), (fast, 6), (slow, 6)]);
        assert_eq!(clocks.domain(fast).ticks(), 4);
        assert_eq!(clocks.domain(slow).ticks(), 3);
    }

    #[test]
    fn phase_offset() {
        let mut clocks = ClockScheduler::default();
        let a = clocks.add("a", 10, 5).unwrap();
        let b = clocks.add("b", 10, 0).unwrap();
        assert_eq!(clocks.next_edge().unwrap().domain, b);
        assert_eq!(clocks.next_edge().unwrap().domain, a);
    }

    #[test]
    fn errors() {
        let mut clocks = ClockScheduler::default();
        assert_eq!(clocks.next_edge(), Err(ClockError::NoDomains));
        assert!(matches!(clocks.add("zero", 0, 0), Err(ClockError::ZeroPeriod { .. })));
    }
}
