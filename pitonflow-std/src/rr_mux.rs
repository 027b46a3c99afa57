//! Round-robin arbiter.

use pitonflow::*;

/// Round-robin arbiter among `N` requesters.
///
/// The search starts one past the last granted requester, so the requester served last has the lowest priority.
/// The grant is committed only if the egress accepts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RrArbiter<const N: usize>;

impl<const N: usize> Fsm for RrArbiter<N> {
    /// Whether the grant is accepted.
    type EgressBwd = bool;
    /// Granted requester.
    type EgressFwd = Option<usize>;
    type IngressBwd = ();
    /// Requests.
    type IngressFwd = [bool; N];
    /// Last granted requester.
    type State = usize;

    fn init(&self) -> usize { N - 1 }

    fn step(&self, requests: &[bool; N], accept: &bool, last: &usize) -> (Option<usize>, (), usize) {
        let grant = (1..=N).map(|offset| (last + offset) % N).find(|index| requests[*index]);
        let last_next = match grant {
            Some(index) if *accept => index,
            _ => *last,
        };
        (grant, (), last_next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_window_covers_all_requesters() {
        let mut arbiter = Instance::new("rr_arbiter", RrArbiter::<3>);
        let grants = (0..9).map(|_| arbiter.tick(&[true; 3], &true).0.unwrap()).collect::<Vec<_>>();
        for window in grants.windows(3) {
            let mut window = window.to_vec();
            window.sort_unstable();
            assert_eq!(window, vec![0, 1, 2]);
        }
    }

    #[test]
    fn last_served_has_lowest_priority() {
        let mut arbiter = Instance::new("rr_arbiter", RrArbiter::<3>);
        assert_eq!(arbiter.tick(&[false, true, true], &true).0, Some(1));
        assert_eq!(arbiter.tick(&[true, true, false], &true).0, Some(0));
        assert_eq!(arbiter.tick(&[true, true, false], &false).0, Some(1));
        assert_eq!(arbiter.tick(&[true, true, false], &true).0, Some(1));
        assert_eq!(arbiter.tick(&[false; 3], &true).0, None);
    }
}
