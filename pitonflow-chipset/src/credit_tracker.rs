//! Per-channel credit accounting of a bridge.

use arrayvec::ArrayVec;
use pitonflow::*;
use pitonflow_std::*;

use crate::*;

#[derive(Debug, Clone)]
struct ChannelCredit {
    /// Local view of the free slots of the remote receive buffer.
    remote: CreditCounter,
    /// Local receive slots freed but not yet returned.
    pending: usize,
    /// Depth of the local receive buffer.
    local_depth: usize,
    draining: bool,
}

/// Credit tracker.
///
/// A credit is consumed when a flit is admitted into the staging buffer, and restored when the remote bridge returns
/// it. Freed local receive slots are accumulated in `pending` and returned to the remote bridge:
///
/// - every data frame carries a return bit for each channel with `pending > 0`;
/// - a channel starts draining once `pending` reaches the threshold, and stops when it reaches zero. While any
///   channel is draining, the bridge emits credit-only frames when it has no data to send.
#[derive(Debug, Clone)]
pub struct CreditTracker<const N: usize> {
    channels: [ChannelCredit; N],
    threshold: usize,
}

impl<const N: usize> CreditTracker<N> {
    /// Creates a new tracker.
    ///
    /// `remote_depths` and `local_depths` are the receive-buffer depths of the remote and local bridges.
    pub fn new(local_depths: &[usize], remote_depths: &[usize], threshold: usize) -> Result<Self, ConfigError> {
        if N >= 1 << CHANNEL_TAG_WIDTH {
            return Err(ConfigError::TooManyChannels { channels: N });
        }
        for depths in [local_depths, remote_depths] {
            if depths.len() != N {
                return Err(ConfigError::ChannelCount { expected: N, found: depths.len() });
            }
        }
        for (index, (local, remote)) in local_depths.iter().zip(remote_depths).enumerate() {
            let channel = ChannelId::from_index(index);
            if *local == 0 || *remote == 0 {
                return Err(ConfigError::ZeroDepth { channel });
            }
            if local != remote {
                return Err(ConfigError::DepthMismatch { channel, local: *local, remote: *remote });
            }
            if threshold > *local {
                return Err(ConfigError::ThresholdExceedsDepth { threshold, depth: *local });
            }
        }

        let channels = local_depths
            .iter()
            .zip(remote_depths)
            .map(|(local, remote)| ChannelCredit {
                remote: CreditCounter::new(*remote),
                pending: 0,
                local_depth: *local,
                draining: false,
            })
            .collect::<ArrayVec<_, N>>();
        let channels = ok_or!(channels.into_inner(), unreachable!());
        Ok(Self { channels, threshold })
    }

    /// Returns the credit-return threshold.
    pub fn threshold(&self) -> usize { self.threshold }

    /// Returns the number of credits available for sending on the channel.
    pub fn credits_available(&self, channel: usize) -> usize { self.channels[channel].remote.available() }

    /// Returns the number of credits consumed and not yet returned on the channel.
    pub fn credits_outstanding(&self, channel: usize) -> usize { self.channels[channel].remote.outstanding() }

    /// Returns the number of freed local slots not yet returned on the channel.
    pub fn pending(&self, channel: usize) -> usize { self.channels[channel].pending }

    /// Returns whether the channel is draining its pending returns.
    pub fn is_draining(&self, channel: usize) -> bool { self.channels[channel].draining }

    /// Consumes a credit for sending on the channel.
    pub fn consume(&mut self, channel: usize) { self.channels[channel].remote.consume() }

    /// Restores a credit returned by the remote bridge.
    pub fn credit_returned(&mut self, channel: usize) { self.channels[channel].remote.restore() }

    /// Records a freed local receive slot.
    pub fn slot_freed(&mut self, channel: usize) {
        let threshold = self.threshold;
        let state = &mut self.channels[channel];
        state.pending += 1;
        assert!(
            state.pending <= state.local_depth,
            "channel {}: {} pending credits exceed depth {}",
            channel,
            state.pending,
            state.local_depth
        );
        if state.pending >= threshold {
            if !state.draining {
                log::debug!("channel {}: draining {} pending credits", channel, state.pending);
            }
            state.draining = true;
        }
    }

    /// Returns the credit-return bits of the next frame.
    pub fn returns(&self) -> [bool; N] {
        let mut bits = [false; N];
        for (bit, state) in bits.iter_mut().zip(&self.channels) {
            *bit = state.pending > 0;
        }
        bits
    }

    /// Returns whether a credit-only frame should be sent when there is no data.
    pub fn needs_credit_frame(&self) -> bool { self.channels.iter().any(|state| state.draining) }

    /// Records the credit returns sent in a frame.
    pub fn returns_sent(&mut self, bits: &[bool; N]) {
        for (state, bit) in self.channels.iter_mut().zip(bits) {
            if *bit {
                assert!(state.pending > 0, "returning a credit that is not pending");
                state.pending -= 1;
                if state.pending == 0 {
                    state.draining = false;
                }
            }
        }
    }

    /// Returns every outstanding credit and drops every pending return.
    pub fn reset(&mut self) {
        for state in &mut self.channels {
            state.remote.reset();
            state.pending = 0;
            state.draining = false;
        }
    }
}
