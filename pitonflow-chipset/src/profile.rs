//! Board profiles and configuration.
//!
//! A configuration starts from a [`BoardProfile`] and may be overridden by a TOML file:
//!
//! ```toml
//! profile = "vc707"
//!
//! [chip]
//! send_credit_threshold = 4
//!
//! [chipset]
//! send_credit_threshold = 4
//!
//! [link]
//! latency = 6
//! ```
//!
//! If the file does not name a profile, the environment variable `PITONFLOW_PROFILE` does.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use paste::paste;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::*;

/// Environment variable selecting the base profile.
pub const PROFILE_ENV: &str = "PITONFLOW_PROFILE";

/// Configuration error.
///
/// Every check here is static: a mismatch between the two ends of a link cannot be detected from the wire protocol.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("channel {channel}: buffer depth should be at least 1")]
    ZeroDepth { channel: ChannelId },
    #[error("send credit threshold {threshold} exceeds buffer depth {depth}")]
    ThresholdExceedsDepth { threshold: usize, depth: usize },
    #[error("channel {channel}: local buffer depth {local} differs from remote buffer depth {remote}")]
    DepthMismatch { channel: ChannelId, local: usize, remote: usize },
    #[error("{channels} channels do not fit in the channel tag")]
    TooManyChannels { channels: usize },
    #[error("{found} buffer depths are given for {expected} channels")]
    ChannelCount { expected: usize, found: usize },
    #[error("crossing FIFO depth {depth} is below the required {required}")]
    CrossingTooShallow { depth: usize, required: usize },
    #[error("crossing FIFO depth {depth} is not a power of two")]
    AsyncFifoNotPowerOfTwo { depth: usize },
    #[error("synchronizers need at least 2 stages, {stages} given")]
    SyncStages { stages: usize },
    #[error("local bridge has {local} synchronizer stages, remote bridge has {remote}")]
    SyncStagesMismatch { local: usize, remote: usize },
    #[error("clock domain `{domain}` has a zero period")]
    ZeroPeriod { domain: String },
    #[error("link latency should be at least 1 link cycle")]
    ZeroLatency,
    #[error("bit error rate {rate} is not a probability")]
    BitErrorRate { rate: f64 },
    #[error("`{field}` should be at least 1 cycle")]
    ZeroCycles { field: &'static str },
    #[error("unknown board profile `{0}`")]
    UnknownProfile(String),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// Board profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoardProfile {
    /// Digilent Genesys 2.
    Genesys2,
    /// Xilinx VC707.
    Vc707,
    /// Xilinx VCU118.
    Vcu118,
    /// Digilent Nexys Video.
    NexysVideo,
    /// Piton test board with the chip in a socket.
    PitonBoard,
}

impl BoardProfile {
    /// All profiles.
    pub const ALL: [BoardProfile; 5] = [
        BoardProfile::Genesys2,
        BoardProfile::Vc707,
        BoardProfile::Vcu118,
        BoardProfile::NexysVideo,
        BoardProfile::PitonBoard,
    ];

    /// Returns the name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            BoardProfile::Genesys2 => "genesys2",
            BoardProfile::Vc707 => "vc707",
            BoardProfile::Vcu118 => "vcu118",
            BoardProfile::NexysVideo => "nexys-video",
            BoardProfile::PitonBoard => "piton-board",
        }
    }

    /// Returns the profile selected by `PITONFLOW_PROFILE`, if any.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(PROFILE_ENV) {
            Ok(name) => {
                let profile = name.parse()?;
                log::info!("Using profile {} from {}", name, PROFILE_ENV);
                Ok(Some(profile))
            }
            Err(_) => Ok(None),
        }
    }
}

impl FromStr for BoardProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.name() == s)
            .ok_or_else(|| ConfigError::UnknownProfile(s.to_string()))
    }
}

/// Configuration of a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Receive buffer depth of each channel.
    pub buffer_depth: Vec<usize>,
    /// `SEND_CREDIT_THRESHOLD`: freed slots accumulated before credit-only frames are sent.
    pub send_credit_threshold: usize,
    /// Depth of each clock-domain crossing FIFO.
    pub crossing_depth: usize,
    /// Synchronizer stages of the clock-domain crossing.
    pub sync_stages: usize,
}

impl BridgeConfig {
    /// Returns the minimum crossing FIFO depth: every frame that may be in flight at once, plus the frames the writer
    /// may not yet see as read.
    ///
    /// At most one data frame per credit and one credit-only frame per credit can be in flight.
    pub fn required_crossing_depth(&self) -> usize {
        2 * self.buffer_depth.iter().sum::<usize>() + self.sync_stages + 1
    }

    /// Checks the configuration of a single bridge.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_depth.len() != NUM_CHANNELS {
            return Err(ConfigError::ChannelCount { expected: NUM_CHANNELS, found: self.buffer_depth.len() });
        }
        for (index, depth) in self.buffer_depth.iter().enumerate() {
            if *depth == 0 {
                return Err(ConfigError::ZeroDepth { channel: ChannelId::from_index(index) });
            }
            if self.send_credit_threshold > *depth {
                return Err(ConfigError::ThresholdExceedsDepth { threshold: self.send_credit_threshold, depth: *depth });
            }
        }
        if self.sync_stages < 2 {
            return Err(ConfigError::SyncStages { stages: self.sync_stages });
        }
        if !self.crossing_depth.is_power_of_two() {
            return Err(ConfigError::AsyncFifoNotPowerOfTwo { depth: self.crossing_depth });
        }
        let required = self.required_crossing_depth();
        if self.crossing_depth < required {
            return Err(ConfigError::CrossingTooShallow { depth: self.crossing_depth, required });
        }
        Ok(())
    }

    /// Checks that a bridge can talk to the remote bridge.
    pub fn validate_pair(&self, remote: &BridgeConfig) -> Result<(), ConfigError> {
        self.validate()?;
        remote.validate()?;
        if self.sync_stages != remote.sync_stages {
            return Err(ConfigError::SyncStagesMismatch { local: self.sync_stages, remote: remote.sync_stages });
        }
        for (index, (local, remote)) in self.buffer_depth.iter().zip(&remote.buffer_depth).enumerate() {
            if local != remote {
                let channel = ChannelId::from_index(index);
                return Err(ConfigError::DepthMismatch { channel, local: *local, remote: *remote });
            }
        }
        Ok(())
    }
}

/// Configuration of the reset sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetConfig {
    /// Whether the external reset pin is active-high.
    pub reset_active_high: bool,
    /// Core cycles both clocks should be locked before leaving `ClockWait`.
    pub debounce_cycles: usize,
    /// Core cycles between releasing two resets.
    pub settle_cycles: usize,
}

impl ResetConfig {
    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_cycles == 0 {
            return Err(ConfigError::ZeroCycles { field: "debounce_cycles" });
        }
        if self.settle_cycles == 0 {
            return Err(ConfigError::ZeroCycles { field: "settle_cycles" });
        }
        Ok(())
    }
}

/// Configuration of the clocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    /// Period of the core clock in picoseconds.
    pub core_period_ps: u64,
    /// Period of the link clock in picoseconds.
    pub link_period_ps: u64,
    /// Offset of the first link clock edge in picoseconds.
    #[serde(default)]
    pub link_phase_ps: u64,
}

impl ClockConfig {
    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (domain, period) in [("core", self.core_period_ps), ("link", self.link_period_ps)] {
            if period == 0 {
                return Err(ConfigError::ZeroPeriod { domain: domain.to_string() });
            }
        }
        Ok(())
    }
}

/// Configuration of the physical link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    /// Latency in link cycles.
    pub latency: usize,
    /// Probability that a bit flips on the wire.
    #[serde(default)]
    pub bit_error_rate: f64,
}

impl LinkConfig {
    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.latency == 0 {
            return Err(ConfigError::ZeroLatency);
        }
        if !(0.0..=1.0).contains(&self.bit_error_rate) {
            return Err(ConfigError::BitErrorRate { rate: self.bit_error_rate });
        }
        Ok(())
    }
}

/// Configuration of the chip, the chipset, and the link between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipsetConfig {
    /// Base profile.
    pub profile: BoardProfile,
    /// Chip-side bridge.
    pub chip: BridgeConfig,
    /// Chipset-side bridge.
    pub chipset: BridgeConfig,
    /// Reset sequencer.
    pub reset: ResetConfig,
    /// Clocks.
    pub clock: ClockConfig,
    /// Physical link, in each direction.
    pub link: LinkConfig,
}

macro_rules! board_profiles {
    ($(
        $profile:ident {
            reset_active_high: $reset_active_high:expr,
            core_period_ps: $core_period_ps:expr,
            link_period_ps: $link_period_ps:expr,
            latency: $latency:expr,
            buffer_depth: $buffer_depth:expr,
            send_credit_threshold: $threshold:expr,
            crossing_depth: $crossing_depth:expr $(,)?
        }
    ),* $(,)?) => {
        paste! {
            impl ChipsetConfig {
                $(
                    #[doc = "Configuration of the `" $profile "` board."]
                    pub fn [<$profile:snake>]() -> Self {
                        let bridge = BridgeConfig {
                            buffer_depth: vec![$buffer_depth; NUM_CHANNELS],
                            send_credit_threshold: $threshold,
                            crossing_depth: $crossing_depth,
                            sync_stages: 2,
                        };
                        Self {
                            profile: BoardProfile::$profile,
                            chip: bridge.clone(),
                            chipset: bridge,
                            reset: ResetConfig {
                                reset_active_high: $reset_active_high,
                                debounce_cycles: 16,
                                settle_cycles: 8,
                            },
                            clock: ClockConfig {
                                core_period_ps: $core_period_ps,
                                link_period_ps: $link_period_ps,
                                link_phase_ps: 0,
                            },
                            link: LinkConfig { latency: $latency, bit_error_rate: 0.0 },
                        }
                    }
                )*
            }

            impl BoardProfile {
                /// Returns the configuration of the board.
                pub fn config(self) -> ChipsetConfig {
                    match self {
                        $(BoardProfile::$profile => ChipsetConfig::[<$profile:snake>](),)*
                    }
                }
            }
        }
    };
}

board_profiles! {
    Genesys2 {
        reset_active_high: false,
        core_period_ps: 10_000,
        link_period_ps: 8_000,
        latency: 4,
        buffer_depth: 8,
        send_credit_threshold: 7,
        crossing_depth: 64,
    },
    Vc707 {
        reset_active_high: true,
        core_period_ps: 10_000,
        link_period_ps: 8_000,
        latency: 4,
        buffer_depth: 8,
        send_credit_threshold: 7,
        crossing_depth: 64,
    },
    Vcu118 {
        reset_active_high: true,
        core_period_ps: 8_000,
        link_period_ps: 6_400,
        latency: 6,
        buffer_depth: 8,
        send_credit_threshold: 7,
        crossing_depth: 64,
    },
    NexysVideo {
        reset_active_high: false,
        core_period_ps: 20_000,
        link_period_ps: 16_000,
        latency: 3,
        buffer_depth: 8,
        send_credit_threshold: 7,
        crossing_depth: 64,
    },
    PitonBoard {
        reset_active_high: false,
        core_period_ps: 5_000,
        link_period_ps: 12_500,
        latency: 8,
        buffer_depth: 4,
        send_credit_threshold: 2,
        crossing_depth: 32,
    },
}

fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        let _ = base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

impl ChipsetConfig {
    /// Loads a configuration, overlaying the TOML file at `path` on its profile.
    ///
    /// The profile is `profile` if given, or else the one named in the file, or else `PITONFLOW_PROFILE`, or else
    /// [`BoardProfile::Genesys2`].
    pub fn load_with(path: Option<&Path>, profile: Option<BoardProfile>) -> Result<Self, ConfigError> {
        let mut overlay = match path {
            Some(path) => {
                let content =
                    fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
                log::info!("Loaded config from {}", path.display());
                toml::from_str::<toml::Table>(&content)?
            }
            None => toml::Table::new(),
        };

        let profile = match (profile, overlay.get("profile")) {
            (Some(profile), _) => profile,
            (None, Some(named)) => named.clone().try_into::<BoardProfile>()?,
            (None, None) => BoardProfile::from_env()?.unwrap_or(BoardProfile::Genesys2),
        };
        overlay.remove("profile");

        let mut value = toml::Value::try_from(profile.config())?;
        merge(&mut value, toml::Value::Table(overlay));
        let config = value.try_into::<ChipsetConfig>()?;
        config.validate()?;
        log::debug!("Configuration: {:?}", config);
        Ok(config)
    }

    /// Loads a configuration without an explicit profile.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> { Self::load_with(path, None) }

    /// Performs every static check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chip.validate_pair(&self.chipset)?;
        self.reset.validate()?;
        self.clock.validate()?;
        self.link.validate()
    }

    /// Sets the send credit threshold of both bridges.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.chip.send_credit_threshold = threshold;
        self.chipset.send_credit_threshold = threshold;
        self
    }

    /// Sets the buffer depth of every channel of both bridges, and the smallest valid crossing FIFO depth.
    pub fn with_buffer_depth(mut self, depth: usize) -> Self {
        for bridge in [&mut self.chip, &mut self.chipset] {
            bridge.buffer_depth = vec![depth; NUM_CHANNELS];
            bridge.send_credit_threshold = bridge.send_credit_threshold.min(depth);
            bridge.crossing_depth = bridge.required_crossing_depth().next_power_of_two();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_valid() {
        for profile in BoardProfile::ALL {
            let config = profile.config();
            assert_eq!(config.profile, profile);
            config.validate().unwrap();
            assert_eq!(profile.name().parse::<BoardProfile>().unwrap(), profile);
        }
        assert_eq!(ChipsetConfig::genesys2().chip.send_credit_threshold, 7);
        assert!(ChipsetConfig::nexys_video().reset.debounce_cycles > 0);
    }

    #[test]
    fn crossing_depth_bound() {
        let config = ChipsetConfig::genesys2().with_buffer_depth(2);
        assert_eq!(config.chip.required_crossing_depth(), 15);
        assert_eq!(config.chip.crossing_depth, 16);
        config.validate().unwrap();

        let mut config = config;
        config.chipset.crossing_depth = 8;
        assert!(matches!(config.validate(), Err(ConfigError::CrossingTooShallow { depth: 8, required: 15 })));
        config.chipset.crossing_depth = 24;
        assert!(matches!(config.validate(), Err(ConfigError::AsyncFifoNotPowerOfTwo { depth: 24 })));
    }

    #[test]
    fn merge_overlays_nested_tables() {
        let mut base = toml::Value::try_from(ChipsetConfig::vc707()).unwrap();
        let overlay: toml::Table = toml::from_str("[link]\nlatency = 9\n").unwrap();
        merge(&mut base, toml::Value::Table(overlay));
        let config: ChipsetConfig = base.try_into().unwrap();
        assert_eq!(config.link.latency, 9);
        assert_eq!(config.clock, ChipsetConfig::vc707().clock);
    }

    #[test]
    fn unknown_profile() { assert!(matches!("zynq".parse::<BoardProfile>(), Err(ConfigError::UnknownProfile(_)))) }
}
