//! Pool configuration types
//!
//! ```toml
//! [rewards]
//! duration = 604800
//! new_reward_ratio = 830
//!
//! [lock]
//! min_duration = 86400
//! max_duration = 94608000
//! max_multiplier_bps = 30000
//!
//! [checkpoint]
//! harvest_cooldown = 3600
//!
//! [curve]
//! amplifier_bps = 20000
//! decay_rate = 999000000000000000
//!
//! [logging]
//! level = "info"
//! ```

use crate::accumulator::{NEW_REWARD_RATIO, RATIO_BASE};
use crate::curve::{RewardCurve, DERIVATION_HORIZON_DAYS};
use crate::lock::LockSchedule;
use crate::MAX_REWARD_TOKENS;
use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::math::{self, ONE};
use stakeflow_core::types::SECONDS_PER_DAY;
use std::path::Path;

/// Basis-point denominator for multipliers in config files
pub const BPS: u128 = 10_000;

/// Complete pool configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Reward stream settings
    #[serde(default)]
    pub rewards: RewardsConfig,

    /// Lock bounds and multiplier ramp
    #[serde(default)]
    pub lock: LockConfig,

    /// Harvest behaviour of checkpointed pools
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Derived-token curve, if any
    #[serde(default)]
    pub curve: Option<CurveConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PoolConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| StakeflowError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| {
            StakeflowError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&input)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StakeflowError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.rewards.validate()?;
        self.lock.schedule()?;
        if let Some(curve) = &self.curve {
            curve.curve()?;
        }
        Ok(())
    }
}

/// Reward stream settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Period length in seconds
    #[serde(default = "default_duration")]
    pub duration: u64,

    /// Queued-ratio threshold in per mille
    #[serde(default = "default_new_reward_ratio")]
    pub new_reward_ratio: u64,

    /// Maximum number of reward tokens per pool
    #[serde(default = "default_max_reward_tokens")]
    pub max_reward_tokens: usize,
}

fn default_duration() -> u64 {
    7 * SECONDS_PER_DAY
}

fn default_new_reward_ratio() -> u64 {
    NEW_REWARD_RATIO as u64
}

fn default_max_reward_tokens() -> usize {
    MAX_REWARD_TOKENS
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            new_reward_ratio: default_new_reward_ratio(),
            max_reward_tokens: default_max_reward_tokens(),
        }
    }
}

impl RewardsConfig {
    fn validate(&self) -> Result<()> {
        if self.duration == 0 {
            return Err(StakeflowError::InvalidConfig("rewards.duration must be non-zero".into()));
        }
        if self.new_reward_ratio == 0 || self.new_reward_ratio as u128 > RATIO_BASE {
            return Err(StakeflowError::InvalidConfig(format!(
                "rewards.new_reward_ratio must be in 1..={}",
                RATIO_BASE
            )));
        }
        if self.max_reward_tokens == 0 || self.max_reward_tokens > MAX_REWARD_TOKENS {
            return Err(StakeflowError::InvalidConfig(format!(
                "rewards.max_reward_tokens must be in 1..={}",
                MAX_REWARD_TOKENS
            )));
        }
        Ok(())
    }
}

/// Lock bounds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Shortest lock in seconds
    #[serde(default = "default_min_lock")]
    pub min_duration: u64,

    /// Lock earning the full multiplier, in seconds
    #[serde(default = "default_max_lock")]
    pub max_duration: u64,

    /// Multiplier at the full lock, in basis points (10000 = 1x)
    #[serde(default = "default_max_multiplier_bps")]
    pub max_multiplier_bps: u32,
}

fn default_min_lock() -> u64 {
    SECONDS_PER_DAY
}

fn default_max_lock() -> u64 {
    3 * 365 * SECONDS_PER_DAY
}

fn default_max_multiplier_bps() -> u32 {
    30_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            min_duration: default_min_lock(),
            max_duration: default_max_lock(),
            max_multiplier_bps: default_max_multiplier_bps(),
        }
    }
}

impl LockConfig {
    pub fn schedule(&self) -> Result<LockSchedule> {
        let max_multiplier = math::mul_div(self.max_multiplier_bps as u128, ONE, BPS)?;
        LockSchedule::new(self.min_duration, self.max_duration, max_multiplier)
    }
}

/// Checkpointed pool settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Minimum seconds between harvests
    #[serde(default = "default_harvest_cooldown")]
    pub harvest_cooldown: u64,
}

fn default_harvest_cooldown() -> u64 {
    3_600
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            harvest_cooldown: default_harvest_cooldown(),
        }
    }
}

/// Derived-token curve parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveConfig {
    /// Day-one multiplier in basis points (10000 = 1x)
    pub amplifier_bps: u32,
    /// Per-day decay scaled by 1e18; always below 1e18
    pub decay_rate: u64,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u64,
}

fn default_horizon_days() -> u64 {
    DERIVATION_HORIZON_DAYS
}

impl CurveConfig {
    pub fn curve(&self) -> Result<RewardCurve> {
        let amplifier = math::mul_div(self.amplifier_bps as u128, ONE, BPS)?;
        RewardCurve::with_horizon(amplifier, self.decay_rate as u128, self.horizon_days)
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
