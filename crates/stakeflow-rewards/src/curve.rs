//! Derived-token emission curve
//!
//! A derived token is paid on top of one base reward: each unit of base
//! reward claimed yields `amplifier * decay_rate^days` derived units, where
//! `days` counts whole days since the curve's genesis, starting at 1.

use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::math::{self, ONE};
use stakeflow_core::types::{Amount, Fixed, SECONDS_PER_DAY, Timestamp, TokenId};

/// Days after which the curve stops emitting
pub const DERIVATION_HORIZON_DAYS: u64 = 1_825;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCurve {
    /// Scale applied to the base amount, 1e18 = 1x
    pub amplifier: Fixed,
    /// Per-day decay factor, strictly below 1x
    pub decay_rate: Fixed,
    /// Last day on which anything is emitted
    pub horizon_days: u64,
}

impl RewardCurve {
    pub fn new(amplifier: Fixed, decay_rate: Fixed) -> Result<Self> {
        Self::with_horizon(amplifier, decay_rate, DERIVATION_HORIZON_DAYS)
    }

    pub fn with_horizon(amplifier: Fixed, decay_rate: Fixed, horizon_days: u64) -> Result<Self> {
        if decay_rate >= ONE {
            return Err(StakeflowError::InvalidConfig(format!(
                "decay rate {} must be below {}",
                decay_rate, ONE
            )));
        }
        if amplifier == 0 {
            return Err(StakeflowError::InvalidConfig("amplifier must be non-zero".into()));
        }
        Ok(Self {
            amplifier,
            decay_rate,
            horizon_days,
        })
    }

    /// Day index for `elapsed` seconds since genesis; day one starts at zero
    pub fn day(elapsed: u64) -> u64 {
        elapsed / SECONDS_PER_DAY + 1
    }

    /// `amplifier * decay_rate^days`, or zero past the horizon
    pub fn factor(&self, elapsed: u64) -> Result<Fixed> {
        let days = Self::day(elapsed);
        if days > self.horizon_days {
            return Ok(0);
        }
        math::mul_fixed(self.amplifier, math::pow_fixed(self.decay_rate, days)?)
    }

    /// Derived units owed for `base` claimed `elapsed` seconds after genesis
    pub fn derived_amount(&self, base: Amount, elapsed: u64) -> Result<Amount> {
        if base == 0 {
            return Ok(0);
        }
        math::mul_fixed(base, self.factor(elapsed)?)
    }
}

/// A curve bound to its base and derived tokens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedEmission {
    pub base_token: TokenId,
    pub derived_token: TokenId,
    pub curve: RewardCurve,
    pub genesis: Timestamp,
}

impl DerivedEmission {
    /// Derived units for `base` units of the base token claimed at `now`
    pub fn amount_for(&self, base: Amount, now: Timestamp) -> Result<Amount> {
        self.curve
            .derived_amount(base, now.saturating_sub(self.genesis))
    }
}
