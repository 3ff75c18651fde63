//! # Reward-per-share accumulator
//!
//! One [`RewardStream`] per reward token. A stream emits `reward_rate`
//! (tokens per second, scaled by 1e18) until `period_finish`, and
//! distributes it across the pool's total weight through a monotonically
//! increasing reward-per-share index:
//!
//! ```text
//! rps += (min(now, period_finish) - last_update_time) * reward_rate / total_weight
//! earned(account) = weight * (rps - account.paid) / 1e18 + account.accrued
//! ```
//!
//! ## Funding smoothing
//!
//! Top-ups that arrive mid-period are only folded into the rate when at
//! least 17% of the current period is still ahead at the implied rate
//! (`queued_ratio < 830`). Otherwise they wait in `queued_amount` and roll
//! in on the next qualifying funding, so a stream of tiny fundings cannot be
//! used to steer the emission speed.

use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::math::{self, narrow, wide_mul_div, widen, PRECISION, U256};
use stakeflow_core::types::{Amount, Timestamp, TokenId};
use tracing::{debug, info, warn};

/// Default queued-ratio threshold (per mille) below which a funding is folded in
pub const NEW_REWARD_RATIO: u128 = 830;

/// Denominator of the queued ratio
pub const RATIO_BASE: u128 = 1_000;

/// Ceiling on `reward_rate` (2^160), leaving headroom for elapsed time and
/// weights in every `rate * elapsed` product
pub const MAX_REWARD_RATE: U256 = U256([0, 0, 1 << 32, 0]);

/// What a funding call did to the stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FundingOutcome {
    /// Period had ended; a fresh period started at the new rate
    Started { rate: U256 },
    /// Funding and queue folded into the running period at a new rate
    Folded { rate: U256 },
    /// Funding deferred; rate unchanged
    Queued { queued: Amount },
}

/// Distribution state for one reward token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStream {
    /// Token being distributed
    pub token: TokenId,
    /// Length of one reward period in seconds
    pub duration: u64,
    /// End of the current period
    pub period_finish: Timestamp,
    /// Last time `reward_per_share_stored` was brought up to date
    pub last_update_time: Timestamp,
    /// Emission per second, scaled by 1e18
    pub reward_rate: U256,
    /// Cumulative reward per unit of weight, scaled by 1e18
    pub reward_per_share_stored: U256,
    /// Funding waiting to be rolled into the rate
    pub queued_amount: Amount,
    /// Total ever funded into this stream
    pub historical_total: Amount,
    /// Rewards emitted to non-zero weight so far, rounded up
    pub emitted: Amount,
}

impl RewardStream {
    /// Create an idle stream; nothing is emitted until the first funding
    pub fn new(token: TokenId, duration: u64, now: Timestamp) -> Result<Self> {
        if duration == 0 {
            return Err(StakeflowError::InvalidConfig(
                "reward duration must be non-zero".into(),
            ));
        }
        Ok(Self {
            token,
            duration,
            period_finish: now,
            last_update_time: now,
            reward_rate: U256::zero(),
            reward_per_share_stored: U256::zero(),
            queued_amount: 0,
            historical_total: 0,
            emitted: 0,
        })
    }

    /// Latest time at which rewards are still being emitted
    pub fn last_time_applicable(&self, now: Timestamp) -> Timestamp {
        now.min(self.period_finish)
    }

    /// Whether the current period has run out
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.period_finish
    }

    /// Reward-per-share as of `now`, without mutating the stream
    pub fn reward_per_share(&self, total_weight: Amount, now: Timestamp) -> Result<U256> {
        let applicable = self.last_time_applicable(now);
        if total_weight == 0 || applicable <= self.last_update_time {
            return Ok(self.reward_per_share_stored);
        }

        let elapsed = widen((applicable - self.last_update_time) as u128);
        let delta = wide_mul_div(elapsed, self.reward_rate, widen(total_weight))?;
        self.reward_per_share_stored
            .checked_add(delta)
            .ok_or(StakeflowError::MathOverflow)
    }

    /// Bring the stream up to `now` and return the new reward-per-share.
    ///
    /// With zero weight only `last_update_time` advances: emissions over an
    /// empty pool are not owed to anyone.
    pub fn settle(&mut self, total_weight: Amount, now: Timestamp) -> Result<U256> {
        let rps = self.reward_per_share(total_weight, now)?;
        let applicable = self.last_time_applicable(now);
        if total_weight > 0 && applicable > self.last_update_time {
            let elapsed = widen((applicable - self.last_update_time) as u128);
            let scaled = elapsed
                .checked_mul(self.reward_rate)
                .and_then(|v| v.checked_add(widen(PRECISION - 1)))
                .ok_or(StakeflowError::MathOverflow)?;
            self.emitted = math::checked_add(self.emitted, narrow(scaled / widen(PRECISION))?)?;
        }
        self.reward_per_share_stored = rps;
        self.last_update_time = self.last_time_applicable(now).max(self.last_update_time);
        debug!(token = %self.token, total_weight, last_update = self.last_update_time, "stream settled");
        Ok(rps)
    }

    /// Fund the stream with `amount`, applying the smoothing protocol.
    ///
    /// Settles against `total_weight` first. Nothing is written unless the
    /// whole call succeeds.
    pub fn fund(
        &mut self,
        amount: Amount,
        total_weight: Amount,
        now: Timestamp,
        ratio_threshold: u128,
    ) -> Result<FundingOutcome> {
        if amount == 0 {
            return Err(StakeflowError::ZeroAmount);
        }

        let mut next = self.clone();
        next.settle(total_weight, now)?;
        let pending = math::checked_add(amount, next.queued_amount)?;

        let outcome = if now >= next.period_finish {
            let rate = next.rate_for(pending)?;
            next.restart(rate, now)?;
            FundingOutcome::Started { rate }
        } else {
            let period_start = next.period_finish.saturating_sub(next.duration);
            let elapsed = widen(now.saturating_sub(period_start) as u128);
            let current_at_now = wide_mul_div(next.reward_rate, elapsed, widen(PRECISION))?;
            let queued_ratio = wide_mul_div(current_at_now, widen(RATIO_BASE), widen(pending))?;

            if queued_ratio < widen(ratio_threshold) {
                let remaining = widen((next.period_finish - now) as u128);
                let leftover = narrow(wide_mul_div(remaining, next.reward_rate, widen(PRECISION))?)?;
                let rate = next.rate_for(math::checked_add(pending, leftover)?)?;
                next.restart(rate, now)?;
                FundingOutcome::Folded { rate }
            } else {
                next.queued_amount = pending;
                FundingOutcome::Queued { queued: pending }
            }
        };

        next.historical_total = math::checked_add(next.historical_total, amount)?;
        *self = next;

        match &outcome {
            FundingOutcome::Queued { queued } => {
                warn!(token = %self.token, amount, queued, "funding deferred to queue")
            }
            FundingOutcome::Started { .. } | FundingOutcome::Folded { .. } => info!(
                token = %self.token,
                amount,
                period_finish = self.period_finish,
                "reward rate updated"
            ),
        }

        Ok(outcome)
    }

    /// Periods to add and holdings required to renew at `now`.
    ///
    /// Fails with `PeriodNotYetExpired` while the current period runs.
    pub fn renewal_requirement(&self, now: Timestamp) -> Result<(u64, Amount)> {
        if !self.is_expired(now) {
            return Err(StakeflowError::PeriodNotYetExpired {
                token: self.token,
                period_finish: self.period_finish,
            });
        }

        let periods = (now - self.period_finish) / self.duration + 1;
        let span = (self.duration as u128)
            .checked_mul(periods as u128)
            .ok_or(StakeflowError::MathOverflow)?;
        let required = narrow(wide_mul_div(self.reward_rate, widen(span), widen(PRECISION))?)?;
        Ok((periods, required))
    }

    /// Holdings already spoken for: emitted but not yet `paid_out`, plus the queue
    pub fn outstanding(&self, paid_out: Amount) -> Result<Amount> {
        math::checked_add(self.emitted.saturating_sub(paid_out), self.queued_amount)
    }

    /// Extend `period_finish` by whole periods at the current rate
    pub fn extend(&mut self, periods: u64) -> Result<()> {
        let extension = self
            .duration
            .checked_mul(periods)
            .ok_or(StakeflowError::MathOverflow)?;
        self.period_finish = self
            .period_finish
            .checked_add(extension)
            .ok_or(StakeflowError::MathOverflow)?;
        Ok(())
    }

    fn rate_for(&self, total: Amount) -> Result<U256> {
        let rate = wide_mul_div(widen(total), widen(PRECISION), widen(self.duration as u128))?;
        if rate > MAX_REWARD_RATE {
            return Err(StakeflowError::RewardRateOverflow {
                rate: narrow(rate / widen(PRECISION))?,
                ceiling: narrow(MAX_REWARD_RATE / widen(PRECISION))?,
            });
        }
        Ok(rate)
    }

    fn restart(&mut self, rate: U256, now: Timestamp) -> Result<()> {
        self.reward_rate = rate;
        self.queued_amount = 0;
        self.last_update_time = now;
        self.period_finish = now
            .checked_add(self.duration)
            .ok_or(StakeflowError::MathOverflow)?;
        Ok(())
    }
}

/// Rewards owed to a holder of `weight` since its last snapshot `paid`
pub fn earned(weight: Amount, reward_per_share: U256, paid: U256, accrued: Amount) -> Result<Amount> {
    let delta = reward_per_share.saturating_sub(paid);
    let fresh = narrow(wide_mul_div(widen(weight), delta, widen(PRECISION))?)?;
    math::checked_add(accrued, fresh)
}
