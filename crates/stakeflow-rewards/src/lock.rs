//! # Lock Weighting
//!
//! Time-locked stakes earn on `principal * multiplier`. The multiplier
//! ramps linearly with the committed duration and decays back to 1x once
//! the lock expires.
//!
//! | Lock duration        | Multiplier (max 3x) |
//! |----------------------|---------------------|
//! | 0                    | 1.0x                |
//! | max / 2              | 2.0x                |
//! | max (or longer)      | 3.0x                |
//!
//! After expiry the multiplier blends the pre-expiry and post-expiry spans
//! since the owner's last claim, and never exceeds the stake's initial
//! multiplier.

use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::math::{self, narrow, wide_mul_div, widen, ONE};
use stakeflow_core::types::{AccountId, Amount, Fixed, StakeId, Timestamp};

/// `clamp(1x + duration * (max_multiplier - 1x) / max_duration, 1x, max_multiplier)`
pub fn lock_multiplier(duration: u64, max_duration: u64, max_multiplier: Fixed) -> Result<Fixed> {
    let ceiling = max_multiplier.max(ONE);
    let ramp = math::mul_div(duration as u128, ceiling - ONE, max_duration as u128)?;
    Ok(math::clamp(ONE.saturating_add(ramp), ONE, ceiling))
}

/// Bounds and ramp for new locks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSchedule {
    /// Shortest accepted lock in seconds
    pub min_duration: u64,
    /// Lock length that earns the full multiplier
    pub max_duration: u64,
    /// Multiplier at `max_duration`, scaled by 1e18
    pub max_multiplier: Fixed,
}

impl LockSchedule {
    /// Validated schedule
    pub fn new(min_duration: u64, max_duration: u64, max_multiplier: Fixed) -> Result<Self> {
        if max_duration == 0 || min_duration > max_duration {
            return Err(StakeflowError::InvalidConfig(format!(
                "lock bounds [{}, {}] are empty",
                min_duration, max_duration
            )));
        }
        if max_multiplier < ONE {
            return Err(StakeflowError::InvalidConfig(
                "max multiplier below 1x".into(),
            ));
        }
        Ok(Self {
            min_duration,
            max_duration,
            max_multiplier,
        })
    }

    /// Reject durations outside `[min_duration, max_duration]`
    pub fn check_duration(&self, duration: u64) -> Result<()> {
        if duration < self.min_duration || duration > self.max_duration {
            return Err(StakeflowError::InvalidLockDuration {
                duration,
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        Ok(())
    }

    /// Multiplier granted for locking `duration` seconds
    pub fn multiplier(&self, duration: u64) -> Result<Fixed> {
        lock_multiplier(duration, self.max_duration, self.max_multiplier)
    }
}

/// Lifecycle of a locked stake. Withdrawn stakes are removed from the owner's list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeState {
    /// `now < end_time`
    Active,
    /// `now >= end_time`, awaiting withdrawal
    Expired,
}

/// A single time-locked position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedStake {
    pub id: StakeId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub principal: Amount,
    pub initial_multiplier: Fixed,
}

impl LockedStake {
    /// Open `owner`'s `nonce`-th stake
    pub fn open(
        owner: &AccountId,
        schedule: &LockSchedule,
        principal: Amount,
        duration: u64,
        nonce: u64,
        now: Timestamp,
    ) -> Result<Self> {
        schedule.check_duration(duration)?;
        let end_time = now.checked_add(duration).ok_or(StakeflowError::MathOverflow)?;
        Ok(Self {
            id: StakeId::derive(owner, now, principal, nonce),
            start_time: now,
            end_time,
            principal,
            initial_multiplier: schedule.multiplier(duration)?,
        })
    }

    pub fn state(&self, now: Timestamp) -> StakeState {
        if now < self.end_time {
            StakeState::Active
        } else {
            StakeState::Expired
        }
    }

    /// Multiplier to weigh this stake with at `now`.
    ///
    /// The pre-expiry span is measured from the later of `last_claim` and
    /// the stake's own start, so a stake opened after the owner's last claim
    /// only blends over time it actually existed.
    pub fn effective_multiplier(&self, last_claim: Timestamp, now: Timestamp) -> Result<Fixed> {
        if now < self.end_time {
            return Ok(self.initial_multiplier);
        }

        let since = last_claim.max(self.start_time);
        let blended = if since < self.end_time {
            let before = (self.end_time - since) as u128;
            let after = (now - self.end_time) as u128;
            let span = before + after;
            if span == 0 {
                ONE
            } else {
                let weighted = widen(self.initial_multiplier) * widen(before) + widen(ONE) * widen(after);
                narrow(weighted / widen(span))?
            }
        } else {
            ONE
        };

        // Rounding must never inflate a decaying multiplier.
        Ok(blended.min(self.initial_multiplier))
    }

    /// `principal * effective_multiplier`
    pub fn weight(&self, last_claim: Timestamp, now: Timestamp) -> Result<Amount> {
        let multiplier = self.effective_multiplier(last_claim, now)?;
        narrow(wide_mul_div(
            widen(self.principal),
            widen(multiplier),
            widen(ONE),
        )?)
    }
}

/// Sum of the stakes' current weights
pub fn combined_weight(stakes: &[LockedStake], last_claim: Timestamp, now: Timestamp) -> Result<Amount> {
    stakes.iter().try_fold(0u128, |total, stake| {
        math::checked_add(total, stake.weight(last_claim, now)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DAY: u64 = 86_400;
    const MAX_LOCK: u64 = 3 * 365 * DAY;

    fn schedule() -> LockSchedule {
        LockSchedule::new(DAY, MAX_LOCK, 3 * ONE).unwrap()
    }

    fn owner() -> AccountId {
        AccountId::from_label("owner")
    }

    #[test]
    fn test_multiplier_ramp() {
        assert_eq!(lock_multiplier(0, MAX_LOCK, 3 * ONE).unwrap(), ONE);
        assert_eq!(lock_multiplier(MAX_LOCK / 2, MAX_LOCK, 3 * ONE).unwrap(), 2 * ONE);
        assert_eq!(lock_multiplier(MAX_LOCK, MAX_LOCK, 3 * ONE).unwrap(), 3 * ONE);
        assert_eq!(lock_multiplier(10 * MAX_LOCK, MAX_LOCK, 3 * ONE).unwrap(), 3 * ONE);
    }

    #[test]
    fn test_schedule_validation() {
        assert!(LockSchedule::new(10, 5, 3 * ONE).is_err());
        assert!(LockSchedule::new(0, 0, 3 * ONE).is_err());
        assert!(LockSchedule::new(0, 10, ONE / 2).is_err());

        let s = schedule();
        assert!(s.check_duration(DAY).is_ok());
        assert!(matches!(
            s.check_duration(DAY - 1),
            Err(StakeflowError::InvalidLockDuration { .. })
        ));
        assert!(s.check_duration(MAX_LOCK + 1).is_err());
    }

    #[test]
    fn test_max_lock_weighs_triple() {
        let stake = LockedStake::open(&owner(), &schedule(), 100, MAX_LOCK, 0, 0).unwrap();
        assert_eq!(stake.initial_multiplier, 3 * ONE);
        assert_eq!(combined_weight(&[stake], 0, 0).unwrap(), 300);
    }

    #[test]
    fn test_expired_blend_halfway() {
        // Expired 10 days ago, last claim 20 days ago: (3x*10 + 1x*10) / 20 = 2x.
        let stake = LockedStake::open(&owner(), &schedule(), 100, MAX_LOCK, 0, 0).unwrap();
        let now = MAX_LOCK + 10 * DAY;
        let last_claim = MAX_LOCK - 10 * DAY;
        assert_eq!(stake.state(now), StakeState::Expired);
        assert_eq!(stake.effective_multiplier(last_claim, now).unwrap(), 2 * ONE);
        assert_eq!(stake.weight(last_claim, now).unwrap(), 200);
    }

    #[test]
    fn test_claim_after_expiry_is_one() {
        let stake = LockedStake::open(&owner(), &schedule(), 100, DAY, 0, 0).unwrap();
        assert_eq!(stake.effective_multiplier(2 * DAY, 3 * DAY).unwrap(), ONE);
    }

    #[test]
    fn test_active_keeps_initial() {
        let stake = LockedStake::open(&owner(), &schedule(), 100, MAX_LOCK, 0, 0).unwrap();
        assert_eq!(stake.state(MAX_LOCK - 1), StakeState::Active);
        assert_eq!(stake.effective_multiplier(0, MAX_LOCK - 1).unwrap(), 3 * ONE);
    }

    #[test]
    fn test_blend_ignores_claims_before_stake_start() {
        // Claimed at t=0, stake opened at t=100 days: the blend starts at the stake.
        let start = 100 * DAY;
        let stake = LockedStake::open(&owner(), &schedule(), 100, MAX_LOCK / 2, 0, start).unwrap();
        let expiry = stake.end_time;
        let now = expiry + (MAX_LOCK / 2);
        // Equal spans before and after expiry: (2x + 1x) / 2 = 1.5x
        assert_eq!(stake.effective_multiplier(0, now).unwrap(), 3 * ONE / 2);
    }

    #[test]
    fn test_exactly_at_expiry() {
        let stake = LockedStake::open(&owner(), &schedule(), 100, MAX_LOCK, 0, 0).unwrap();
        assert_eq!(stake.state(MAX_LOCK), StakeState::Expired);
        assert_eq!(stake.effective_multiplier(0, MAX_LOCK).unwrap(), 3 * ONE);
        assert_eq!(stake.effective_multiplier(MAX_LOCK, MAX_LOCK).unwrap(), ONE);
    }

    proptest! {
        #[test]
        fn prop_multiplier_never_exceeds_initial(
            duration in DAY..=MAX_LOCK,
            start in 0u64..1_000 * DAY,
            last_claim in 0u64..5_000 * DAY,
            offset in 0u64..5_000 * DAY,
            principal in 1u128..1_000_000_000_000_000_000_000_000,
        ) {
            let stake = LockedStake::open(&owner(), &schedule(), principal, duration, 0, start).unwrap();
            let now = start + offset;
            let multiplier = stake.effective_multiplier(last_claim.min(now), now).unwrap();
            prop_assert!(multiplier <= stake.initial_multiplier);
            prop_assert!(multiplier >= ONE);
        }

        #[test]
        fn prop_multiplier_non_increasing_after_expiry(
            duration in DAY..=MAX_LOCK,
            last_claim in 0u64..MAX_LOCK,
            a in 0u64..1_000 * DAY,
            b in 0u64..1_000 * DAY,
        ) {
            let stake = LockedStake::open(&owner(), &schedule(), 1, duration, 0, 0).unwrap();
            let (early, late) = (a.min(b), a.max(b));
            let m_early = stake.effective_multiplier(last_claim, stake.end_time + early).unwrap();
            let m_late = stake.effective_multiplier(last_claim, stake.end_time + late).unwrap();
            prop_assert!(m_late <= m_early);
        }
    }
}
