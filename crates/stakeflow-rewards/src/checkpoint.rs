//! # Checkpoint Proration
//!
//! Pools that sit atop an external reward position cannot observe emissions
//! continuously. They harvest occasionally and record a [`Checkpoint`] with
//! the amount received and the supply at that moment. A participant's share
//! of each checkpoint is reconstructed by replaying its deposit and
//! withdrawal history:
//!
//! ```text
//!  prev                       cur
//!   |--------- duration -------|
//!   |    d1 (offset o1)        |   d1 counts (duration - o1) / duration
//!   |            d2            |   d2 counts (duration - o2) / duration
//!   carried from earlier       |   counts fully
//! ```
//!
//! Withdrawals net against carried capital first, then against this
//! interval's deposits in arrival order.

use serde::{Deserialize, Serialize};
use stakeflow_core::error::Result;
use stakeflow_core::math;
use stakeflow_core::types::{Amount, Timestamp};
use tracing::debug;

/// Reward injection observed at a harvest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub total_supply: Amount,
    pub timestamp: Timestamp,
    pub reward_amount: Amount,
}

/// A deposit or withdrawal in an account's history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub amount: Amount,
    pub timestamp: Timestamp,
}

impl TransactionEvent {
    pub fn new(amount: Amount, timestamp: Timestamp) -> Self {
        Self { amount, timestamp }
    }
}

/// Append-only checkpoint history for one reward token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointLog {
    checkpoints: Vec<Checkpoint>,
    /// Rewards received that no checkpoint carries yet
    unallocated: Amount,
}

impl CheckpointLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a harvest that brought in `delta` at `now`.
    ///
    /// The first record is always a zero-amount anchor; anything received
    /// with it, or while the supply is zero, is carried into the next
    /// checkpoint. Returns whether a checkpoint was appended.
    pub fn record(&mut self, total_supply: Amount, now: Timestamp, delta: Amount) -> Result<bool> {
        let Some(last) = self.checkpoints.last() else {
            self.checkpoints.push(Checkpoint {
                total_supply,
                timestamp: now,
                reward_amount: 0,
            });
            self.unallocated = math::checked_add(self.unallocated, delta)?;
            debug!(now, carried = self.unallocated, "checkpoint anchor recorded");
            return Ok(true);
        };

        // Nobody can be paid from a checkpoint with zero supply.
        let reward_amount = math::checked_add(self.unallocated, delta)?;
        if now <= last.timestamp || reward_amount == 0 || total_supply == 0 {
            self.unallocated = reward_amount;
            return Ok(false);
        }

        self.checkpoints.push(Checkpoint {
            total_supply,
            timestamp: now,
            reward_amount,
        });
        self.unallocated = 0;
        Ok(true)
    }

    pub fn as_slice(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn last(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    /// Rewards received but not yet assigned to a checkpoint
    pub fn unallocated(&self) -> Amount {
        self.unallocated
    }

    /// Sum of all checkpointed rewards
    pub fn total_rewards(&self) -> Result<Amount> {
        self.checkpoints
            .iter()
            .try_fold(0u128, |acc, cp| math::checked_add(acc, cp.reward_amount))
    }
}

/// Gross rewards an account with this history earned across `checkpoints`.
///
/// Events must be in timestamp order. Events at or after the last
/// checkpoint are not yet rewarded.
pub fn prorate(
    checkpoints: &[Checkpoint],
    deposits: &[TransactionEvent],
    withdrawals: &[TransactionEvent],
) -> Result<Amount> {
    let mut rewards: Amount = 0;
    let mut carried: Amount = 0;
    let mut next_deposit = 0;
    let mut next_withdrawal = 0;

    for pair in checkpoints.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let duration = cur.timestamp.saturating_sub(prev.timestamp).max(1);

        let mut withdrawn: Amount = 0;
        while let Some(event) = withdrawals.get(next_withdrawal) {
            if event.timestamp >= cur.timestamp {
                break;
            }
            withdrawn = math::checked_add(withdrawn, event.amount)?;
            next_withdrawal += 1;
        }

        let from_carried = withdrawn.min(carried);
        carried -= from_carried;
        withdrawn -= from_carried;

        let mut prorated = carried;
        while let Some(event) = deposits.get(next_deposit) {
            if event.timestamp >= cur.timestamp {
                break;
            }
            next_deposit += 1;

            let netted = withdrawn.min(event.amount);
            withdrawn -= netted;
            let remaining = event.amount - netted;
            if remaining == 0 {
                continue;
            }

            // Deposits before the anchor count for the whole first interval.
            let offset = event.timestamp.saturating_sub(prev.timestamp).min(duration);
            let share = math::mul_div(remaining, (duration - offset) as u128, duration as u128)?;
            prorated = math::checked_add(prorated, share)?;
            carried = math::checked_add(carried, remaining)?;
        }

        let prorated = prorated.min(cur.total_supply);
        if cur.reward_amount > 0 && cur.total_supply > 0 {
            let share = math::mul_div(cur.reward_amount, prorated, cur.total_supply)?;
            rewards = math::checked_add(rewards, share)?;
        }
    }

    Ok(rewards)
}

/// Rewards still owed: gross proration minus what was already claimed
pub fn earned(
    checkpoints: &[Checkpoint],
    deposits: &[TransactionEvent],
    withdrawals: &[TransactionEvent],
    already_claimed: Amount,
) -> Result<Amount> {
    Ok(prorate(checkpoints, deposits, withdrawals)?.saturating_sub(already_claimed))
}
