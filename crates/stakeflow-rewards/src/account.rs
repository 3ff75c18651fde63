//! Per-participant reward bookkeeping shared by the accrual pools

use crate::accumulator;
use serde::{Deserialize, Serialize};
use stakeflow_core::error::Result;
use stakeflow_core::math::U256;
use stakeflow_core::types::{Amount, TokenId};
use std::collections::HashMap;

/// Snapshot of what a participant has been credited per reward token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAccount {
    /// Staked principal (locked principal for time-locked pools)
    pub raw_balance: Amount,
    reward_per_share_paid: HashMap<TokenId, U256>,
    accrued_rewards: HashMap<TokenId, Amount>,
}

impl ParticipantAccount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reward-per-share the account was last settled at
    pub fn paid(&self, token: &TokenId) -> U256 {
        self.reward_per_share_paid
            .get(token)
            .copied()
            .unwrap_or_else(U256::zero)
    }

    /// Rewards settled but not yet claimed
    pub fn accrued(&self, token: &TokenId) -> Amount {
        self.accrued_rewards.get(token).copied().unwrap_or(0)
    }

    /// Rewards owed for `token` if the index stood at `reward_per_share`
    pub fn earned(&self, token: &TokenId, weight: Amount, reward_per_share: U256) -> Result<Amount> {
        accumulator::earned(weight, reward_per_share, self.paid(token), self.accrued(token))
    }

    /// Fold rewards earned at `weight` into `accrued` and snapshot the index
    pub fn checkpoint(&mut self, token: &TokenId, weight: Amount, reward_per_share: U256) -> Result<Amount> {
        let owed = self.earned(token, weight, reward_per_share)?;
        self.accrued_rewards.insert(*token, owed);
        self.reward_per_share_paid.insert(*token, reward_per_share);
        Ok(owed)
    }

    /// Zero and return the accrued rewards for `token`
    pub fn take_accrued(&mut self, token: &TokenId) -> Amount {
        self.accrued_rewards
            .get_mut(token)
            .map(std::mem::take)
            .unwrap_or(0)
    }
}
