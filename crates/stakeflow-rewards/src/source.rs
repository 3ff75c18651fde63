//! External reward position behind a checkpointed pool
//!
//! A checkpointed pool does not receive emissions directly. Its stake sits
//! with a [`RewardSource`] custodian that occasionally pays out accumulated
//! rewards to the pool and releases principal on withdrawal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::ledger::TokenLedger;
use stakeflow_core::math;
use stakeflow_core::types::{AccountId, Amount, TokenId};
use tracing::debug;

/// Position the pool's principal is parked in
pub trait RewardSource {
    /// Account that holds the pool's staked principal
    fn custodian(&self) -> AccountId;

    /// Pay everything owed to `pool` into its ledger balance
    fn harvest(&mut self, ledger: &mut dyn TokenLedger, pool: &AccountId) -> Result<()>;

    /// Release `amount` of `pool`'s principal to `receiver`; returns what was delivered
    fn withdraw_position(
        &mut self,
        ledger: &mut dyn TokenLedger,
        pool: &AccountId,
        amount: Amount,
        receiver: &AccountId,
    ) -> Result<Amount>;
}

/// Gauge-style custodian: holds principal and accrues emissions for the pool
/// until they are harvested.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GaugeSource {
    gauge: AccountId,
    staking_token: TokenId,
    pending: IndexMap<TokenId, Amount>,
}

impl GaugeSource {
    pub fn new(gauge: AccountId, staking_token: TokenId) -> Self {
        Self {
            gauge,
            staking_token,
            pending: IndexMap::new(),
        }
    }

    /// Make `amount` of `token` claimable on the next harvest. The gauge
    /// account must actually hold it by then.
    pub fn accrue(&mut self, token: TokenId, amount: Amount) -> Result<()> {
        let entry = self.pending.entry(token).or_insert(0);
        *entry = math::checked_add(*entry, amount)?;
        Ok(())
    }

    pub fn pending(&self, token: &TokenId) -> Amount {
        self.pending.get(token).copied().unwrap_or(0)
    }
}

impl RewardSource for GaugeSource {
    fn custodian(&self) -> AccountId {
        self.gauge
    }

    fn harvest(&mut self, ledger: &mut dyn TokenLedger, pool: &AccountId) -> Result<()> {
        // Check every payout first so a harvest is all or nothing.
        for (token, amount) in &self.pending {
            let held = ledger.balance_of(token, &self.gauge);
            if held < *amount {
                return Err(StakeflowError::TransferFailed {
                    token: *token,
                    amount: *amount,
                    reason: format!("gauge holds only {}", held),
                });
            }
        }

        for (token, amount) in self.pending.drain(..) {
            ledger.transfer(&token, &self.gauge, pool, amount)?;
            debug!(%token, amount, %pool, "gauge paid out");
        }
        Ok(())
    }

    fn withdraw_position(
        &mut self,
        ledger: &mut dyn TokenLedger,
        pool: &AccountId,
        amount: Amount,
        receiver: &AccountId,
    ) -> Result<Amount> {
        ledger.transfer(&self.staking_token, &self.gauge, receiver, amount)?;
        debug!(%pool, %receiver, amount, "gauge released principal");
        Ok(amount)
    }
}
