//! Time-locked pool: rewards accrue on lock-multiplied weight

use super::{free_holdings, transact, Outbox, PoolGuard, RewardStreams, Staged};
use crate::account::ParticipantAccount;
use crate::accumulator::{FundingOutcome, RewardStream};
use crate::config::RewardsConfig;
use crate::lock::{combined_weight, LockSchedule, LockedStake};
use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::ledger::TokenLedger;
use stakeflow_core::math;
use stakeflow_core::types::{AccountId, Amount, StakeId, Timestamp, TokenAmounts, TokenId};
use std::collections::HashMap;
use tracing::{debug, info};

/// Everything a locked pool tracks per participant
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedAccount {
    /// Reward snapshots; `raw_balance` is the locked principal
    pub rewards: ParticipantAccount,
    pub stakes: Vec<LockedStake>,
    /// Weight the account was last settled at
    pub combined_weight: Amount,
    pub last_claim: Option<Timestamp>,
    /// Stakes ever opened, including unlocked ones
    #[serde(default)]
    pub stakes_opened: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPool {
    address: AccountId,
    staking_token: TokenId,
    guard: PoolGuard,
    settings: RewardsConfig,
    schedule: LockSchedule,
    unlock_override: bool,
    streams: RewardStreams,
    total_locked: Amount,
    total_weight: Amount,
    accounts: HashMap<AccountId, LockedAccount>,
    paid_out: HashMap<TokenId, Amount>,
}

pub(crate) struct Savepoint {
    guard: PoolGuard,
    streams: RewardStreams,
    total_locked: Amount,
    total_weight: Amount,
    accounts: Vec<(AccountId, Option<LockedAccount>)>,
    paid_out: HashMap<TokenId, Amount>,
}

impl Staged for LockedPool {
    type Savepoint = Savepoint;

    fn capture(&self, accounts: &[AccountId]) -> Savepoint {
        Savepoint {
            guard: self.guard.clone(),
            streams: self.streams.clone(),
            total_locked: self.total_locked,
            total_weight: self.total_weight,
            accounts: accounts
                .iter()
                .map(|id| (*id, self.accounts.get(id).cloned()))
                .collect(),
            paid_out: self.paid_out.clone(),
        }
    }

    fn restore(&mut self, savepoint: Savepoint) {
        self.guard = savepoint.guard;
        self.streams = savepoint.streams;
        self.total_locked = savepoint.total_locked;
        self.total_weight = savepoint.total_weight;
        self.paid_out = savepoint.paid_out;
        for (id, account) in savepoint.accounts {
            match account {
                Some(account) => {
                    self.accounts.insert(id, account);
                }
                None => {
                    self.accounts.remove(&id);
                }
            }
        }
    }
}

impl LockedPool {
    pub fn new(
        address: AccountId,
        owner: AccountId,
        staking_token: TokenId,
        settings: RewardsConfig,
        schedule: LockSchedule,
        now: Timestamp,
    ) -> Self {
        let cap = settings.max_reward_tokens;
        Self {
            address,
            staking_token,
            guard: PoolGuard::new(owner, now),
            settings,
            schedule,
            unlock_override: false,
            streams: RewardStreams::new(cap),
            total_locked: 0,
            total_weight: 0,
            accounts: HashMap::new(),
            paid_out: HashMap::new(),
        }
    }

    pub fn address(&self) -> &AccountId {
        &self.address
    }

    pub fn schedule(&self) -> &LockSchedule {
        &self.schedule
    }

    pub fn total_locked(&self) -> Amount {
        self.total_locked
    }

    pub fn total_weight(&self) -> Amount {
        self.total_weight
    }

    pub fn account(&self, account: &AccountId) -> Option<&LockedAccount> {
        self.accounts.get(account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &LockedAccount)> {
        self.accounts.iter()
    }

    pub fn weight_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).map_or(0, |a| a.combined_weight)
    }

    pub fn locked_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).map_or(0, |a| a.rewards.raw_balance)
    }

    pub fn stakes_of(&self, account: &AccountId) -> &[LockedStake] {
        self.accounts
            .get(account)
            .map(|a| a.stakes.as_slice())
            .unwrap_or(&[])
    }

    pub fn stream(&self, token: &TokenId) -> Result<&RewardStream> {
        self.streams.get(token)
    }

    pub fn paid_out(&self, token: &TokenId) -> Amount {
        self.paid_out.get(token).copied().unwrap_or(0)
    }

    pub fn add_reward_token(&mut self, caller: &AccountId, token: TokenId, now: Timestamp) -> Result<()> {
        self.guard.check_clock(now)?;
        self.guard.ensure_owner(caller)?;
        if token == self.staking_token {
            return Err(StakeflowError::ProtectedToken(token));
        }
        self.streams.add(token, self.settings.duration, now)?;
        self.guard.observe(now);
        info!(%token, "reward token added");
        Ok(())
    }

    pub fn fund(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: &AccountId,
        token: &TokenId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<FundingOutcome> {
        self.guard.check_clock(now)?;
        self.guard.ensure_owner(caller)?;
        self.streams.get(token)?;

        let funder = *caller;
        let threshold = self.settings.new_reward_ratio as u128;
        transact(self, &[], ledger, |pool, outbox| {
            let total = pool.total_weight;
            let outcome = pool.streams.get_mut(token)?.fund(amount, total, now, threshold)?;
            outbox.push(*token, funder, pool.address, amount);
            pool.guard.observe(now);
            Ok(outcome)
        })
    }

    /// Lock `amount` for `duration` seconds
    pub fn lock(
        &mut self,
        ledger: &mut dyn TokenLedger,
        account: &AccountId,
        amount: Amount,
        duration: u64,
        now: Timestamp,
    ) -> Result<StakeId> {
        self.guard.check_clock(now)?;
        self.guard.ensure_live()?;
        if amount == 0 {
            return Err(StakeflowError::ZeroAmount);
        }
        self.schedule.check_duration(duration)?;

        transact(self, &[*account], ledger, |pool, outbox| {
            pool.update_reward_and_balance(account, now)?;

            let entry = pool.accounts.entry(*account).or_default();
            let stake = LockedStake::open(
                account,
                &pool.schedule,
                amount,
                duration,
                entry.stakes_opened,
                now,
            )?;
            if entry.stakes.iter().any(|s| s.id == stake.id) {
                return Err(StakeflowError::DuplicateStake(stake.id));
            }

            let id = stake.id;
            let multiplier = stake.initial_multiplier;
            entry.stakes.push(stake);
            entry.stakes_opened = entry.stakes_opened.checked_add(1).ok_or(StakeflowError::MathOverflow)?;
            entry.rewards.raw_balance = math::checked_add(entry.rewards.raw_balance, amount)?;
            entry.last_claim.get_or_insert(now);
            pool.total_locked = math::checked_add(pool.total_locked, amount)?;
            pool.reweigh(account, now)?;

            outbox.push(pool.staking_token, *account, pool.address, amount);
            pool.guard.observe(now);
            info!(%account, %id, amount, duration, multiplier, "stake locked");
            Ok(id)
        })
    }

    /// Release an expired stake's principal to `receiver`
    pub fn unlock(
        &mut self,
        ledger: &mut dyn TokenLedger,
        account: &AccountId,
        stake_id: &StakeId,
        receiver: &AccountId,
        now: Timestamp,
    ) -> Result<Amount> {
        self.guard.check_clock(now)?;
        let stake = self
            .stakes_of(account)
            .iter()
            .find(|s| s.id == *stake_id)
            .ok_or(StakeflowError::StakeNotFound(*stake_id))?;
        if now < stake.end_time && !self.unlock_override {
            return Err(StakeflowError::StakeLocked {
                id: *stake_id,
                ends_at: stake.end_time,
            });
        }

        transact(self, &[*account], ledger, |pool, outbox| {
            pool.update_reward_and_balance(account, now)?;

            let entry = pool.accounts.entry(*account).or_default();
            let index = entry
                .stakes
                .iter()
                .position(|s| s.id == *stake_id)
                .ok_or(StakeflowError::StakeNotFound(*stake_id))?;
            let stake = entry.stakes.swap_remove(index);
            entry.rewards.raw_balance = math::checked_sub(entry.rewards.raw_balance, stake.principal)?;
            pool.total_locked = math::checked_sub(pool.total_locked, stake.principal)?;
            pool.reweigh(account, now)?;

            outbox.push(pool.staking_token, pool.address, *receiver, stake.principal);
            pool.guard.observe(now);
            info!(%account, id = %stake.id, principal = stake.principal, "stake unlocked");
            Ok(stake.principal)
        })
    }

    pub fn claim(&mut self, ledger: &mut dyn TokenLedger, account: &AccountId, now: Timestamp) -> Result<TokenAmounts> {
        self.guard.check_clock(now)?;
        transact(self, &[*account], ledger, |pool, outbox| {
            pool.update_reward_and_balance(account, now)?;
            let claimed = pool.stage_claim(account, outbox)?;
            pool.accounts.entry(*account).or_default().last_claim = Some(now);
            pool.reweigh(account, now)?;
            pool.guard.observe(now);
            Ok(claimed)
        })
    }

    /// Settle `account` and refresh its weight without claiming.
    ///
    /// Anyone may call this; it is how an expired stake's excess weight is
    /// taken out of the total.
    pub fn sync_account(&mut self, account: &AccountId, now: Timestamp) -> Result<()> {
        self.guard.check_clock(now)?;
        let savepoint = self.capture(&[*account]);
        if let Err(err) = self.update_reward_and_balance(account, now) {
            self.restore(savepoint);
            return Err(err);
        }
        self.guard.observe(now);
        Ok(())
    }

    pub fn earned(&self, account: &AccountId, now: Timestamp) -> Result<TokenAmounts> {
        let default = LockedAccount::default();
        let entry = self.accounts.get(account).unwrap_or(&default);
        self.streams
            .iter()
            .map(|stream| {
                let rps = stream.reward_per_share(self.total_weight, now)?;
                let owed = entry.rewards.earned(&stream.token, entry.combined_weight, rps)?;
                Ok((stream.token, owed))
            })
            .collect()
    }

    pub fn renew(&mut self, ledger: &dyn TokenLedger, now: Timestamp) -> Result<Vec<(TokenId, u64)>> {
        self.guard.check_clock(now)?;
        let (address, staking_token, staked) = (self.address, self.staking_token, self.total_locked);
        let paid_out = &self.paid_out;
        let plan = self.streams.renew(
            self.total_weight,
            now,
            |token| free_holdings(ledger, &address, token, &staking_token, staked),
            |token| paid_out.get(token).copied().unwrap_or(0),
        )?;
        self.guard.observe(now);
        Ok(plan)
    }

    pub fn set_paused(&mut self, caller: &AccountId, paused: bool) -> Result<()> {
        self.guard.set_paused(caller, paused)
    }

    /// Let every stake be withdrawn regardless of its end time (owner only)
    pub fn set_unlock_override(&mut self, caller: &AccountId, enabled: bool) -> Result<()> {
        self.guard.ensure_owner(caller)?;
        self.unlock_override = enabled;
        info!(enabled, "unlock override updated");
        Ok(())
    }

    pub fn recover_token(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: &AccountId,
        token: &TokenId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        self.guard.check_clock(now)?;
        self.guard.ensure_owner(caller)?;
        if *token == self.staking_token || self.streams.contains(token) {
            return Err(StakeflowError::ProtectedToken(*token));
        }
        let to = *caller;
        transact(self, &[], ledger, |pool, outbox| {
            outbox.push(*token, pool.address, to, amount);
            pool.guard.observe(now);
            Ok(())
        })
    }

    /// Settle rewards at the stored weight, then move the weight to its current value
    fn update_reward_and_balance(&mut self, account: &AccountId, now: Timestamp) -> Result<()> {
        self.streams.settle_all(self.total_weight, now)?;
        let entry = self.accounts.entry(*account).or_default();
        for stream in self.streams.iter() {
            entry
                .rewards
                .checkpoint(&stream.token, entry.combined_weight, stream.reward_per_share_stored)?;
        }
        self.reweigh(account, now)
    }

    fn reweigh(&mut self, account: &AccountId, now: Timestamp) -> Result<()> {
        let entry = self.accounts.entry(*account).or_default();
        let new_weight = combined_weight(&entry.stakes, entry.last_claim.unwrap_or(0), now)?;
        self.total_weight = math::apply_delta(self.total_weight, entry.combined_weight, new_weight)?;
        if new_weight != entry.combined_weight {
            debug!(%account, old = entry.combined_weight, new = new_weight, "weight updated");
        }
        entry.combined_weight = new_weight;
        Ok(())
    }

    fn stage_claim(&mut self, account: &AccountId, outbox: &mut Outbox) -> Result<TokenAmounts> {
        let tokens: Vec<TokenId> = self.streams.tokens().copied().collect();
        let entry = self.accounts.entry(*account).or_default();
        let mut claimed = Vec::with_capacity(tokens.len());
        for token in tokens {
            let amount = entry.rewards.take_accrued(&token);
            if amount > 0 {
                let paid = self.paid_out.entry(token).or_insert(0);
                *paid = math::checked_add(*paid, amount)?;
                outbox.push(token, self.address, *account, amount);
                info!(%account, %token, amount, "reward paid");
            }
            claimed.push((token, amount));
        }
        Ok(claimed)
    }
}
