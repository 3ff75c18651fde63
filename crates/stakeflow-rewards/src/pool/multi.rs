//! Continuous-accrual pool with several reward tokens

use super::{free_holdings, transact, Outbox, PoolGuard, RewardStreams, Staged};
use crate::account::ParticipantAccount;
use crate::accumulator::{FundingOutcome, RewardStream};
use crate::config::RewardsConfig;
use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::ledger::TokenLedger;
use stakeflow_core::math;
use stakeflow_core::types::{AccountId, Amount, Timestamp, TokenAmounts, TokenId};
use std::collections::HashMap;
use tracing::{debug, info};

/// Stake one token, earn up to `max_reward_tokens` others
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiRewardPool {
    address: AccountId,
    staking_token: TokenId,
    guard: PoolGuard,
    settings: RewardsConfig,
    streams: RewardStreams,
    total_supply: Amount,
    accounts: HashMap<AccountId, ParticipantAccount>,
    paid_out: HashMap<TokenId, Amount>,
}

pub(crate) struct Savepoint {
    guard: PoolGuard,
    streams: RewardStreams,
    total_supply: Amount,
    accounts: Vec<(AccountId, Option<ParticipantAccount>)>,
    paid_out: HashMap<TokenId, Amount>,
}

impl Staged for MultiRewardPool {
    type Savepoint = Savepoint;

    fn capture(&self, accounts: &[AccountId]) -> Savepoint {
        Savepoint {
            guard: self.guard.clone(),
            streams: self.streams.clone(),
            total_supply: self.total_supply,
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
        self.total_supply = savepoint.total_supply;
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

impl MultiRewardPool {
    pub fn new(
        address: AccountId,
        owner: AccountId,
        staking_token: TokenId,
        settings: RewardsConfig,
        now: Timestamp,
    ) -> Self {
        let cap = settings.max_reward_tokens;
        Self {
            address,
            staking_token,
            guard: PoolGuard::new(owner, now),
            settings,
            streams: RewardStreams::new(cap),
            total_supply: 0,
            accounts: HashMap::new(),
            paid_out: HashMap::new(),
        }
    }

    pub fn address(&self) -> &AccountId {
        &self.address
    }

    pub fn staking_token(&self) -> &TokenId {
        &self.staking_token
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).map_or(0, |a| a.raw_balance)
    }

    pub fn stream(&self, token: &TokenId) -> Result<&RewardStream> {
        self.streams.get(token)
    }

    pub fn reward_tokens(&self) -> Vec<TokenId> {
        self.streams.tokens().copied().collect()
    }

    /// Total ever paid out of `token`
    pub fn paid_out(&self, token: &TokenId) -> Amount {
        self.paid_out.get(token).copied().unwrap_or(0)
    }

    pub fn is_paused(&self) -> bool {
        self.guard.is_paused()
    }

    /// Register a reward token (owner only)
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

    /// Pull `amount` of `token` from the owner into the stream
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
            let total = pool.total_supply;
            let outcome = pool.streams.get_mut(token)?.fund(amount, total, now, threshold)?;
            outbox.push(*token, funder, pool.address, amount);
            pool.guard.observe(now);
            Ok(outcome)
        })
    }

    pub fn deposit(
        &mut self,
        ledger: &mut dyn TokenLedger,
        account: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        self.guard.check_clock(now)?;
        self.guard.ensure_live()?;
        if amount == 0 {
            return Err(StakeflowError::ZeroAmount);
        }

        transact(self, &[*account], ledger, |pool, outbox| {
            pool.update_reward(Some(account), now)?;
            pool.total_supply = math::checked_add(pool.total_supply, amount)?;
            let entry = pool.accounts.entry(*account).or_default();
            entry.raw_balance = math::checked_add(entry.raw_balance, amount)?;
            outbox.push(pool.staking_token, *account, pool.address, amount);
            pool.guard.observe(now);
            debug!(%account, amount, "deposited");
            Ok(())
        })
    }

    /// Withdraw `amount` to `receiver`, optionally claiming to `account` too
    pub fn withdraw(
        &mut self,
        ledger: &mut dyn TokenLedger,
        account: &AccountId,
        amount: Amount,
        receiver: &AccountId,
        take_rewards: bool,
        now: Timestamp,
    ) -> Result<TokenAmounts> {
        self.guard.check_clock(now)?;
        if amount == 0 {
            return Err(StakeflowError::ZeroAmount);
        }
        let available = self.balance_of(account);
        if amount > available {
            return Err(StakeflowError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        transact(self, &[*account], ledger, |pool, outbox| {
            pool.update_reward(Some(account), now)?;
            pool.total_supply = math::checked_sub(pool.total_supply, amount)?;
            let entry = pool.accounts.entry(*account).or_default();
            entry.raw_balance = math::checked_sub(entry.raw_balance, amount)?;
            outbox.push(pool.staking_token, pool.address, *receiver, amount);

            let claimed = if take_rewards {
                pool.stage_claim(account, outbox)?
            } else {
                Vec::new()
            };
            pool.guard.observe(now);
            debug!(%account, %receiver, amount, "withdrew");
            Ok(claimed)
        })
    }

    /// Withdraw everything and claim
    pub fn exit(&mut self, ledger: &mut dyn TokenLedger, account: &AccountId, now: Timestamp) -> Result<TokenAmounts> {
        let balance = self.balance_of(account);
        if balance == 0 {
            return self.claim(ledger, account, now);
        }
        self.withdraw(ledger, account, balance, account, true, now)
    }

    pub fn claim(&mut self, ledger: &mut dyn TokenLedger, account: &AccountId, now: Timestamp) -> Result<TokenAmounts> {
        self.guard.check_clock(now)?;
        transact(self, &[*account], ledger, |pool, outbox| {
            pool.update_reward(Some(account), now)?;
            let claimed = pool.stage_claim(account, outbox)?;
            pool.guard.observe(now);
            Ok(claimed)
        })
    }

    /// Rewards `account` could claim at `now`
    pub fn earned(&self, account: &AccountId, now: Timestamp) -> Result<TokenAmounts> {
        let default = ParticipantAccount::default();
        let entry = self.accounts.get(account).unwrap_or(&default);
        self.streams
            .iter()
            .map(|stream| {
                let rps = stream.reward_per_share(self.total_supply, now)?;
                Ok((stream.token, entry.earned(&stream.token, entry.raw_balance, rps)?))
            })
            .collect()
    }

    /// Extend expired reward periods from holdings already in the pool
    pub fn renew(&mut self, ledger: &dyn TokenLedger, now: Timestamp) -> Result<Vec<(TokenId, u64)>> {
        self.guard.check_clock(now)?;
        let (address, staking_token, staked) = (self.address, self.staking_token, self.total_supply);
        let paid_out = &self.paid_out;
        let plan = self.streams.renew(
            self.total_supply,
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

    /// Sweep a token that is neither staked nor distributed here
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
            info!(%token, amount, "token recovered");
            Ok(())
        })
    }

    fn update_reward(&mut self, account: Option<&AccountId>, now: Timestamp) -> Result<()> {
        self.streams.settle_all(self.total_supply, now)?;
        if let Some(account) = account {
            let entry = self.accounts.entry(*account).or_default();
            for stream in self.streams.iter() {
                entry.checkpoint(&stream.token, entry.raw_balance, stream.reward_per_share_stored)?;
            }
        }
        Ok(())
    }

    fn stage_claim(&mut self, account: &AccountId, outbox: &mut Outbox) -> Result<TokenAmounts> {
        let tokens: Vec<TokenId> = self.streams.tokens().copied().collect();
        let entry = self.accounts.entry(*account).or_default();
        let mut claimed = Vec::with_capacity(tokens.len());
        for token in tokens {
            let amount = entry.take_accrued(&token);
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

#[cfg(test)]
mod tests {
    use super::*;
    use stakeflow_core::ledger::MemoryLedger;
    use stakeflow_core::math::ONE;

    const DAY: u64 = 86_400;

    struct Fixture {
        ledger: MemoryLedger,
        pool: MultiRewardPool,
        owner: AccountId,
        alice: AccountId,
        bob: AccountId,
        lp: TokenId,
        crv: TokenId,
    }

    fn fixture() -> Fixture {
        let owner = AccountId::from_label("owner");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        let lp = TokenId::from_label("LP");
        let crv = TokenId::from_label("CRV");
        let settings = RewardsConfig {
            duration: 10 * DAY,
            ..RewardsConfig::default()
        };
        let mut pool = MultiRewardPool::new(AccountId::from_label("pool"), owner, lp, settings, 0);
        pool.add_reward_token(&owner, crv, 0).unwrap();

        let mut ledger = MemoryLedger::new();
        ledger.mint(&crv, &owner, 1_000_000 * ONE).unwrap();
        ledger.mint(&lp, &alice, 1_000 * ONE).unwrap();
        ledger.mint(&lp, &bob, 1_000 * ONE).unwrap();
        Fixture {
            ledger,
            pool,
            owner,
            alice,
            bob,
            lp,
            crv,
        }
    }

    fn earned_of(pool: &MultiRewardPool, account: &AccountId, token: &TokenId, now: Timestamp) -> Amount {
        pool.earned(account, now)
            .unwrap()
            .into_iter()
            .find(|(t, _)| t == token)
            .map_or(0, |(_, a)| a)
    }

    #[test]
    fn test_single_staker_takes_period() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 100 * ONE, 0).unwrap();
        f.pool.fund(&mut f.ledger, &f.owner, &f.crv, 1_000 * ONE, 0).unwrap();

        let owed = earned_of(&f.pool, &f.alice, &f.crv, 10 * DAY);
        assert!(owed <= 1_000 * ONE);
        assert!(1_000 * ONE - owed < 1_000_000);

        let claimed = f.pool.claim(&mut f.ledger, &f.alice, 20 * DAY).unwrap();
        assert_eq!(claimed, vec![(f.crv, owed)]);
        assert_eq!(f.ledger.balance_of(&f.crv, &f.alice), owed);
        assert_eq!(earned_of(&f.pool, &f.alice, &f.crv, 20 * DAY), 0);
    }

    #[test]
    fn test_two_stakers_split_by_balance() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 300 * ONE, 0).unwrap();
        f.pool.deposit(&mut f.ledger, &f.bob, 100 * ONE, 0).unwrap();
        f.pool.fund(&mut f.ledger, &f.owner, &f.crv, 1_000 * ONE, 0).unwrap();

        let alice = earned_of(&f.pool, &f.alice, &f.crv, 10 * DAY);
        let bob = earned_of(&f.pool, &f.bob, &f.crv, 10 * DAY);
        assert!(alice.abs_diff(3 * bob) < 1_000_000);
        assert!(alice + bob <= 1_000 * ONE);
    }

    #[test]
    fn test_earned_is_idempotent() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 100 * ONE, 0).unwrap();
        f.pool.fund(&mut f.ledger, &f.owner, &f.crv, 1_000 * ONE, 0).unwrap();
        let first = f.pool.earned(&f.alice, 3 * DAY).unwrap();
        let second = f.pool.earned(&f.alice, 3 * DAY).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_withdraw_checks_balance() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 10 * ONE, 0).unwrap();
        let err = f
            .pool
            .withdraw(&mut f.ledger, &f.alice, 11 * ONE, &f.alice, false, DAY)
            .unwrap_err();
        assert_eq!(
            err,
            StakeflowError::InsufficientBalance {
                requested: 11 * ONE,
                available: 10 * ONE
            }
        );
        assert_eq!(
            f.pool.withdraw(&mut f.ledger, &f.alice, 0, &f.alice, false, DAY),
            Err(StakeflowError::ZeroAmount)
        );
    }

    #[test]
    fn test_withdraw_to_receiver_keeps_rewards_accrued() {
        let mut f = fixture();
        let receiver = AccountId::from_label("vault");
        f.pool.deposit(&mut f.ledger, &f.alice, 100 * ONE, 0).unwrap();
        f.pool.fund(&mut f.ledger, &f.owner, &f.crv, 1_000 * ONE, 0).unwrap();

        let claimed = f
            .pool
            .withdraw(&mut f.ledger, &f.alice, 100 * ONE, &receiver, false, 5 * DAY)
            .unwrap();
        assert!(claimed.is_empty());
        assert_eq!(f.ledger.balance_of(&f.lp, &receiver), 100 * ONE);
        let owed = earned_of(&f.pool, &f.alice, &f.crv, 8 * DAY);
        assert!(owed > 499 * ONE && owed <= 500 * ONE);
    }

    #[test]
    fn test_exit_returns_everything() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 100 * ONE, 0).unwrap();
        f.pool.fund(&mut f.ledger, &f.owner, &f.crv, 1_000 * ONE, 0).unwrap();
        let claimed = f.pool.exit(&mut f.ledger, &f.alice, 10 * DAY).unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(f.pool.balance_of(&f.alice), 0);
        assert_eq!(f.ledger.balance_of(&f.lp, &f.alice), 1_000 * ONE);
        assert_eq!(f.pool.paid_out(&f.crv), claimed[0].1);
    }

    #[test]
    fn test_paused_pool_refuses_deposits_only() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 10 * ONE, 0).unwrap();
        f.pool.set_paused(&f.owner, true).unwrap();
        assert_eq!(
            f.pool.deposit(&mut f.ledger, &f.bob, 10 * ONE, 1),
            Err(StakeflowError::PoolShutdown)
        );
        f.pool.withdraw(&mut f.ledger, &f.alice, 10 * ONE, &f.alice, true, 2).unwrap();
    }

    #[test]
    fn test_fund_is_owner_only() {
        let mut f = fixture();
        assert_eq!(
            f.pool.fund(&mut f.ledger, &f.alice, &f.crv, ONE, 0),
            Err(StakeflowError::Unauthorized)
        );
        assert_eq!(
            f.pool.fund(&mut f.ledger, &f.owner, &TokenId::from_label("X"), ONE, 0),
            Err(StakeflowError::UnknownRewardToken(TokenId::from_label("X")))
        );
    }

    #[test]
    fn test_failed_transfer_rolls_back() {
        let mut f = fixture();
        let broke = AccountId::from_label("broke");
        let before = f.pool.clone();
        let err = f.pool.deposit(&mut f.ledger, &broke, 10 * ONE, DAY).unwrap_err();
        assert!(matches!(err, StakeflowError::TransferFailed { .. }));
        assert_eq!(f.pool, before);
    }

    #[test]
    fn test_clock_regression_rejected() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 10 * ONE, DAY).unwrap();
        assert!(matches!(
            f.pool.deposit(&mut f.ledger, &f.alice, 10 * ONE, DAY - 1),
            Err(StakeflowError::ClockRegression { .. })
        ));
    }

    #[test]
    fn test_recover_token_protects_pool_tokens() {
        let mut f = fixture();
        let stray = TokenId::from_label("STRAY");
        f.ledger.mint(&stray, f.pool.address(), 42).unwrap();
        assert_eq!(
            f.pool.recover_token(&mut f.ledger, &f.owner, &f.lp, 1, 0),
            Err(StakeflowError::ProtectedToken(f.lp))
        );
        assert_eq!(
            f.pool.recover_token(&mut f.ledger, &f.owner, &f.crv, 1, 0),
            Err(StakeflowError::ProtectedToken(f.crv))
        );
        f.pool.recover_token(&mut f.ledger, &f.owner, &stray, 42, 0).unwrap();
        assert_eq!(f.ledger.balance_of(&stray, &f.owner), 42);
    }

    #[test]
    fn test_renew_from_holdings() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 100 * ONE, 0).unwrap();
        f.pool.fund(&mut f.ledger, &f.owner, &f.crv, 1_000 * ONE, 0).unwrap();
        assert!(matches!(
            f.pool.renew(&f.ledger, 5 * DAY),
            Err(StakeflowError::PeriodNotYetExpired { .. })
        ));

        // Once the first period is paid out the pool holds only dust.
        f.pool.claim(&mut f.ledger, &f.alice, 10 * DAY).unwrap();
        assert!(matches!(
            f.pool.renew(&f.ledger, 10 * DAY + 1),
            Err(StakeflowError::InsufficientFundingForRenewal { .. })
        ));

        let extra = 2_000 * ONE;
        f.ledger.transfer(&f.crv, &f.owner, f.pool.address(), extra).unwrap();
        let plan = f.pool.renew(&f.ledger, 10 * DAY + 1).unwrap();
        assert_eq!(plan, vec![(f.crv, 1)]);
        assert_eq!(f.pool.stream(&f.crv).unwrap().period_finish, 20 * DAY);
    }

    #[test]
    fn test_renew_ignores_unclaimed_rewards() {
        let mut f = fixture();
        f.pool.deposit(&mut f.ledger, &f.alice, 100 * ONE, 0).unwrap();
        f.pool.fund(&mut f.ledger, &f.owner, &f.crv, 1_000 * ONE, 0).unwrap();

        // Alice has not claimed, so the whole balance is still owed to her.
        assert!(matches!(
            f.pool.renew(&f.ledger, 10 * DAY + 1),
            Err(StakeflowError::InsufficientFundingForRenewal { .. })
        ));

        f.ledger.transfer(&f.crv, &f.owner, f.pool.address(), 1_000 * ONE).unwrap();
        assert_eq!(f.pool.renew(&f.ledger, 10 * DAY + 1).unwrap(), vec![(f.crv, 1)]);

        let claimed = f.pool.claim(&mut f.ledger, &f.alice, 20 * DAY).unwrap();
        let total = claimed.iter().map(|(_, a)| *a).sum::<Amount>();
        assert!(total <= 2_000 * ONE);
        assert!(total > 1_999 * ONE);
        assert_eq!(f.ledger.balance_of(&f.crv, &f.alice), total);
    }
}
