//! Checkpointed pool atop an external reward position
//!
//! Principal is parked with a [`RewardSource`]. Rewards are harvested at
//! most once per cooldown and each harvest becomes a checkpoint per reward
//! token. Claims replay the account's deposit and withdrawal history
//! against those checkpoints.

use super::{transact, Outbox, PoolGuard, Staged};
use crate::checkpoint::{self, CheckpointLog, TransactionEvent};
use crate::config::CheckpointConfig;
use crate::curve::DerivedEmission;
use crate::source::RewardSource;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::ledger::TokenLedger;
use stakeflow_core::math;
use stakeflow_core::types::{AccountId, Amount, Timestamp, TokenAmounts, TokenId};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Balance and append-only history of one participant
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryAccount {
    pub balance: Amount,
    pub deposits: Vec<TransactionEvent>,
    pub withdrawals: Vec<TransactionEvent>,
    pub claimed: HashMap<TokenId, Amount>,
}

impl HistoryAccount {
    pub fn claimed(&self, token: &TokenId) -> Amount {
        self.claimed.get(token).copied().unwrap_or(0)
    }

    fn owed(&self, token: &TokenId, log: &CheckpointLog) -> Result<Amount> {
        checkpoint::earned(log.as_slice(), &self.deposits, &self.withdrawals, self.claimed(token))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointPool {
    address: AccountId,
    staking_token: TokenId,
    guard: PoolGuard,
    harvest_cooldown: u64,
    last_harvest: Option<Timestamp>,
    max_reward_tokens: usize,
    checkpoints: IndexMap<TokenId, CheckpointLog>,
    emission: Option<DerivedEmission>,
    total_supply: Amount,
    accounts: HashMap<AccountId, HistoryAccount>,
    paid_out: HashMap<TokenId, Amount>,
}

pub(crate) struct Savepoint {
    guard: PoolGuard,
    total_supply: Amount,
    accounts: Vec<(AccountId, Option<HistoryAccount>)>,
    paid_out: HashMap<TokenId, Amount>,
}

impl Staged for CheckpointPool {
    type Savepoint = Savepoint;

    fn capture(&self, accounts: &[AccountId]) -> Savepoint {
        Savepoint {
            guard: self.guard.clone(),
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

impl CheckpointPool {
    pub fn new(
        address: AccountId,
        owner: AccountId,
        staking_token: TokenId,
        config: &CheckpointConfig,
        max_reward_tokens: usize,
        now: Timestamp,
    ) -> Self {
        Self {
            address,
            staking_token,
            guard: PoolGuard::new(owner, now),
            harvest_cooldown: config.harvest_cooldown,
            last_harvest: None,
            max_reward_tokens,
            checkpoints: IndexMap::new(),
            emission: None,
            total_supply: 0,
            accounts: HashMap::new(),
            paid_out: HashMap::new(),
        }
    }

    pub fn address(&self) -> &AccountId {
        &self.address
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).map_or(0, |a| a.balance)
    }

    pub fn account(&self, account: &AccountId) -> Option<&HistoryAccount> {
        self.accounts.get(account)
    }

    pub fn checkpoints(&self, token: &TokenId) -> Result<&CheckpointLog> {
        self.checkpoints
            .get(token)
            .ok_or(StakeflowError::UnknownRewardToken(*token))
    }

    pub fn last_harvest(&self) -> Option<Timestamp> {
        self.last_harvest
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
        if self.checkpoints.contains_key(&token) {
            return Err(StakeflowError::DuplicateRewardToken(token));
        }
        if self.checkpoints.len() >= self.max_reward_tokens {
            return Err(StakeflowError::RewardTokenCapExceeded {
                cap: self.max_reward_tokens,
            });
        }
        self.checkpoints.insert(token, CheckpointLog::new());
        self.guard.observe(now);
        info!(%token, "reward token added");
        Ok(())
    }

    /// Pay a derived token on every claim of the emission's base token
    pub fn set_emission(&mut self, caller: &AccountId, emission: DerivedEmission) -> Result<()> {
        self.guard.ensure_owner(caller)?;
        if !self.checkpoints.contains_key(&emission.base_token) {
            return Err(StakeflowError::UnknownRewardToken(emission.base_token));
        }
        let derived = emission.derived_token;
        if derived == self.staking_token || self.checkpoints.contains_key(&derived) {
            return Err(StakeflowError::ProtectedToken(derived));
        }
        info!(base = %emission.base_token, %derived, "derived emission configured");
        self.emission = Some(emission);
        Ok(())
    }

    /// Harvest if the cooldown has elapsed; returns whether it did
    pub fn checkpointize(
        &mut self,
        ledger: &mut dyn TokenLedger,
        source: &mut dyn RewardSource,
        now: Timestamp,
    ) -> Result<bool> {
        self.guard.check_clock(now)?;
        let harvested = self.harvest(ledger, source, now)?;
        self.guard.observe(now);
        Ok(harvested)
    }

    /// Deposit `amount` into the external position.
    ///
    /// Harvests first when due. That checkpoint stays recorded even if the
    /// deposit transfer then fails.
    pub fn deposit(
        &mut self,
        ledger: &mut dyn TokenLedger,
        source: &mut dyn RewardSource,
        account: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        self.guard.check_clock(now)?;
        self.guard.ensure_live()?;
        if amount == 0 {
            return Err(StakeflowError::ZeroAmount);
        }

        self.harvest(ledger, source, now)?;
        self.guard.observe(now);

        let custodian = source.custodian();
        transact(self, &[*account], ledger, |pool, outbox| {
            let entry = pool.accounts.entry(*account).or_default();
            entry.balance = math::checked_add(entry.balance, amount)?;
            entry.deposits.push(TransactionEvent::new(amount, now));
            pool.total_supply = math::checked_add(pool.total_supply, amount)?;
            outbox.push(pool.staking_token, *account, custodian, amount);
            debug!(%account, amount, "deposited");
            Ok(())
        })
    }

    /// Withdraw `amount` from the position to `receiver`, optionally claiming.
    ///
    /// Harvests first when due; a failed release rolls back the withdrawal
    /// but keeps that checkpoint.
    pub fn withdraw(
        &mut self,
        ledger: &mut dyn TokenLedger,
        source: &mut dyn RewardSource,
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

        self.harvest(ledger, source, now)?;
        self.guard.observe(now);

        let savepoint = self.capture(&[*account]);
        let mut outbox = Outbox::default();
        let claimed = match self.stage_withdraw(account, amount, take_rewards, now, &mut outbox) {
            Ok(claimed) => claimed,
            Err(err) => {
                self.restore(savepoint);
                return Err(err);
            }
        };
        let executed = match outbox.execute(ledger) {
            Ok(executed) => executed,
            Err(err) => {
                self.restore(savepoint);
                return Err(err);
            }
        };

        match source.withdraw_position(ledger, &self.address, amount, receiver) {
            Ok(delivered) => {
                if delivered != amount {
                    warn!(requested = amount, delivered, "position released a different amount");
                }
                debug!(%account, %receiver, amount, "withdrew");
                Ok(claimed)
            }
            Err(err) => {
                executed.revert(ledger);
                self.restore(savepoint);
                Err(err)
            }
        }
    }

    /// Pay everything `account` is owed, harvesting first when due.
    ///
    /// The harvest is kept even if a payout transfer fails.
    pub fn claim(
        &mut self,
        ledger: &mut dyn TokenLedger,
        source: &mut dyn RewardSource,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<TokenAmounts> {
        self.guard.check_clock(now)?;
        self.harvest(ledger, source, now)?;
        self.guard.observe(now);
        transact(self, &[*account], ledger, |pool, outbox| pool.stage_claim(account, now, outbox))
    }

    /// Harvest when due, then report what `account` could claim
    pub fn earned(
        &mut self,
        ledger: &mut dyn TokenLedger,
        source: &mut dyn RewardSource,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<TokenAmounts> {
        self.checkpointize(ledger, source, now)?;
        self.pending(account, now)
    }

    /// What `account` could claim from checkpoints recorded so far
    pub fn pending(&self, account: &AccountId, now: Timestamp) -> Result<TokenAmounts> {
        let default = HistoryAccount::default();
        let entry = self.accounts.get(account).unwrap_or(&default);

        let mut owed = Vec::with_capacity(self.checkpoints.len() + 1);
        let mut base = 0;
        for (token, log) in &self.checkpoints {
            let amount = entry.owed(token, log)?;
            if self.is_base(token) {
                base = amount;
            }
            owed.push((*token, amount));
        }
        if let Some(emission) = &self.emission {
            owed.push((emission.derived_token, emission.amount_for(base, now)?));
        }
        Ok(owed)
    }

    pub fn set_paused(&mut self, caller: &AccountId, paused: bool) -> Result<()> {
        self.guard.set_paused(caller, paused)
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
        let derived = self.emission.as_ref().map(|e| e.derived_token);
        if *token == self.staking_token || self.checkpoints.contains_key(token) || derived == Some(*token) {
            return Err(StakeflowError::ProtectedToken(*token));
        }
        let to = *caller;
        transact(self, &[], ledger, |pool, outbox| {
            outbox.push(*token, pool.address, to, amount);
            pool.guard.observe(now);
            Ok(())
        })
    }

    fn is_base(&self, token: &TokenId) -> bool {
        self.emission.as_ref().is_some_and(|e| e.base_token == *token)
    }

    fn harvest(
        &mut self,
        ledger: &mut dyn TokenLedger,
        source: &mut dyn RewardSource,
        now: Timestamp,
    ) -> Result<bool> {
        if let Some(last) = self.last_harvest {
            if now < last.saturating_add(self.harvest_cooldown) {
                return Ok(false);
            }
        }

        let before: Vec<Amount> = self
            .checkpoints
            .keys()
            .map(|token| ledger.balance_of(token, &self.address))
            .collect();
        source.harvest(ledger, &self.address)?;

        let mut received = Vec::new();
        for ((token, log), before) in self.checkpoints.iter_mut().zip(before) {
            let delta = ledger.balance_of(token, &self.address).saturating_sub(before);
            if log.record(self.total_supply, now, delta)? {
                received.push((*token, delta));
            }
        }
        self.last_harvest = Some(now);
        info!(now, supply = self.total_supply, checkpoints = received.len(), "harvested");
        Ok(true)
    }

    fn stage_withdraw(
        &mut self,
        account: &AccountId,
        amount: Amount,
        take_rewards: bool,
        now: Timestamp,
        outbox: &mut Outbox,
    ) -> Result<TokenAmounts> {
        let entry = self.accounts.entry(*account).or_default();
        entry.balance = math::checked_sub(entry.balance, amount)?;
        entry.withdrawals.push(TransactionEvent::new(amount, now));
        self.total_supply = math::checked_sub(self.total_supply, amount)?;

        if take_rewards {
            self.stage_claim(account, now, outbox)
        } else {
            Ok(Vec::new())
        }
    }

    fn stage_claim(&mut self, account: &AccountId, now: Timestamp, outbox: &mut Outbox) -> Result<TokenAmounts> {
        let owed = self.pending(account, now)?;
        let derived = self.emission.as_ref().map(|e| e.derived_token);
        let entry = self.accounts.entry(*account).or_default();

        for (token, amount) in &owed {
            if *amount == 0 {
                continue;
            }
            // The derived token is paid per claim and never replayed.
            if Some(*token) != derived {
                let claimed = entry.claimed.entry(*token).or_insert(0);
                *claimed = math::checked_add(*claimed, *amount)?;
            }
            let paid = self.paid_out.entry(*token).or_insert(0);
            *paid = math::checked_add(*paid, *amount)?;
            outbox.push(*token, self.address, *account, *amount);
            info!(%account, %token, amount, "reward paid");
        }
        Ok(owed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::RewardCurve;
    use crate::source::GaugeSource;
    use stakeflow_core::ledger::MemoryLedger;
    use stakeflow_core::math::ONE;

    struct Fixture {
        ledger: MemoryLedger,
        source: GaugeSource,
        pool: CheckpointPool,
        owner: AccountId,
        alice: AccountId,
        bob: AccountId,
        gauge: AccountId,
        lp: TokenId,
        crv: TokenId,
    }

    fn fixture(cooldown: u64) -> Fixture {
        let owner = AccountId::from_label("owner");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        let gauge = AccountId::from_label("gauge");
        let lp = TokenId::from_label("LP");
        let crv = TokenId::from_label("CRV");
        let config = CheckpointConfig {
            harvest_cooldown: cooldown,
        };
        let mut pool = CheckpointPool::new(AccountId::from_label("pool"), owner, lp, &config, 5, 0);
        pool.add_reward_token(&owner, crv, 0).unwrap();

        let mut ledger = MemoryLedger::new();
        ledger.mint(&lp, &alice, 1_000).unwrap();
        ledger.mint(&lp, &bob, 1_000).unwrap();
        ledger.mint(&crv, &gauge, 1_000_000).unwrap();
        Fixture {
            ledger,
            source: GaugeSource::new(gauge, lp),
            pool,
            owner,
            alice,
            bob,
            gauge,
            lp,
            crv,
        }
    }

    fn owed(pool: &CheckpointPool, account: &AccountId, token: &TokenId, now: Timestamp) -> Amount {
        pool.pending(account, now)
            .unwrap()
            .into_iter()
            .find(|(t, _)| t == token)
            .map_or(0, |(_, a)| a)
    }

    #[test]
    fn test_deposit_anchors_and_earns_full_interval() {
        let mut f = fixture(0);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 200, 0).unwrap();
        assert_eq!(f.pool.checkpoints(&f.crv).unwrap().len(), 1);
        assert_eq!(f.ledger.balance_of(&f.lp, &f.gauge), 200);

        f.source.accrue(f.crv, 50).unwrap();
        assert!(f.pool.checkpointize(&mut f.ledger, &mut f.source, 100).unwrap());
        assert_eq!(owed(&f.pool, &f.alice, &f.crv, 100), 50);
    }

    #[test]
    fn test_cooldown_limits_harvests() {
        let mut f = fixture(3_600);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 100, 0).unwrap();
        f.source.accrue(f.crv, 10).unwrap();
        assert!(!f.pool.checkpointize(&mut f.ledger, &mut f.source, 100).unwrap());
        assert_eq!(f.source.pending(&f.crv), 10);
        assert!(f.pool.checkpointize(&mut f.ledger, &mut f.source, 3_600).unwrap());
        assert_eq!(f.pool.last_harvest(), Some(3_600));
    }

    #[test]
    fn test_late_depositor_is_prorated() {
        let mut f = fixture(0);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 100, 0).unwrap();
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.bob, 100, 0).unwrap();
        f.source.accrue(f.crv, 100).unwrap();
        f.pool.checkpointize(&mut f.ledger, &mut f.source, 100).unwrap();

        // Bob adds another 100 halfway through the next interval.
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.bob, 100, 150).unwrap();
        f.source.accrue(f.crv, 300).unwrap();
        f.pool.checkpointize(&mut f.ledger, &mut f.source, 200).unwrap();

        // Second checkpoint: supply 300, alice 100, bob 100 + 50 prorated.
        assert_eq!(owed(&f.pool, &f.alice, &f.crv, 200), 50 + 100);
        assert_eq!(owed(&f.pool, &f.bob, &f.crv, 200), 50 + 150);
    }

    #[test]
    fn test_claim_is_not_repeated() {
        let mut f = fixture(0);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 200, 0).unwrap();
        f.source.accrue(f.crv, 50).unwrap();

        let claimed = f.pool.claim(&mut f.ledger, &mut f.source, &f.alice, 100).unwrap();
        assert_eq!(claimed, vec![(f.crv, 50)]);
        assert_eq!(f.ledger.balance_of(&f.crv, &f.alice), 50);

        let again = f.pool.claim(&mut f.ledger, &mut f.source, &f.alice, 200).unwrap();
        assert_eq!(again, vec![(f.crv, 0)]);
        assert_eq!(f.pool.paid_out(&f.crv), 50);
    }

    #[test]
    fn test_withdraw_releases_position_to_receiver() {
        let mut f = fixture(0);
        let vault = AccountId::from_label("vault");
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 200, 0).unwrap();
        f.source.accrue(f.crv, 40).unwrap();

        let claimed = f
            .pool
            .withdraw(&mut f.ledger, &mut f.source, &f.alice, 150, &vault, true, 100)
            .unwrap();
        assert_eq!(claimed, vec![(f.crv, 40)]);
        assert_eq!(f.ledger.balance_of(&f.lp, &vault), 150);
        assert_eq!(f.pool.balance_of(&f.alice), 50);
        assert_eq!(f.pool.total_supply(), 50);
    }

    #[test]
    fn test_withdraw_checks_balance_before_harvest() {
        let mut f = fixture(0);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 10, 0).unwrap();
        f.source.accrue(f.crv, 5).unwrap();
        let err = f
            .pool
            .withdraw(&mut f.ledger, &mut f.source, &f.alice, 11, &f.alice, false, 10)
            .unwrap_err();
        assert!(matches!(err, StakeflowError::InsufficientBalance { .. }));
        assert_eq!(f.source.pending(&f.crv), 5);
    }

    #[test]
    fn test_failed_release_rolls_back() {
        let mut f = fixture(0);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 100, 0).unwrap();
        f.source.accrue(f.crv, 20).unwrap();
        f.pool.checkpointize(&mut f.ledger, &mut f.source, 10).unwrap();

        // The gauge loses the principal behind the pool's back.
        let thief = AccountId::from_label("thief");
        f.ledger.transfer(&f.lp, &f.gauge, &thief, 100).unwrap();

        let before = f.pool.clone();
        let err = f
            .pool
            .withdraw(&mut f.ledger, &mut f.source, &f.alice, 100, &f.alice, true, 10)
            .unwrap_err();
        assert!(matches!(err, StakeflowError::TransferFailed { .. }));
        assert_eq!(f.pool, before);
        assert_eq!(f.ledger.balance_of(&f.crv, &f.alice), 0);
        assert_eq!(f.ledger.balance_of(&f.crv, f.pool.address()), 20);
    }

    #[test]
    fn test_failed_deposit_keeps_harvest() {
        let mut f = fixture(0);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 100, 0).unwrap();
        f.source.accrue(f.crv, 20).unwrap();

        let broke = AccountId::from_label("broke");
        let err = f
            .pool
            .deposit(&mut f.ledger, &mut f.source, &broke, 50, 10)
            .unwrap_err();
        assert!(matches!(err, StakeflowError::TransferFailed { .. }));
        assert_eq!(f.pool.checkpoints(&f.crv).unwrap().len(), 2);
        assert_eq!(f.pool.last_harvest(), Some(10));
        assert_eq!(f.pool.balance_of(&broke), 0);
        assert_eq!(f.pool.total_supply(), 100);
        assert_eq!(owed(&f.pool, &f.alice, &f.crv, 10), 20);
    }

    #[test]
    fn test_harvesting_earned_vs_pending() {
        let mut f = fixture(0);
        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 100, 0).unwrap();
        f.source.accrue(f.crv, 30).unwrap();

        assert_eq!(owed(&f.pool, &f.alice, &f.crv, 50), 0);
        let earned = f.pool.earned(&mut f.ledger, &mut f.source, &f.alice, 50).unwrap();
        assert_eq!(earned, vec![(f.crv, 30)]);
        assert_eq!(owed(&f.pool, &f.alice, &f.crv, 50), 30);
    }

    #[test]
    fn test_derived_emission_paid_with_base() {
        let mut f = fixture(0);
        let cvx = TokenId::from_label("CVX");
        f.ledger.mint(&cvx, f.pool.address(), 1_000).unwrap();
        let emission = DerivedEmission {
            base_token: f.crv,
            derived_token: cvx,
            curve: RewardCurve::new(2 * ONE, ONE / 2).unwrap(),
            genesis: 0,
        };
        assert_eq!(
            f.pool.set_emission(&f.alice, emission.clone()),
            Err(StakeflowError::Unauthorized)
        );
        f.pool.set_emission(&f.owner, emission).unwrap();

        f.pool.deposit(&mut f.ledger, &mut f.source, &f.alice, 100, 0).unwrap();
        f.source.accrue(f.crv, 80).unwrap();
        let claimed = f.pool.claim(&mut f.ledger, &mut f.source, &f.alice, 100).unwrap();
        // Day one: 2 * 0.5 = 1x
        assert_eq!(claimed, vec![(f.crv, 80), (cvx, 80)]);
        assert_eq!(f.ledger.balance_of(&cvx, &f.alice), 80);

        // The derived token is not replayed on the next claim.
        let again = f.pool.claim(&mut f.ledger, &mut f.source, &f.alice, 200).unwrap();
        assert_eq!(again, vec![(f.crv, 0), (cvx, 0)]);
    }

    #[test]
    fn test_reward_token_rules() {
        let mut f = fixture(0);
        assert_eq!(
            f.pool.add_reward_token(&f.owner, f.crv, 0),
            Err(StakeflowError::DuplicateRewardToken(f.crv))
        );
        assert_eq!(
            f.pool.add_reward_token(&f.owner, f.lp, 0),
            Err(StakeflowError::ProtectedToken(f.lp))
        );
        for label in ["A", "B", "C", "D"] {
            f.pool.add_reward_token(&f.owner, TokenId::from_label(label), 0).unwrap();
        }
        assert_eq!(
            f.pool.add_reward_token(&f.owner, TokenId::from_label("E"), 0),
            Err(StakeflowError::RewardTokenCapExceeded { cap: 5 })
        );
    }
}
