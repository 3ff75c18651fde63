//! Pool variants and the plumbing they share
//!
//! Every mutating pool call follows the same shape:
//!
//! 1. check the clock and the call's preconditions,
//! 2. settle rewards for the affected account,
//! 3. update balances and weights,
//! 4. execute the staged token transfers.
//!
//! Steps 2-4 run against a savepoint. If a transfer fails the pool state is
//! restored and transfers already made in the same call are reversed.

pub mod checkpointed;
pub mod locked;
pub mod multi;

pub use checkpointed::{CheckpointPool, HistoryAccount};
pub use locked::{LockedAccount, LockedPool};
pub use multi::MultiRewardPool;

use crate::accumulator::RewardStream;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stakeflow_core::error::{Result, StakeflowError};
use stakeflow_core::ledger::TokenLedger;
use stakeflow_core::types::{AccountId, Amount, Timestamp, TokenId};
use tracing::{info, warn};

/// Ownership, pause flag and the latest observed time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolGuard {
    owner: AccountId,
    paused: bool,
    last_seen: Timestamp,
}

impl PoolGuard {
    pub fn new(owner: AccountId, now: Timestamp) -> Self {
        Self {
            owner,
            paused: false,
            last_seen: now,
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn last_seen(&self) -> Timestamp {
        self.last_seen
    }

    pub fn ensure_owner(&self, caller: &AccountId) -> Result<()> {
        if caller != &self.owner {
            return Err(StakeflowError::Unauthorized);
        }
        Ok(())
    }

    /// New stake is refused while paused
    pub fn ensure_live(&self) -> Result<()> {
        if self.paused {
            return Err(StakeflowError::PoolShutdown);
        }
        Ok(())
    }

    pub fn check_clock(&self, now: Timestamp) -> Result<()> {
        if now < self.last_seen {
            return Err(StakeflowError::ClockRegression {
                now,
                last_seen: self.last_seen,
            });
        }
        Ok(())
    }

    pub(crate) fn observe(&mut self, now: Timestamp) {
        self.last_seen = self.last_seen.max(now);
    }

    pub(crate) fn set_paused(&mut self, caller: &AccountId, paused: bool) -> Result<()> {
        self.ensure_owner(caller)?;
        self.paused = paused;
        info!(paused, "pool pause flag updated");
        Ok(())
    }
}

/// Reward streams of one pool, in registration order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStreams {
    streams: IndexMap<TokenId, RewardStream>,
    cap: usize,
}

impl RewardStreams {
    pub fn new(cap: usize) -> Self {
        Self {
            streams: IndexMap::new(),
            cap,
        }
    }

    pub fn add(&mut self, token: TokenId, duration: u64, now: Timestamp) -> Result<()> {
        if self.streams.contains_key(&token) {
            return Err(StakeflowError::DuplicateRewardToken(token));
        }
        if self.streams.len() >= self.cap {
            return Err(StakeflowError::RewardTokenCapExceeded { cap: self.cap });
        }
        self.streams.insert(token, RewardStream::new(token, duration, now)?);
        Ok(())
    }

    pub fn get(&self, token: &TokenId) -> Result<&RewardStream> {
        self.streams
            .get(token)
            .ok_or(StakeflowError::UnknownRewardToken(*token))
    }

    pub fn get_mut(&mut self, token: &TokenId) -> Result<&mut RewardStream> {
        self.streams
            .get_mut(token)
            .ok_or(StakeflowError::UnknownRewardToken(*token))
    }

    pub fn contains(&self, token: &TokenId) -> bool {
        self.streams.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RewardStream> {
        self.streams.values()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenId> {
        self.streams.keys()
    }

    /// Settle every stream against `total_weight`
    pub fn settle_all(&mut self, total_weight: Amount, now: Timestamp) -> Result<()> {
        for stream in self.streams.values_mut() {
            stream.settle(total_weight, now)?;
        }
        Ok(())
    }

    /// Extend every expired stream whose free holdings cover the renewal.
    ///
    /// Streams are settled first. Holdings still owed to stakers or queued
    /// (see [`RewardStream::outstanding`]) do not count towards the
    /// requirement. All expired streams are checked before any is extended;
    /// one short stream fails the whole renewal.
    pub fn renew(
        &mut self,
        total_weight: Amount,
        now: Timestamp,
        holdings: impl Fn(&TokenId) -> Amount,
        paid_out: impl Fn(&TokenId) -> Amount,
    ) -> Result<Vec<(TokenId, u64)>> {
        let mut next = self.clone();
        next.settle_all(total_weight, now)?;

        let mut plan = Vec::new();
        for stream in next.streams.values().filter(|s| s.is_expired(now)) {
            let (periods, required) = stream.renewal_requirement(now)?;
            let committed = stream.outstanding(paid_out(&stream.token))?;
            let available = holdings(&stream.token).saturating_sub(committed);
            if available < required {
                warn!(token = %stream.token, required, available, committed, "renewal underfunded");
                return Err(StakeflowError::InsufficientFundingForRenewal {
                    token: stream.token,
                    required,
                    available,
                });
            }
            plan.push((stream.token, periods));
        }

        if plan.is_empty() {
            if let Some(stream) = self.streams.values().next() {
                return Err(StakeflowError::PeriodNotYetExpired {
                    token: stream.token,
                    period_finish: stream.period_finish,
                });
            }
            return Ok(plan);
        }

        for (token, periods) in &plan {
            next.get_mut(token)?.extend(*periods)?;
        }
        *self = next;

        for (token, periods) in &plan {
            info!(%token, periods, "reward period renewed");
        }
        Ok(plan)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Transfer {
    token: TokenId,
    from: AccountId,
    to: AccountId,
    amount: Amount,
}

/// Token transfers staged by a pool call, executed after bookkeeping
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    transfers: Vec<Transfer>,
}

impl Outbox {
    pub(crate) fn push(&mut self, token: TokenId, from: AccountId, to: AccountId, amount: Amount) {
        if amount > 0 {
            self.transfers.push(Transfer {
                token,
                from,
                to,
                amount,
            });
        }
    }

    /// Run the transfers in order. On failure the ones already made are
    /// reversed before the error is returned.
    pub(crate) fn execute(self, ledger: &mut dyn TokenLedger) -> Result<Executed> {
        let mut done = Vec::with_capacity(self.transfers.len());
        for transfer in self.transfers {
            match ledger.transfer(&transfer.token, &transfer.from, &transfer.to, transfer.amount) {
                Ok(()) => done.push(transfer),
                Err(err) => {
                    Executed(done).revert(ledger);
                    return Err(err);
                }
            }
        }
        Ok(Executed(done))
    }
}

/// Transfers that went through and can still be reversed
#[derive(Debug)]
pub(crate) struct Executed(Vec<Transfer>);

impl Executed {
    pub(crate) fn revert(self, ledger: &mut dyn TokenLedger) {
        for transfer in self.0.into_iter().rev() {
            if let Err(err) =
                ledger.transfer(&transfer.token, &transfer.to, &transfer.from, transfer.amount)
            {
                warn!(token = %transfer.token, amount = transfer.amount, %err, "transfer reversal failed");
            }
        }
    }
}

/// Pool state that can be rolled back around a call
pub(crate) trait Staged {
    type Savepoint;

    fn capture(&self, accounts: &[AccountId]) -> Self::Savepoint;

    fn restore(&mut self, savepoint: Self::Savepoint);
}

/// Run `op` against a savepoint, then execute its staged transfers.
pub(crate) fn transact<P, T>(
    pool: &mut P,
    accounts: &[AccountId],
    ledger: &mut dyn TokenLedger,
    op: impl FnOnce(&mut P, &mut Outbox) -> Result<T>,
) -> Result<T>
where
    P: Staged,
{
    let savepoint = pool.capture(accounts);
    let mut outbox = Outbox::default();
    let result = op(pool, &mut outbox).and_then(|value| outbox.execute(ledger).map(|_| value));
    if result.is_err() {
        pool.restore(savepoint);
    }
    result
}

/// Holdings of `token` at `pool`, excluding staked principal for the staking token
pub(crate) fn free_holdings(
    ledger: &dyn TokenLedger,
    pool: &AccountId,
    token: &TokenId,
    staking_token: &TokenId,
    staked: Amount,
) -> Amount {
    let held = ledger.balance_of(token, pool);
    if token == staking_token {
        held.saturating_sub(staked)
    } else {
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::NEW_REWARD_RATIO;
    use stakeflow_core::ledger::MemoryLedger;
    use stakeflow_core::math::ONE;

    const DAY: u64 = 86_400;

    #[test]
    fn test_guard_rejects_regression() {
        let mut guard = PoolGuard::new(AccountId::from_label("owner"), 100);
        assert!(guard.check_clock(100).is_ok());
        assert!(matches!(
            guard.check_clock(99),
            Err(StakeflowError::ClockRegression { now: 99, last_seen: 100 })
        ));
        guard.observe(50);
        assert_eq!(guard.last_seen(), 100);
    }

    #[test]
    fn test_guard_owner_and_pause() {
        let owner = AccountId::from_label("owner");
        let mut guard = PoolGuard::new(owner, 0);
        assert_eq!(
            guard.set_paused(&AccountId::from_label("mallory"), true),
            Err(StakeflowError::Unauthorized)
        );
        guard.set_paused(&owner, true).unwrap();
        assert_eq!(guard.ensure_live(), Err(StakeflowError::PoolShutdown));
    }

    #[test]
    fn test_streams_cap_and_duplicates() {
        let mut streams = RewardStreams::new(2);
        streams.add(TokenId::from_label("A"), DAY, 0).unwrap();
        assert_eq!(
            streams.add(TokenId::from_label("A"), DAY, 0),
            Err(StakeflowError::DuplicateRewardToken(TokenId::from_label("A")))
        );
        streams.add(TokenId::from_label("B"), DAY, 0).unwrap();
        assert_eq!(
            streams.add(TokenId::from_label("C"), DAY, 0),
            Err(StakeflowError::RewardTokenCapExceeded { cap: 2 })
        );
        assert!(streams.get(&TokenId::from_label("C")).is_err());
    }

    #[test]
    fn test_renew_checks_all_before_extending() {
        let a = TokenId::from_label("A");
        let b = TokenId::from_label("B");
        let mut streams = RewardStreams::new(5);
        streams.add(a, DAY, 0).unwrap();
        streams.add(b, DAY, 0).unwrap();
        streams.get_mut(&a).unwrap().fund(10 * ONE, ONE, 0, NEW_REWARD_RATIO).unwrap();
        streams.get_mut(&b).unwrap().fund(10 * ONE, ONE, 0, NEW_REWARD_RATIO).unwrap();

        let before = streams.clone();
        let err = streams
            .renew(ONE, 2 * DAY, |token| if *token == a { 100 * ONE } else { ONE }, |_| 0)
            .unwrap_err();
        assert!(matches!(err, StakeflowError::InsufficientFundingForRenewal { token, .. } if token == b));
        assert_eq!(streams, before);

        let plan = streams.renew(ONE, 2 * DAY, |_| 100 * ONE, |_| 0).unwrap();
        assert_eq!(plan, vec![(a, 2), (b, 2)]);
        assert_eq!(streams.get(&a).unwrap().period_finish, 3 * DAY);
    }

    #[test]
    fn test_renew_before_expiry() {
        let a = TokenId::from_label("A");
        let mut streams = RewardStreams::new(5);
        streams.add(a, DAY, 0).unwrap();
        streams.get_mut(&a).unwrap().fund(10 * ONE, ONE, 0, NEW_REWARD_RATIO).unwrap();
        assert!(matches!(
            streams.renew(ONE, DAY / 2, |_| 100 * ONE, |_| 0),
            Err(StakeflowError::PeriodNotYetExpired { .. })
        ));
    }

    #[test]
    fn test_outbox_reverts_on_failure() {
        let token = TokenId::from_label("CRV");
        let pool = AccountId::from_label("pool");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        let mut ledger = MemoryLedger::new();
        ledger.mint(&token, &pool, 100).unwrap();

        let mut outbox = Outbox::default();
        outbox.push(token, pool, alice, 60);
        outbox.push(token, pool, bob, 60);
        assert!(outbox.execute(&mut ledger).is_err());
        assert_eq!(ledger.balance_of(&token, &pool), 100);
        assert_eq!(ledger.balance_of(&token, &alice), 0);
    }

    #[test]
    fn test_free_holdings_excludes_stake() {
        let lp = TokenId::from_label("LP");
        let pool = AccountId::from_label("pool");
        let mut ledger = MemoryLedger::new();
        ledger.mint(&lp, &pool, 150).unwrap();
        assert_eq!(free_holdings(&ledger, &pool, &lp, &lp, 100), 50);
        assert_eq!(free_holdings(&ledger, &pool, &lp, &TokenId::from_label("X"), 100), 150);
    }
}
