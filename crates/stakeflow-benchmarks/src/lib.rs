//! # Stakeflow Benchmarks
//!
//! Fixtures for the criterion benches of the hot accounting paths.
//!
//! | Path | Fixture |
//! |------|---------|
//! | Stream settlement | [`fixtures::funded_stream`] |
//! | Checkpoint replay | [`fixtures::checkpoint_history`] |
//! | Multi-reward claim (5 tokens) | [`fixtures::busy_pool`] |
//! | Derived emission factor | [`fixtures::curve`] |
//!
//! ## Usage
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench --package stakeflow-benchmarks
//!
//! # Run one group
//! cargo bench --package stakeflow-benchmarks -- checkpoint
//! ```

pub mod fixtures {
    use stakeflow_core::error::Result;
    use stakeflow_core::ledger::MemoryLedger;
    use stakeflow_core::math::ONE;
    use stakeflow_core::types::{AccountId, Timestamp, TokenId};
    use stakeflow_rewards::accumulator::{RewardStream, NEW_REWARD_RATIO};
    use stakeflow_rewards::checkpoint::{Checkpoint, TransactionEvent};
    use stakeflow_rewards::config::RewardsConfig;
    use stakeflow_rewards::curve::RewardCurve;
    use stakeflow_rewards::pool::MultiRewardPool;
    use stakeflow_rewards::MAX_REWARD_TOKENS;

    pub const DAY: u64 = 86_400;

    /// A week-long stream funded at genesis
    pub fn funded_stream() -> Result<RewardStream> {
        let mut stream = RewardStream::new(TokenId::from_label("bench-reward"), 7 * DAY, 0)?;
        stream.fund(1_000_000 * ONE, 1_000 * ONE, 0, NEW_REWARD_RATIO)?;
        Ok(stream)
    }

    /// `len` hourly checkpoints and a deposit/withdrawal history across them
    pub fn checkpoint_history(len: usize) -> (Vec<Checkpoint>, Vec<TransactionEvent>, Vec<TransactionEvent>) {
        let checkpoints = (0..len)
            .map(|i| Checkpoint {
                total_supply: 10_000 + (i as u128 % 7) * 100,
                timestamp: i as Timestamp * 3_600,
                reward_amount: if i == 0 { 0 } else { 1_000 },
            })
            .collect();
        let deposits = (0..len / 4)
            .map(|i| TransactionEvent::new(100, i as Timestamp * 4 * 3_600 + 1_800))
            .collect();
        let withdrawals = (0..len / 8)
            .map(|i| TransactionEvent::new(50, i as Timestamp * 8 * 3_600 + 2_700))
            .collect();
        (checkpoints, deposits, withdrawals)
    }

    /// A multi-reward pool with every reward slot funded and `holders` stakers
    pub fn busy_pool(holders: usize) -> Result<(MultiRewardPool, MemoryLedger, Vec<AccountId>)> {
        let owner = AccountId::from_label("bench-owner");
        let stake = TokenId::from_label("bench-stake");
        let mut pool = MultiRewardPool::new(
            AccountId::from_label("bench-pool"),
            owner,
            stake,
            RewardsConfig::default(),
            0,
        );
        let mut ledger = MemoryLedger::new();

        for i in 0..MAX_REWARD_TOKENS {
            let token = TokenId::from_label(&format!("bench-reward-{i}"));
            pool.add_reward_token(&owner, token, 0)?;
            ledger.mint(&token, &owner, 1_000_000 * ONE)?;
        }
        let accounts: Vec<AccountId> = (0..holders)
            .map(|i| AccountId::from_label(&format!("bench-holder-{i}")))
            .collect();
        for account in &accounts {
            ledger.mint(&stake, account, 1_000 * ONE)?;
            pool.deposit(&mut ledger, account, 100 * ONE, 0)?;
        }
        for token in pool.reward_tokens() {
            pool.fund(&mut ledger, &owner, &token, 100_000 * ONE, 0)?;
        }
        Ok((pool, ledger, accounts))
    }

    /// 2x amplifier decaying 0.1% per day
    pub fn curve() -> Result<RewardCurve> {
        RewardCurve::new(2 * ONE, ONE - ONE / 1_000)
    }
}
