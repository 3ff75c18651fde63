//! # Stakeflow Rewards - time-weighted reward accounting
//!
//! Three pool flavours share one set of accounting primitives:
//!
//! - **Multi-reward pool**: up to [`MAX_REWARD_TOKENS`] concurrent
//!   reward-per-share streams over plain staked balances
//! - **Locked pool**: stakes locked for a chosen duration earn with a lock
//!   multiplier that decays back to 1x once the lock expires
//! - **Checkpointed pool**: principal is parked in an external
//!   [`RewardSource`]; harvests become checkpoints and claims replay each
//!   account's deposit and withdrawal history against them
//!
//! ## Accrual
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  rps'     = rps + (min(now, finish) - last_update) * rate / weight   │
//! │  earned   = weight * (rps - rps_paid) / 1e18 + accrued               │
//! │  weight   = principal              (multi-reward pool)               │
//! │           = principal * multiplier (locked pool)                     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Funding
//!
//! | Case | Effect |
//! |------|--------|
//! | Period finished | New period at `amount / duration` |
//! | Emitted this period < 83% of amount plus queue | Leftover and queue folded into a fresh period |
//! | Otherwise | Amount queued for the next funding |
//!
//! Every pool call takes `now` explicitly and rejects a clock that runs
//! backwards. Token movements go through a [`TokenLedger`] after the
//! bookkeeping succeeds, and a failed transfer leaves the pool untouched.
//!
//! [`TokenLedger`]: stakeflow_core::ledger::TokenLedger

pub mod account;
pub mod accumulator;
pub mod checkpoint;
pub mod config;
pub mod curve;
pub mod lock;
pub mod pool;
pub mod snapshot;
pub mod source;
pub mod telemetry;

// Re-exports
pub use account::ParticipantAccount;
pub use accumulator::{FundingOutcome, RewardStream};
pub use checkpoint::{Checkpoint, CheckpointLog, TransactionEvent};
pub use config::{CheckpointConfig, CurveConfig, LockConfig, LoggingConfig, PoolConfig, RewardsConfig};
pub use curve::{DerivedEmission, RewardCurve};
pub use lock::{LockSchedule, LockedStake, StakeState};
pub use pool::{CheckpointPool, HistoryAccount, LockedAccount, LockedPool, MultiRewardPool, PoolGuard};
pub use source::{GaugeSource, RewardSource};
pub use telemetry::init_tracing;

/// Most reward tokens a single pool will distribute
pub const MAX_REWARD_TOKENS: usize = 5;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::pool::{CheckpointPool, LockedPool, MultiRewardPool};
    pub use crate::source::{GaugeSource, RewardSource};
    pub use crate::{LockSchedule, PoolConfig, RewardCurve, RewardsConfig};
    pub use stakeflow_core::prelude::*;
}
