//! Error types for Stakeflow accounting operations

use crate::types::{Amount, StakeId, Timestamp, TokenId};
use thiserror::Error;

/// Result type alias for Stakeflow operations
pub type Result<T> = std::result::Result<T, StakeflowError>;

/// Errors that can occur in Stakeflow operations
///
/// Every variant aborts the whole operation; pools never leave a partially
/// applied mutation behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakeflowError {
    // === Input Validation ===
    /// Amount must be non-zero
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// Not enough staked balance for the requested withdrawal
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Lock duration outside configured bounds
    #[error("Lock duration {duration}s outside [{min}s, {max}s]")]
    InvalidLockDuration { duration: u64, min: u64, max: u64 },

    // === Locked Stakes ===
    /// Withdrawal attempted before the stake expired
    #[error("Stake {id} is locked until {ends_at}")]
    StakeLocked { id: StakeId, ends_at: Timestamp },

    /// Unknown stake id for this owner
    #[error("Stake not found: {0}")]
    StakeNotFound(StakeId),

    /// Stake id already taken by another live stake of the same owner
    #[error("Duplicate stake id: {0}")]
    DuplicateStake(StakeId),

    // === Reward Streams ===
    /// Renewal attempted while the current period is still running
    #[error("Reward period for {token} runs until {period_finish}")]
    PeriodNotYetExpired { token: TokenId, period_finish: Timestamp },

    /// Reward token registration past the cap
    #[error("Reward token cap of {cap} reached")]
    RewardTokenCapExceeded { cap: usize },

    /// Reward token already registered
    #[error("Reward token already registered: {0}")]
    DuplicateRewardToken(TokenId),

    /// Reward token not registered with this pool
    #[error("Unknown reward token: {0}")]
    UnknownRewardToken(TokenId),

    /// Pool holdings do not cover the renewed periods
    #[error("Insufficient funding to renew {token}: need {required}, hold {available}")]
    InsufficientFundingForRenewal {
        token: TokenId,
        required: Amount,
        available: Amount,
    },

    /// Funding would push the reward rate past the sanity ceiling
    #[error("Reward rate {rate}/s exceeds ceiling {ceiling}/s")]
    RewardRateOverflow { rate: u128, ceiling: u128 },

    // === Access ===
    /// Caller is not allowed to perform the operation
    #[error("Unauthorized caller")]
    Unauthorized,

    /// Pool is paused for new stake
    #[error("Pool is shut down")]
    PoolShutdown,

    /// Token may not be recovered from the pool
    #[error("Token {0} is staked or distributed by this pool")]
    ProtectedToken(TokenId),

    // === Execution Context ===
    /// Caller supplied a time earlier than one already observed
    #[error("Clock regression: {now} is before {last_seen}")]
    ClockRegression { now: Timestamp, last_seen: Timestamp },

    /// External transfer failed
    #[error("Transfer of {amount} {token} failed: {reason}")]
    TransferFailed {
        token: TokenId,
        amount: Amount,
        reason: String,
    },

    // === Arithmetic ===
    /// Fixed-point overflow
    #[error("Arithmetic overflow")]
    MathOverflow,

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    // === General ===
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StakeflowError {
    /// Stable numeric code for callers that map errors across a boundary
    pub fn code(&self) -> u32 {
        match self {
            Self::ZeroAmount => 1001,
            Self::InsufficientBalance { .. } => 1002,
            Self::InvalidLockDuration { .. } => 1003,
            Self::StakeLocked { .. } => 2001,
            Self::StakeNotFound(_) => 2002,
            Self::DuplicateStake(_) => 2003,
            Self::PeriodNotYetExpired { .. } => 3001,
            Self::RewardTokenCapExceeded { .. } => 3002,
            Self::DuplicateRewardToken(_) | Self::UnknownRewardToken(_) => 3003,
            Self::InsufficientFundingForRenewal { .. } => 3004,
            Self::RewardRateOverflow { .. } => 3005,
            Self::Unauthorized => 4001,
            Self::PoolShutdown => 4002,
            Self::ProtectedToken(_) => 4003,
            Self::ClockRegression { .. } => 5001,
            Self::TransferFailed { .. } => 5002,
            Self::MathOverflow | Self::DivisionByZero => 6001,
            _ => 9999,
        }
    }

    /// Whether retrying later or with different parameters can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ZeroAmount
                | Self::InsufficientBalance { .. }
                | Self::InvalidLockDuration { .. }
                | Self::StakeLocked { .. }
                | Self::PeriodNotYetExpired { .. }
                | Self::InsufficientFundingForRenewal { .. }
                | Self::RewardRateOverflow { .. }
                | Self::PoolShutdown
                | Self::TransferFailed { .. }
        )
    }
}
