//! # Stakeflow Core
//!
//! Shared building blocks for the Stakeflow reward-accounting pools:
//! - `types` - identifiers, amounts, timestamps
//! - `math` - exact fixed-point arithmetic at 1e18 precision
//! - `clock` - the execution context's notion of "now"
//! - `ledger` - the value-transfer boundary
//! - `error` - the error kinds every pool operation reports
//!
//! ## Fixed-point convention
//!
//! ```text
//!   amount  : u128 raw token units
//!   Fixed   : u128 scaled by 1e18       (1x multiplier = 1_000_000_000_000_000_000)
//!   a * b   : 256-bit intermediate, then / 1e18, rounding down
//! ```

pub mod clock;
pub mod error;
pub mod ledger;
pub mod math;
pub mod types;

pub use clock::*;
pub use error::*;
pub use ledger::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{Result, StakeflowError};
    pub use crate::ledger::{MemoryLedger, TokenLedger};
    pub use crate::math::{ONE, PRECISION, U256};
    pub use crate::types::*;
}
