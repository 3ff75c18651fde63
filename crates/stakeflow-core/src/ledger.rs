//! Value-transfer boundary
//!
//! Custody lives outside the accounting core. Pools only see a
//! [`TokenLedger`] that moves balances atomically and reports holdings.

use crate::error::{Result, StakeflowError};
use crate::types::{AccountId, Amount, TokenId};
use std::collections::HashMap;
use tracing::trace;

/// Atomic, synchronous token transfers
pub trait TokenLedger {
    /// Move `amount` of `token` from `from` to `to`
    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()>;

    /// Balance of `holder` in `token`
    fn balance_of(&self, token: &TokenId, holder: &AccountId) -> Amount;
}

/// In-memory balances keyed by `(token, holder)`
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    balances: HashMap<(TokenId, AccountId), Amount>,
    issued: HashMap<TokenId, Amount>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly issued tokens to `holder`
    pub fn mint(&mut self, token: &TokenId, holder: &AccountId, amount: Amount) -> Result<()> {
        let balance = self.balances.entry((*token, *holder)).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(StakeflowError::MathOverflow)?;
        let issued = self.issued.entry(*token).or_insert(0);
        *issued = issued.checked_add(amount).ok_or(StakeflowError::MathOverflow)?;
        Ok(())
    }

    /// Total ever minted of `token`
    pub fn issued(&self, token: &TokenId) -> Amount {
        self.issued.get(token).copied().unwrap_or(0)
    }
}

impl TokenLedger for MemoryLedger {
    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        if amount == 0 || from == to {
            return Ok(());
        }

        let available = self.balance_of(token, from);
        if available < amount {
            return Err(StakeflowError::TransferFailed {
                token: *token,
                amount,
                reason: format!("{} holds only {}", from, available),
            });
        }

        let credit = self.balance_of(token, to);
        let credited = credit.checked_add(amount).ok_or(StakeflowError::MathOverflow)?;
        self.balances.insert((*token, *from), available - amount);
        self.balances.insert((*token, *to), credited);
        trace!(%token, %from, %to, amount, "transfer");
        Ok(())
    }

    fn balance_of(&self, token: &TokenId, holder: &AccountId) -> Amount {
        self.balances.get(&(*token, *holder)).copied().unwrap_or(0)
    }
}
