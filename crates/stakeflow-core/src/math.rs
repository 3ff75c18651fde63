//! Fixed-point arithmetic at 1e18 precision
//!
//! Every product of two 128-bit quantities goes through a 256-bit
//! intermediate before being divided back down, so `amount * rate` style
//! expressions never overflow before the division.

use crate::error::{Result, StakeflowError};
use crate::types::Fixed;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use wide::U256;

// The macro expansion needs std's two-parameter `Result` in scope.
mod wide {
    #![allow(clippy::manual_div_ceil)]
    #![allow(clippy::assign_op_pattern)]

    use uint::construct_uint;

    construct_uint! {
        /// 256-bit unsigned integer
        ///
        /// Used for intermediate products and for the reward-per-share
        /// accumulators, which grow without bound over a stream's lifetime.
        pub struct U256(4);
    }
}

/// Fixed-point scale: 10^18
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Multiplier of exactly 1x
pub const ONE: Fixed = PRECISION;

/// Widen a 128-bit value
#[inline]
pub fn widen(value: u128) -> U256 {
    U256::from(value)
}

/// Narrow a 256-bit value, failing if it does not fit
pub fn narrow(value: U256) -> Result<u128> {
    if value.bits() > 128 {
        return Err(StakeflowError::MathOverflow);
    }
    Ok(value.low_u128())
}

/// Compute `a * b / denominator` entirely in 256 bits, rounding down
pub fn wide_mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(StakeflowError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(StakeflowError::MathOverflow)?;
    Ok(product / denominator)
}

/// Compute `a * b / denominator`, rounding down
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(StakeflowError::DivisionByZero);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(denominator))
}

/// Compute `a * b / denominator`, rounding half up
pub fn mul_div_round(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(StakeflowError::DivisionByZero);
    }
    let denominator = U256::from(denominator);
    let numerator = U256::from(a) * U256::from(b) + denominator / 2;
    narrow(numerator / denominator)
}

/// Multiply two fixed-point values (or an amount by a fixed-point factor)
pub fn mul_fixed(a: u128, b: Fixed) -> Result<u128> {
    mul_div(a, b, PRECISION)
}

/// Divide `a` by `b` producing a fixed-point quotient
pub fn div_fixed(a: u128, b: u128) -> Result<Fixed> {
    mul_div(a, PRECISION, b)
}

/// Overflow-checked addition
pub fn checked_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(StakeflowError::MathOverflow)
}

/// Underflow-checked subtraction
pub fn checked_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(StakeflowError::MathOverflow)
}

/// Apply a signed delta expressed as `(old, new)` to `total`
///
/// Adds `new - old` when the value grew and subtracts `old - new` when it
/// shrank, without ever materialising a negative intermediate.
pub fn apply_delta(total: u128, old: u128, new: u128) -> Result<u128> {
    if new >= old {
        checked_add(total, new - old)
    } else {
        checked_sub(total, old - new)
    }
}

/// Clamp `value` into `[low, high]`
pub fn clamp(value: u128, low: u128, high: u128) -> u128 {
    value.max(low).min(high)
}

/// Raise a fixed-point `base` to an integer power by repeated squaring.
///
/// Each step rounds half up, so the accumulated error stays within
/// `O(log exponent)` units of the last place.
pub fn pow_fixed(base: Fixed, exponent: u64) -> Result<Fixed> {
    let mut result = ONE;
    let mut square = base;
    let mut remaining = exponent;

    while remaining > 0 {
        if remaining & 1 == 1 {
            result = mul_div_round(result, square, PRECISION)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            square = mul_div_round(square, square, PRECISION)?;
        }
    }

    Ok(result)
}

impl U256 {
    /// Little-endian byte encoding
    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (chunk, limb) in bytes.chunks_exact_mut(8).zip(self.0.iter()) {
            chunk.copy_from_slice(&limb.to_le_bytes());
        }
        bytes
    }

    /// Decode from little-endian bytes
    pub fn from_le_bytes(bytes: &[u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            *limb = u64::from_le_bytes(word);
        }
        U256(limbs)
    }
}

impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_le_bytes())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct U256Visitor;

        impl<'de> serde::de::Visitor<'de> for U256Visitor {
            type Value = U256;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("32 bytes")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> std::result::Result<U256, E> {
                let bytes: [u8; 32] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(U256::from_le_bytes(&bytes))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<U256, A::Error> {
                let mut bytes = [0u8; 32];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(U256::from_le_bytes(&bytes))
            }
        }

        deserializer.deserialize_bytes(U256Visitor)
    }
}
