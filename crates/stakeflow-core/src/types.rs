//! Core type definitions for Stakeflow
//!
//! Amounts are raw token units (`u128`), times are Unix seconds (`u64`) and
//! fixed-point values carry an implicit scale of [`crate::math::PRECISION`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Raw token amount in the token's smallest unit
pub type Amount = u128;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Fixed-point value scaled by 1e18
pub type Fixed = u128;

/// Seconds in one day
pub const SECONDS_PER_DAY: u64 = 86_400;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $short:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Create from raw bytes
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Derive an identifier from a human-readable label
            pub fn from_label(label: &str) -> Self {
                Self(*blake3::hash(label.as_bytes()).as_bytes())
            }

            /// Get the raw bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Convert to hex string
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..$short])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..$short])
            }
        }

        // Hex in human-readable formats so the ids can key JSON maps.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let encoded = String::deserialize(deserializer)?;
                    Self::from_hex(&encoded).map_err(serde::de::Error::custom)
                } else {
                    <[u8; 32]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

id_type!(
    /// Participant or contract address
    AccountId,
    12
);

id_type!(
    /// Token identifier (staking, reward or derived token)
    TokenId,
    12
);

id_type!(
    /// Locked stake identifier
    ///
    /// StakeId = BLAKE3(owner || start_time || principal || nonce)
    StakeId,
    16
);

impl StakeId {
    /// Derive the identity of a new locked stake.
    ///
    /// `nonce` counts the stakes the owner has opened before this one. It
    /// never goes down, so equal locks opened in the same second stay
    /// distinct even after an unlock in between.
    pub fn derive(owner: &AccountId, start_time: Timestamp, principal: Amount, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(owner.as_bytes());
        hasher.update(&start_time.to_be_bytes());
        hasher.update(&principal.to_be_bytes());
        hasher.update(&nonce.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

/// A token amount paired with its token, as returned by claims and views
pub type TokenAmounts = Vec<(TokenId, Amount)>;
