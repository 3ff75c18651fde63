//! Pool state snapshots
//!
//! `encode`/`decode` produce a compact binary image for persistence;
//! `to_json` renders the same state for inspection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use stakeflow_core::error::{Result, StakeflowError};

pub fn encode<T: Serialize>(state: &T) -> Result<Vec<u8>> {
    bincode::serialize(state).map_err(|e| StakeflowError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| StakeflowError::Serialization(e.to_string()))
}

pub fn to_json<T: Serialize>(state: &T) -> Result<String> {
    serde_json::to_string_pretty(state).map_err(|e| StakeflowError::Serialization(e.to_string()))
}

pub fn from_json<T: DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_str(input).map_err(|e| StakeflowError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::{RewardStream, NEW_REWARD_RATIO};
    use stakeflow_core::math::ONE;
    use stakeflow_core::types::TokenId;

    fn funded_stream() -> RewardStream {
        let mut stream = RewardStream::new(TokenId::from_label("CRV"), 604_800, 0).unwrap();
        stream.fund(1_000 * ONE, 10 * ONE, 0, NEW_REWARD_RATIO).unwrap();
        stream.settle(10 * ONE, 3_600).unwrap();
        stream
    }

    #[test]
    fn test_binary_snapshot_restores_stream() {
        let stream = funded_stream();
        let bytes = encode(&stream).unwrap();
        let restored: RewardStream = decode(&bytes).unwrap();
        assert_eq!(restored, stream);
    }

    #[test]
    fn test_json_snapshot_restores_stream() {
        let stream = funded_stream();
        let rendered = to_json(&stream).unwrap();
        assert!(rendered.contains(&stream.token.to_hex()));
        let restored: RewardStream = from_json(&rendered).unwrap();
        assert_eq!(restored, stream);
    }

    #[test]
    fn test_truncated_snapshot_is_an_error() {
        let bytes = encode(&funded_stream()).unwrap();
        let err = decode::<RewardStream>(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, StakeflowError::Serialization(_)));
    }
}
