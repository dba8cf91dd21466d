//! Bincode wire helpers

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ProtocolError, Result};

/// Encode a message for the wire.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    bincode::serialize(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a message from the wire.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_truncated_input() {
        let bytes = encode(&vec![1u32, 2, 3]).unwrap();
        let result: Result<Vec<u32>> = decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
