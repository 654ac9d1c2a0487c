//! Snapshot transport encoding
//!
//! Snapshots are opaque byte blobs. They cross JSON boundaries as standard
//! (padded) base64 and are never interpreted on either side.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, UnitverError};

/// Encode raw snapshot bytes for a JSON payload
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 snapshot payload back into raw bytes
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| UnitverError::InvalidEncoding(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_returns_original_bytes() {
        let blob = br#"{"tables":[],"forms":[{"id":7}]}"#;
        assert_eq!(decode(&encode(blob)).unwrap(), blob.to_vec());
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode("not base64!"),
            Err(UnitverError::InvalidEncoding(_))
        ));
    }
}
