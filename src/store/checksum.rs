//! Integrity framing for persisted table files
//!
//! Format: `[payload_len: u32 LE][payload][crc32: u32 LE]`. Every table
//! file and the manifest go through this framing so a torn or corrupted
//! write is detected on load instead of silently deserialized.

use crate::error::{Result, StoreError};
use crc32fast::Hasher;

pub fn compute(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Wrap `payload` with its length and checksum.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let checksum = compute(payload);
    let mut framed = Vec::with_capacity(4 + payload.len() + 4);
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(payload);
    framed.extend_from_slice(&checksum.to_le_bytes());
    framed
}

/// Unwrap and verify a framed payload.
pub fn decode(framed: &[u8]) -> Result<&[u8]> {
    if framed.len() < 8 {
        return Err(StoreError::Corruption(format!(
            "framed payload too short: {} bytes",
            framed.len()
        )));
    }

    let payload_len =
        u32::from_le_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize;
    if framed.len() != 4 + payload_len + 4 {
        return Err(StoreError::Corruption(format!(
            "framed payload length mismatch: header says {}, file has {}",
            payload_len,
            framed.len().saturating_sub(8)
        )));
    }

    let payload = &framed[4..4 + payload_len];
    let expected = u32::from_le_bytes([
        framed[4 + payload_len],
        framed[4 + payload_len + 1],
        framed[4 + payload_len + 2],
        framed[4 + payload_len + 3],
    ]);

    let actual = compute(payload);
    if actual != expected {
        return Err(StoreError::Corruption(format!(
            "checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
        )));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let payload = br#"{"id":"t1","title":"Buy milk"}"#;
        let framed = encode(payload);
        assert_eq!(decode(&framed).unwrap(), payload);
    }

    #[test]
    fn flipped_byte_is_detected() {
        let mut framed = encode(b"some table payload");
        framed[10] ^= 0xFF;
        assert!(matches!(decode(&framed), Err(StoreError::Corruption(_))));
    }

    #[test]
    fn truncated_file_is_detected() {
        let framed = encode(b"some table payload");
        assert!(matches!(decode(&framed[..framed.len() - 3]), Err(StoreError::Corruption(_))));
        assert!(matches!(decode(b"abc"), Err(StoreError::Corruption(_))));
    }

    #[test]
    fn empty_payload_is_valid() {
        let framed = encode(b"");
        assert_eq!(decode(&framed).unwrap(), b"");
    }
}
