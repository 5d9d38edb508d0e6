//! Transaction format and validation for the key/value engine.
//!
//! A transaction is either `key=value` or a bare byte string, in which case
//! the bytes are both key and value.

use shared_types::CODE_OK;

/// Result codes returned by the key/value engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum KvCode {
    Ok = CODE_OK,
    EmptyTx = 1,
    TxTooLarge = 2,
    EmptyKey = 3,
}

impl KvCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Engine-side admission limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvLimits {
    pub max_tx_bytes: usize,
}

impl Default for KvLimits {
    fn default() -> Self {
        Self {
            max_tx_bytes: 1024 * 1024,
        }
    }
}

/// Validate a transaction without applying it.
pub fn validate_tx(tx: &[u8], limits: &KvLimits) -> KvCode {
    if tx.is_empty() {
        return KvCode::EmptyTx;
    }
    if tx.len() > limits.max_tx_bytes {
        return KvCode::TxTooLarge;
    }
    match tx.iter().position(|b| *b == b'=') {
        Some(0) => KvCode::EmptyKey,
        _ => KvCode::Ok,
    }
}

/// Split a validated transaction into key and value.
pub fn parse_tx(tx: &[u8]) -> (Vec<u8>, Vec<u8>) {
    match tx.iter().position(|b| *b == b'=') {
        Some(i) => (tx[..i].to_vec(), tx[i + 1..].to_vec()),
        None => (tx.to_vec(), tx.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tx() {
        let limits = KvLimits { max_tx_bytes: 8 };
        assert_eq!(validate_tx(b"", &limits), KvCode::EmptyTx);
        assert_eq!(validate_tx(b"123456789", &limits), KvCode::TxTooLarge);
        assert_eq!(validate_tx(b"=v", &limits), KvCode::EmptyKey);
        assert_eq!(validate_tx(b"k=v", &limits), KvCode::Ok);
        assert_eq!(validate_tx(b"k=", &limits), KvCode::Ok);
        assert_eq!(validate_tx(b"tx-a", &limits), KvCode::Ok);
    }

    #[test]
    fn test_parse_tx() {
        assert_eq!(parse_tx(b"name=satoshi"), (b"name".to_vec(), b"satoshi".to_vec()));
        assert_eq!(parse_tx(b"a=b=c"), (b"a".to_vec(), b"b=c".to_vec()));
        assert_eq!(parse_tx(b"tx-a"), (b"tx-a".to_vec(), b"tx-a".to_vec()));
    }
}
