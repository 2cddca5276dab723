//! Transaction decoding seam
//!
//! Hashing and field parsing of raw transaction bytes belong to the ledger's
//! wire format, which this node treats as opaque. The gossip layer only needs
//! something that turns bytes into a `TransactionRecord`.

use crate::core::TransactionRecord;
use crate::error::{Result, TangleError};
use crate::utils::sha384_digest;

pub trait TransactionCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<TransactionRecord>;
}

/// Fixed-offset layout used by the bundled binary and the tests.
///
/// `address | value (i64 LE) | timestamp (i64 LE) | trunk | branch | payload`,
/// with the hash taken as the first `hash_size` bytes of SHA-384 over the
/// whole buffer. Deployments with a real ledger hasher plug in their own
/// `TransactionCodec`.
#[derive(Debug, Clone, Copy)]
pub struct LayoutCodec {
    tx_size: usize,
    hash_size: usize,
}

const MAX_DIGEST: usize = 48;

impl LayoutCodec {
    pub fn new(tx_size: usize, hash_size: usize) -> Result<LayoutCodec> {
        if hash_size == 0 || hash_size > MAX_DIGEST {
            return Err(TangleError::Config(format!(
                "hash_size must be between 1 and {MAX_DIGEST}"
            )));
        }
        if tx_size < 3 * hash_size + 16 {
            return Err(TangleError::Config(format!(
                "tx_size {tx_size} too small for the field layout"
            )));
        }
        Ok(LayoutCodec { tx_size, hash_size })
    }

    fn value_at(&self) -> usize {
        self.hash_size
    }

    fn timestamp_at(&self) -> usize {
        self.hash_size + 8
    }

    fn trunk_at(&self) -> usize {
        self.hash_size + 16
    }

    fn branch_at(&self) -> usize {
        2 * self.hash_size + 16
    }

    pub fn hash_of(&self, bytes: &[u8]) -> Vec<u8> {
        sha384_digest(bytes)[..self.hash_size].to_vec()
    }

    /// Lay out the fields into a full-size buffer
    pub fn encode(
        &self,
        address: &[u8],
        value: i64,
        timestamp: i64,
        trunk: &[u8],
        branch: &[u8],
        payload: &[u8],
    ) -> Vec<u8> {
        let mut bytes = vec![0u8; self.tx_size];
        let h = self.hash_size;
        copy_clamped(&mut bytes[..h], address);
        bytes[self.value_at()..self.value_at() + 8].copy_from_slice(&value.to_le_bytes());
        bytes[self.timestamp_at()..self.timestamp_at() + 8]
            .copy_from_slice(&timestamp.to_le_bytes());
        copy_clamped(&mut bytes[self.trunk_at()..self.trunk_at() + h], trunk);
        copy_clamped(&mut bytes[self.branch_at()..self.branch_at() + h], branch);
        let rest = self.branch_at() + h;
        copy_clamped(&mut bytes[rest..], payload);
        bytes
    }
}

fn copy_clamped(dst: &mut [u8], src: &[u8]) {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
}

fn read_i64(bytes: &[u8], at: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    i64::from_le_bytes(buf)
}

impl TransactionCodec for LayoutCodec {
    fn decode(&self, bytes: &[u8]) -> Result<TransactionRecord> {
        if bytes.len() != self.tx_size {
            return Err(TangleError::InvalidFrame(format!(
                "transaction must be {} bytes, got {}",
                self.tx_size,
                bytes.len()
            )));
        }
        let h = self.hash_size;
        Ok(TransactionRecord {
            hash: self.hash_of(bytes),
            bytes: bytes.to_vec(),
            timestamp: read_i64(bytes, self.timestamp_at()),
            value: read_i64(bytes, self.value_at()),
            address: bytes[..h].to_vec(),
            trunk: bytes[self.trunk_at()..self.trunk_at() + h].to_vec(),
            branch: bytes[self.branch_at()..self.branch_at() + h].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_fields() {
        let codec = LayoutCodec::new(1604, 46).unwrap();
        let bytes = codec.encode(&[9u8; 46], -50, 1_700_000_000, &[1u8; 46], &[2u8; 46], b"hi");
        assert_eq!(bytes.len(), 1604);

        let tx = codec.decode(&bytes).unwrap();
        assert_eq!(tx.value, -50);
        assert_eq!(tx.timestamp, 1_700_000_000);
        assert_eq!(tx.address, vec![9u8; 46]);
        assert_eq!(tx.trunk, vec![1u8; 46]);
        assert_eq!(tx.branch, vec![2u8; 46]);
        assert_eq!(tx.hash.len(), 46);
        assert_eq!(tx.hash, codec.hash_of(&bytes));
    }

    #[test]
    fn test_rejects_wrong_size() {
        let codec = LayoutCodec::new(1604, 46).unwrap();
        assert!(codec.decode(&[0u8; 100]).is_err());
        assert!(LayoutCodec::new(100, 46).is_err());
        assert!(LayoutCodec::new(1604, 64).is_err());
    }
}
