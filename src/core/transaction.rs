use crate::error::{Result, TangleError};
use crate::storage::{tx_key, EntityKey, Store, Tag, KEY_LEN};

/// Trunk and branch keys of a transaction, stored side by side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub trunk: EntityKey,
    pub branch: EntityKey,
}

impl Relation {
    pub fn from_hashes(trunk: &[u8], branch: &[u8]) -> Relation {
        Relation {
            trunk: tx_key(trunk),
            branch: tx_key(branch),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Relation> {
        if bytes.len() != 2 * KEY_LEN {
            return Err(TangleError::Integrity(format!(
                "Relation must be {} bytes, got {}",
                2 * KEY_LEN,
                bytes.len()
            )));
        }
        Ok(Relation {
            trunk: EntityKey::from_slice(&bytes[..KEY_LEN])?,
            branch: EntityKey::from_slice(&bytes[KEY_LEN..])?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 * KEY_LEN);
        bytes.extend_from_slice(self.trunk.as_bytes());
        bytes.extend_from_slice(self.branch.as_bytes());
        bytes
    }

    pub fn parents(&self) -> [EntityKey; 2] {
        [self.trunk, self.branch]
    }
}

/// A received transaction with the fields the core needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: Vec<u8>,
    pub bytes: Vec<u8>,
    pub timestamp: i64,
    pub value: i64,
    pub address: Vec<u8>,
    pub trunk: Vec<u8>,
    pub branch: Vec<u8>,
}

impl TransactionRecord {
    pub fn key(&self) -> EntityKey {
        tx_key(&self.hash)
    }

    pub fn relation(&self) -> Relation {
        Relation::from_hashes(&self.trunk, &self.branch)
    }

    /// Persist every field in one transaction.
    ///
    /// Returns `false` when the transaction was already stored. A
    /// `pending-confirmed` marker left by a confirmed child is promoted to
    /// `confirmation-pending` now that the data is here.
    pub fn persist(&self, store: &Store) -> Result<bool> {
        let key = self.key();
        let relation = self.relation().to_bytes();
        store.transaction(|txn| {
            if txn.has(&key)? {
                return Ok(false);
            }
            txn.put_raw(&key, &self.hash)?;
            txn.put_raw(&key.with_tag(Tag::Bytes), &self.bytes)?;
            txn.put_value(&key.with_tag(Tag::Timestamp), &self.timestamp)?;
            txn.put_value(&key.with_tag(Tag::Value), &self.value)?;
            txn.put_raw(&key.with_tag(Tag::Address), &self.address)?;
            txn.put_raw(&key.with_tag(Tag::Relation), &relation)?;
            if txn.remove(&key.with_tag(Tag::PendingConfirmed))? {
                txn.put_value(&key.with_tag(Tag::ConfirmationPending), &self.timestamp)?;
            }
            Ok(true)
        })
    }
}

/// Raw bytes of a stored transaction
pub fn transaction_bytes(store: &Store, hash: &[u8]) -> Result<Option<Vec<u8>>> {
    store.get(&tx_key(hash).with_tag(Tag::Bytes))
}

pub fn has_transaction(store: &Store, hash: &[u8]) -> Result<bool> {
    store.has(&tx_key(hash))
}
