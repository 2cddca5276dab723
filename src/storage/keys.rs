//! Tagged key layout
//!
//! Every persisted key is 16 bytes: one tag byte naming the kind of record,
//! then a 15-byte identifier of the entity. All records of one entity share
//! the identifier, so moving between them only swaps the tag byte.

use crate::error::{Result, TangleError};
use crate::utils::sha256_digest;
use std::fmt;

pub const KEY_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Bytes = 1,
    Hash = 2,
    Timestamp = 3,
    Value = 4,
    Address = 5,
    Relation = 6,
    Confirmed = 7,
    TrimPending = 8,
    ConfirmationPending = 9,
    PendingConfirmed = 10,
    PendingHash = 11,
    PendingTimestamp = 12,
    Balance = 13,
    Spent = 14,
    /// Snapshot edge: the transaction's data was pruned at a snapshot
    Edge = 15,
    Fingerprint = 16,
}

impl Tag {
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Prefix for scanning every key of this kind
    pub fn prefix(self) -> [u8; 1] {
        [self as u8]
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey([u8; KEY_LEN]);

impl EntityKey {
    /// Derive the key of an entity from its natural bytes (hash, address, ...)
    pub fn derive(data: &[u8], tag: Tag) -> EntityKey {
        let digest = sha256_digest(data);
        let mut key = [0u8; KEY_LEN];
        key[0] = tag.byte();
        key[1..].copy_from_slice(&digest[..KEY_LEN - 1]);
        EntityKey(key)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<EntityKey> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            TangleError::Database(format!(
                "Key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(EntityKey(key))
    }

    pub fn with_tag(&self, tag: Tag) -> EntityKey {
        let mut key = self.0;
        key[0] = tag.byte();
        EntityKey(key)
    }

    pub fn tag_byte(&self) -> u8 {
        self.0[0]
    }

    pub fn id(&self) -> &[u8] {
        &self.0[1..]
    }

    /// Same entity regardless of which record the key points at
    pub fn same_entity(&self, other: &EntityKey) -> bool {
        self.id() == other.id()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for EntityKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({}:{})", self.0[0], hex::encode(self.id()))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.id()))
    }
}

pub fn tx_key(hash: &[u8]) -> EntityKey {
    EntityKey::derive(hash, Tag::Hash)
}

pub fn balance_key(address: &[u8]) -> EntityKey {
    EntityKey::derive(address, Tag::Balance)
}

pub fn pending_key(hash: &[u8]) -> EntityKey {
    EntityKey::derive(hash, Tag::PendingHash)
}

/// Reply fingerprint: requested hash followed by the destination
pub fn fingerprint_key(requested: &[u8], destination: &str) -> EntityKey {
    let mut data = Vec::with_capacity(requested.len() + destination.len());
    data.extend_from_slice(requested);
    data.extend_from_slice(destination.as_bytes());
    EntityKey::derive(&data, Tag::Fingerprint)
}
