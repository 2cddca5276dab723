// Read-side queries over confirmation state and balances

use crate::error::Result;
use crate::storage::{balance_key, tx_key, Store, Tag};

/// Confirmed flag for each hash, in order
pub fn inclusion_states(store: &Store, hashes: &[Vec<u8>]) -> Result<Vec<bool>> {
    hashes
        .iter()
        .map(|hash| is_confirmed(store, hash))
        .collect()
}

/// Spent flag for each address, in order
pub fn were_addresses_spent_from(store: &Store, addresses: &[Vec<u8>]) -> Result<Vec<bool>> {
    addresses
        .iter()
        .map(|address| is_spent_from(store, address))
        .collect()
}

pub fn is_confirmed(store: &Store, hash: &[u8]) -> Result<bool> {
    store.has(&tx_key(hash).with_tag(Tag::Confirmed))
}

pub fn is_spent_from(store: &Store, address: &[u8]) -> Result<bool> {
    store.has(&balance_key(address).with_tag(Tag::Spent))
}

pub fn balance(store: &Store, address: &[u8]) -> Result<i64> {
    Ok(store.get_value::<i64>(&balance_key(address))?.unwrap_or(0))
}

/// Flag a stored transaction as awaiting pruning at a snapshot boundary
pub fn mark_trim_pending(store: &Store, hash: &[u8]) -> Result<()> {
    store.put_value(&tx_key(hash).with_tag(Tag::TrimPending), &true)
}

/// Record that a hash's data was pruned at the snapshot edge
pub fn mark_snapshot_edge(store: &Store, hash: &[u8]) -> Result<()> {
    store.put_value(&tx_key(hash).with_tag(Tag::Edge), &true)
}
