//! Confirmation integration tests
//!
//! Runs the confirmation worklist against on-disk stores, including across
//! a restart of the database.

use std::sync::Arc;
use tangle_relay::core::{
    balance, inclusion_states, were_addresses_spent_from, ConfirmationPropagator, LayoutCodec,
    Sentinel, TransactionCodec, TransactionRecord,
};
use tangle_relay::storage::{tx_key, Store, Tag};
use tempfile::tempdir;

const TX_SIZE: usize = 1604;
const HASH_SIZE: usize = 46;

fn codec() -> LayoutCodec {
    LayoutCodec::new(TX_SIZE, HASH_SIZE).unwrap()
}

// Addresses occupy a full hash-sized field in the layout
fn address(name: &str) -> Vec<u8> {
    let mut address = name.as_bytes().to_vec();
    address.resize(HASH_SIZE, 0);
    address
}

fn transaction(address: &[u8], value: i64, trunk: &[u8], branch: &[u8], tag: &[u8]) -> TransactionRecord {
    let codec = codec();
    let bytes = codec.encode(address, value, 1_700_000_000, trunk, branch, tag);
    codec.decode(&bytes).unwrap()
}

fn propagator(store: &Arc<Store>) -> ConfirmationPropagator {
    ConfirmationPropagator::new(store.clone(), b"coordinator".to_vec(), Sentinel::new(HASH_SIZE))
}

#[test]
fn test_worklist_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    let sentinel = vec![0u8; HASH_SIZE];

    let parent = transaction(&address("alice"), 100, &sentinel, &sentinel, b"parent");
    let child = transaction(&address("bob"), 0, &parent.hash, &sentinel, b"child");
    {
        let store = Arc::new(Store::open(&path).unwrap());
        parent.persist(&store).unwrap();
        child.persist(&store).unwrap();
        let propagator = propagator(&store);
        propagator.schedule(&child.hash).unwrap();

        // One cycle confirms the child and leaves the parent queued
        let report = propagator.run_cycle().unwrap();
        assert_eq!(report.confirmed, 1);
        store.flush().unwrap();
    }

    let store = Arc::new(Store::open(&path).unwrap());
    assert_eq!(store.count_with_tag(Tag::ConfirmationPending).unwrap(), 1);
    let propagator = propagator(&store);
    assert_eq!(propagator.run_cycle().unwrap().confirmed, 1);

    assert_eq!(
        inclusion_states(&store, &[parent.hash.clone(), child.hash.clone()]).unwrap(),
        vec![true, true]
    );
    assert_eq!(balance(&store, &address("alice")).unwrap(), 100);
    assert_eq!(store.count_with_tag(Tag::ConfirmationPending).unwrap(), 0);
}

#[test]
fn test_parent_arriving_late_joins_the_worklist() {
    let store = Arc::new(Store::temporary().unwrap());
    let sentinel = vec![0u8; HASH_SIZE];
    let parent = transaction(&address("carol"), -30, &sentinel, &sentinel, b"late");
    let child = transaction(&address("dave"), 30, &parent.hash, &sentinel, b"early");

    child.persist(&store).unwrap();
    let propagator = propagator(&store);
    propagator.schedule(&child.hash).unwrap();
    assert_eq!(propagator.run_until_idle(5).unwrap(), 1);
    assert!(store
        .has(&tx_key(&parent.hash).with_tag(Tag::PendingConfirmed))
        .unwrap());

    parent.persist(&store).unwrap();
    assert_eq!(propagator.run_until_idle(5).unwrap(), 1);

    assert_eq!(balance(&store, &address("dave")).unwrap(), 30);
    assert_eq!(balance(&store, &address("carol")).unwrap(), -30);
    assert_eq!(
        were_addresses_spent_from(&store, &[address("carol"), address("dave")]).unwrap(),
        vec![true, false]
    );
    assert_eq!(propagator.total_confirmations(), 2);
}

#[test]
fn test_shared_ancestor_is_credited_once() {
    let store = Arc::new(Store::temporary().unwrap());
    let sentinel = vec![0u8; HASH_SIZE];
    let root = transaction(&address("erin"), 7, &sentinel, &sentinel, b"root");
    let left = transaction(&address("frank"), 0, &root.hash, &sentinel, b"left");
    let right = transaction(&address("grace"), 0, &root.hash, &root.hash, b"right");
    let top = transaction(&address("heidi"), 0, &left.hash, &right.hash, b"top");
    for tx in [&root, &left, &right, &top] {
        assert!(tx.persist(&store).unwrap());
    }

    let propagator = propagator(&store);
    propagator.schedule(&top.hash).unwrap();
    propagator.schedule(&left.hash).unwrap();
    assert_eq!(propagator.run_until_idle(10).unwrap(), 4);

    assert_eq!(balance(&store, &address("erin")).unwrap(), 7);
    assert_eq!(propagator.total_confirmations(), 4);
}

#[test]
fn test_remove_all_clears_a_tag_on_disk() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path().join("db"))
        .unwrap()
        .with_max_batch_ops(4);
    for i in 0..25u8 {
        store
            .put_value(&tx_key(&[i]).with_tag(Tag::ConfirmationPending), &(i as i64))
            .unwrap();
        store
            .put_value(&tx_key(&[i]).with_tag(Tag::Timestamp), &(i as i64))
            .unwrap();
    }

    assert_eq!(store.remove_all(Tag::ConfirmationPending).unwrap(), 25);
    assert_eq!(store.count_with_tag(Tag::ConfirmationPending).unwrap(), 0);
    assert_eq!(store.count_with_tag(Tag::Timestamp).unwrap(), 25);
}
