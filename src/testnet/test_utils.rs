//! Test utilities for gossip and confirmation testing

use crate::core::TransactionRecord;
use crate::error::Result;
use crate::network::Transport;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const TX_SIZE: usize = 1604;
pub const HASH_SIZE: usize = 46;

/// Hash filled with `seed`; seed 0 gives the tip sentinel
pub fn hash_of(seed: u8) -> Vec<u8> {
    vec![seed; HASH_SIZE]
}

/// Transaction `seed` referencing `trunk_seed` and `branch_seed`, with an
/// address of its own and a timestamp that grows with the seed
pub fn record(seed: u8, value: i64, trunk_seed: u8, branch_seed: u8) -> TransactionRecord {
    let mut address = vec![0xA0; HASH_SIZE];
    address[0] = seed;
    TransactionRecord {
        hash: hash_of(seed),
        bytes: vec![seed; TX_SIZE],
        timestamp: 1_700_000_000 + seed as i64,
        value,
        address,
        trunk: hash_of(trunk_seed),
        branch: hash_of(branch_seed),
    }
}

/// Transport that keeps every frame instead of sending it
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    inbound_depth: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> RecordingTransport {
        RecordingTransport::default()
    }

    /// (destination, frame) pairs in send order
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_inbound_depth(&self, depth: usize) {
        self.inbound_depth.store(depth, Ordering::Relaxed);
    }
}

impl Transport for RecordingTransport {
    fn send(&self, destination: &str, frame: &[u8]) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), frame.to_vec()));
        Ok(())
    }

    fn inbound_depth(&self) -> usize {
        self.inbound_depth.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_distinct_per_seed() {
        let a = record(1, 0, 2, 3);
        let b = record(2, 0, 2, 3);
        assert_ne!(a.hash, b.hash);
        assert_ne!(a.address, b.address);
        assert_eq!(a.bytes.len(), TX_SIZE);
        assert_eq!(a.trunk, hash_of(2));
    }

    #[test]
    fn test_recording_transport_keeps_order() {
        let transport = RecordingTransport::new();
        transport.send("a", &[1]).unwrap();
        transport.send("b", &[2]).unwrap();
        assert_eq!(
            transport.sent(),
            vec![("a".to_string(), vec![1]), ("b".to_string(), vec![2])]
        );
    }
}
