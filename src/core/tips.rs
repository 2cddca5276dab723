use crate::core::transaction::transaction_bytes;
use crate::error::Result;
use crate::storage::Store;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::RwLock;

const DEFAULT_TIP_CAPACITY: usize = 1_000;

/// Recently received transactions nothing references yet
pub struct TipPool {
    inner: RwLock<VecDeque<Vec<u8>>>,
    capacity: usize,
}

impl Default for TipPool {
    fn default() -> Self {
        Self::new(DEFAULT_TIP_CAPACITY)
    }
}

impl TipPool {
    pub fn new(capacity: usize) -> TipPool {
        TipPool {
            inner: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn add(&self, hash: &[u8]) {
        match self.inner.write() {
            Ok(mut tips) => {
                if tips.iter().any(|t| t.as_slice() == hash) {
                    return;
                }
                if tips.len() >= self.capacity {
                    tips.pop_front();
                }
                tips.push_back(hash.to_vec());
            }
            Err(_) => log::error!("Failed to acquire write lock on tip pool"),
        }
    }

    pub fn remove(&self, hash: &[u8]) {
        match self.inner.write() {
            Ok(mut tips) => tips.retain(|t| t.as_slice() != hash),
            Err(_) => log::error!("Failed to acquire write lock on tip pool"),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(tips) => tips.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on tip pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A random tip as (hash, bytes), or none when the pool is empty.
    /// Tips whose bytes have left the store are dropped on the way.
    pub fn random_tip(&self, store: &Store) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            let hash = {
                let tips = match self.inner.read() {
                    Ok(tips) => tips,
                    Err(_) => {
                        log::error!("Failed to acquire read lock on tip pool");
                        return Ok(None);
                    }
                };
                if tips.is_empty() {
                    return Ok(None);
                }
                let idx = rand::thread_rng().gen_range(0..tips.len());
                tips[idx].clone()
            };
            match transaction_bytes(store, &hash)? {
                Some(bytes) => return Ok(Some((hash, bytes))),
                None => self.remove(&hash),
            }
        }
    }
}
