use crate::config::GossipTuning;
use crate::error::Result;
use crate::gossip::queue::RequestQueues;
use crate::network::{NeighborRegistry, Request};
use crate::storage::{pending_key, Store, Tag};
use crate::utils::now_secs;
use log::{debug, info, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A hash this node wants but does not hold yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub hash: Vec<u8>,
    /// Unix seconds the request was first made
    pub timestamp: i64,
    pub last_tried: Instant,
    /// Logical address of the neighbor it was last asked from
    pub last_neighbor: String,
}

// Vec for O(1) random access, index for O(1) lookup by hash
#[derive(Default)]
struct PendingTable {
    entries: Vec<PendingRequest>,
    index: HashMap<Vec<u8>, usize>,
}

impl PendingTable {
    fn get(&self, hash: &[u8]) -> Option<&PendingRequest> {
        self.index.get(hash).map(|&idx| &self.entries[idx])
    }

    fn insert(&mut self, request: PendingRequest) {
        self.index.insert(request.hash.clone(), self.entries.len());
        self.entries.push(request);
    }

    fn remove(&mut self, hash: &[u8]) -> bool {
        let Some(idx) = self.index.remove(hash) else {
            return false;
        };
        self.entries.swap_remove(idx);
        if let Some(moved) = self.entries.get(idx) {
            self.index.insert(moved.hash.clone(), idx);
        }
        true
    }

    // Hand the entry to `exclude` and return a snapshot of it
    fn claim(&mut self, idx: usize, exclude: &str, now: Instant) -> PendingRequest {
        let entry = &mut self.entries[idx];
        entry.last_tried = now;
        entry.last_neighbor = exclude.to_string();
        entry.clone()
    }
}

/// In-memory table of wanted hashes, mirrored under the pending-hash and
/// pending-timestamp tags so it survives a restart. One entry per hash.
pub struct PendingRequestTracker {
    store: Arc<Store>,
    table: Mutex<PendingTable>,
    re_request_interval: Duration,
    old_sample: usize,
    any_sample: usize,
}

impl PendingRequestTracker {
    pub fn new(store: Arc<Store>, re_request_interval: Duration, tuning: &GossipTuning) -> Self {
        PendingRequestTracker {
            store,
            table: Mutex::new(PendingTable::default()),
            re_request_interval,
            old_sample: tuning.old_pending_sample,
            any_sample: tuning.any_pending_sample,
        }
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        match self.table.lock() {
            Ok(table) => table,
            Err(poisoned) => {
                log::error!("Pending request table poisoned, continuing");
                poisoned.into_inner()
            }
        }
    }

    /// Track `hash`, or return the entry already tracking it.
    ///
    /// New entries start out eligible for retry: the timestamp defaults to
    /// one retry interval ago and `last_tried` is backdated the same way.
    pub fn add_pending_request(
        &self,
        hash: &[u8],
        timestamp: Option<i64>,
        origin: Option<&str>,
        persist: bool,
    ) -> Result<PendingRequest> {
        let mut table = self.table();
        if let Some(existing) = table.get(hash) {
            return Ok(existing.clone());
        }

        let timestamp =
            timestamp.unwrap_or_else(|| now_secs() - self.re_request_interval.as_secs() as i64);
        if persist {
            let key = pending_key(hash);
            self.store.transaction(|txn| {
                txn.put_raw(&key, hash)?;
                txn.put_value(&key.with_tag(Tag::PendingTimestamp), &timestamp)
            })?;
        }

        let now = Instant::now();
        let request = PendingRequest {
            hash: hash.to_vec(),
            timestamp,
            last_tried: now.checked_sub(self.re_request_interval).unwrap_or(now),
            last_neighbor: origin.unwrap_or_default().to_string(),
        };
        table.insert(request.clone());
        Ok(request)
    }

    pub fn remove_pending_request(&self, hash: &[u8]) -> Result<bool> {
        let mut table = self.table();
        if !table.remove(hash) {
            return Ok(false);
        }
        let key = pending_key(hash);
        self.store.transaction(|txn| {
            txn.remove(&key)?;
            txn.remove(&key.with_tag(Tag::PendingTimestamp))?;
            Ok(())
        })?;
        Ok(true)
    }

    /// A random entry whose cooldown has run out and which was not last
    /// handed to `exclude`. Only a bounded sample is examined, so this can
    /// miss an eligible entry in a large table.
    pub fn get_old_pending(&self, exclude: &str) -> Option<PendingRequest> {
        let mut table = self.table();
        let len = table.entries.len();
        if len == 0 {
            return None;
        }
        let now = Instant::now();
        let amount = self.old_sample.min(len);
        let sample = rand::seq::index::sample(&mut rand::thread_rng(), len, amount);
        for idx in sample.iter() {
            let entry = &table.entries[idx];
            if now.duration_since(entry.last_tried) >= self.re_request_interval
                && entry.last_neighbor != exclude
            {
                return Some(table.claim(idx, exclude, now));
            }
        }
        None
    }

    /// Fallback for `get_old_pending` that ignores the cooldown and scans a
    /// larger window from a random offset.
    pub fn get_any_random_old_pending(&self, exclude: &str) -> Option<PendingRequest> {
        let mut table = self.table();
        let len = table.entries.len();
        if len == 0 {
            return None;
        }
        let start = rand::thread_rng().gen_range(0..len);
        for step in 0..self.any_sample.min(len) {
            let idx = (start + step) % len;
            if table.entries[idx].last_neighbor != exclude {
                return Some(table.claim(idx, exclude, Instant::now()));
            }
        }
        None
    }

    pub fn contains(&self, hash: &[u8]) -> bool {
        self.table().get(hash).is_some()
    }

    pub fn get(&self, hash: &[u8]) -> Option<PendingRequest> {
        self.table().get(hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.table().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the table from the store and queue every recovered hash for
    /// every known neighbor. Returns (loaded, scanned).
    ///
    /// Queues are filled without waiting. Once a neighbor's queue is full
    /// the remaining hashes reach it through the pending table instead.
    pub fn load_pending_requests(
        &self,
        neighbors: &dyn NeighborRegistry,
        queues: &RequestQueues,
    ) -> Result<(usize, usize)> {
        info!("Loading pending requests");
        let _guard = self.store.lock_gate();
        let targets = neighbors.list_neighbors();

        let mut full = HashSet::new();
        let mut total = 0;
        let mut added = 0;
        for (key, hash) in self.store.entries_with_tag(Tag::PendingHash)? {
            total += 1;
            let timestamp = match self
                .store
                .get_value::<i64>(&key.with_tag(Tag::PendingTimestamp))
            {
                Ok(Some(timestamp)) => timestamp,
                Ok(None) => {
                    warn!("Could not load pending request timestamp for {key}");
                    continue;
                }
                Err(e) => {
                    warn!("Could not load pending request timestamp for {key}: {e}");
                    continue;
                }
            };
            for neighbor in &targets {
                let addr = neighbor.get_addr();
                if full.contains(addr) {
                    continue;
                }
                let request = Request {
                    requested: hash.clone(),
                    tip: false,
                };
                if !queues.try_push(addr, request) {
                    debug!("Request queue for {addr} full, leaving the rest to the pending table");
                    full.insert(addr.to_string());
                }
            }
            self.add_pending_request(&hash, Some(timestamp), None, false)?;
            added += 1;
        }
        info!("Pending requests loaded: {added} of {total}");
        Ok((added, total))
    }

    #[cfg(test)]
    pub(crate) fn set_last_tried(&self, hash: &[u8], last_tried: Instant, last_neighbor: &str) {
        let mut table = self.table();
        if let Some(&idx) = table.index.get(hash) {
            table.entries[idx].last_tried = last_tried;
            table.entries[idx].last_neighbor = last_neighbor.to_string();
        }
    }
}
