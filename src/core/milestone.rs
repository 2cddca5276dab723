use crate::storage::{tx_key, EntityKey};
use std::sync::RwLock;

/// The bootstrap/tip sentinel: an all-zero hash that stands for "no
/// particular transaction". It is never requested, confirmed or stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel {
    hash: Vec<u8>,
    key: EntityKey,
}

impl Sentinel {
    pub fn new(hash_size: usize) -> Sentinel {
        let hash = vec![0u8; hash_size];
        let key = tx_key(&hash);
        Sentinel { hash, key }
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn is_hash(&self, hash: &[u8]) -> bool {
        hash == self.hash.as_slice()
    }

    pub fn is_key(&self, key: &EntityKey) -> bool {
        key.same_entity(&self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneTx {
    pub hash: Vec<u8>,
    pub bytes: Vec<u8>,
}

/// Pointer to the latest known milestone.
///
/// Maintained by whatever tracks the coordinator; gossip only reads it.
#[derive(Default)]
pub struct LatestMilestone {
    inner: RwLock<Option<MilestoneTx>>,
}

impl LatestMilestone {
    pub fn new() -> LatestMilestone {
        LatestMilestone::default()
    }

    pub fn set(&self, milestone: MilestoneTx) {
        match self.inner.write() {
            Ok(mut inner) => *inner = Some(milestone),
            Err(_) => log::error!("Failed to acquire write lock on latest milestone"),
        }
    }

    pub fn get(&self) -> Option<MilestoneTx> {
        match self.inner.read() {
            Ok(inner) => inner.clone(),
            Err(_) => {
                log::error!("Failed to acquire read lock on latest milestone");
                None
            }
        }
    }

    /// Latest milestone unless it is still the bootstrap placeholder
    pub fn usable(&self, sentinel: &Sentinel) -> Option<MilestoneTx> {
        self.get().filter(|m| !sentinel.is_hash(&m.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_milestone_is_not_usable() {
        let sentinel = Sentinel::new(46);
        let latest = LatestMilestone::new();
        assert!(latest.usable(&sentinel).is_none());

        latest.set(MilestoneTx {
            hash: vec![0u8; 46],
            bytes: vec![0u8; 1604],
        });
        assert!(latest.get().is_some());
        assert!(latest.usable(&sentinel).is_none());

        latest.set(MilestoneTx {
            hash: vec![5u8; 46],
            bytes: vec![5u8; 1604],
        });
        assert_eq!(latest.usable(&sentinel).unwrap().hash, vec![5u8; 46]);
    }

    #[test]
    fn test_sentinel_matches_any_tag() {
        let sentinel = Sentinel::new(46);
        let retagged = sentinel.key().with_tag(crate::storage::Tag::Timestamp);
        assert!(sentinel.is_key(&retagged));
        assert!(!sentinel.is_key(&tx_key(b"other")));
    }
}
