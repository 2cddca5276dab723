// The store is a thin layer over a single sled tree. Everything the node
// persists lives in that one keyspace, namespaced by the tag byte of the key.

use crate::error::{Result, TangleError};
use crate::storage::batch::BatchWriter;
use crate::storage::keys::{EntityKey, Tag};
use crate::storage::txn::{Txn, TxResult};
use crate::utils::{deserialize, serialize};
use log::{debug, info};
use sled::{Batch, Db};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_MAX_BATCH_OPS: usize = 10_000;

pub struct Store {
    db: Db,
    // "Database busy" gate: maintenance holds it, workers pass through it
    gate: Mutex<()>,
    max_batch_ops: usize,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)
            .map_err(|e| TangleError::Database(format!("Failed to open database: {e}")))?;
        info!("Database loaded from {}", path.display());
        Ok(Store {
            db,
            gate: Mutex::new(()),
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        })
    }

    /// In-memory database that disappears on drop
    pub fn temporary() -> Result<Store> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| TangleError::Database(format!("Failed to open database: {e}")))?;
        Ok(Store {
            db,
            gate: Mutex::new(()),
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        })
    }

    pub fn with_max_batch_ops(mut self, max_batch_ops: usize) -> Store {
        self.max_batch_ops = max_batch_ops.max(1);
        self
    }

    pub fn get(&self, key: &EntityKey) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    pub fn has(&self, key: &EntityKey) -> Result<bool> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    pub fn get_value<T: bincode::Decode<()>>(&self, key: &EntityKey) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_raw(&self, key: &EntityKey, value: &[u8]) -> Result<()> {
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    pub fn put_value<T: bincode::Encode>(&self, key: &EntityKey, value: &T) -> Result<()> {
        let bytes = serialize(value)?;
        self.db.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn remove(&self, key: &EntityKey) -> Result<bool> {
        Ok(self.db.remove(key.as_bytes())?.is_some())
    }

    /// Atomically add `delta` to the integer stored at `key`
    pub fn increment(&self, key: &EntityKey, delta: i64) -> Result<i64> {
        self.transaction(|txn| txn.incr_by(key, delta))
    }

    /// Run `f` as one atomic transaction; an abort discards every write
    pub fn transaction<F, A>(&self, f: F) -> Result<A>
    where
        F: Fn(&Txn<'_>) -> TxResult<A>,
    {
        self.db
            .transaction(|tree| f(&Txn::new(tree)))
            .map_err(TangleError::from)
    }

    /// All keys carrying `tag`, in key order
    pub fn keys_with_tag(&self, tag: Tag) -> Result<Vec<EntityKey>> {
        let mut keys = Vec::new();
        for item in self.db.scan_prefix(tag.prefix()) {
            let (key, _) = item?;
            keys.push(EntityKey::from_slice(&key)?);
        }
        Ok(keys)
    }

    /// All (key, value) pairs carrying `tag`, in key order
    pub fn entries_with_tag(&self, tag: Tag) -> Result<Vec<(EntityKey, Vec<u8>)>> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(tag.prefix()) {
            let (key, value) = item?;
            entries.push((EntityKey::from_slice(&key)?, value.to_vec()));
        }
        Ok(entries)
    }

    pub fn count_with_tag(&self, tag: Tag) -> Result<usize> {
        let mut count = 0;
        for item in self.db.scan_prefix(tag.prefix()) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn batch(&self) -> BatchWriter<'_> {
        BatchWriter::new(self, self.max_batch_ops)
    }

    pub(crate) fn apply_batch(&self, batch: Batch) -> Result<()> {
        self.db
            .apply_batch(batch)
            .map_err(|e| TangleError::Database(format!("Failed to apply batch: {e}")))
    }

    /// Delete every key carrying `tag`
    pub fn remove_all(&self, tag: Tag) -> Result<usize> {
        let mut writer = self.batch();
        for item in self.db.scan_prefix(tag.prefix()) {
            let (key, _) = item?;
            writer.remove(&key)?;
        }
        writer.finish()
    }

    /// Block until no maintenance section holds the gate, then let go
    pub fn wait_idle(&self) {
        drop(self.lock_gate());
    }

    /// Hold the gate for a maintenance section
    pub fn lock_gate(&self) -> MutexGuard<'_, ()> {
        match self.gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("Database gate poisoned, continuing");
                poisoned.into_inner()
            }
        }
    }

    /// Periodic maintenance: flush dirty pages while the gate is held
    pub fn maintain(&self) -> Result<usize> {
        debug!("Database maintenance started");
        let _guard = self.lock_gate();
        let flushed = self.db.flush()?;
        debug!("Database maintenance finished ({flushed} bytes flushed)");
        Ok(flushed)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keys::{balance_key, tx_key};
    use tempfile::tempdir;

    #[test]
    fn test_values_round_trip_on_disk() {
        let dir = tempdir().unwrap();
        let key = tx_key(b"hash").with_tag(Tag::Timestamp);
        {
            let store = Store::open(dir.path().join("db")).unwrap();
            store.put_value(&key, &1_700_000_000i64).unwrap();
            store.flush().unwrap();
        }
        let store = Store::open(dir.path().join("db")).unwrap();
        assert_eq!(store.get_value::<i64>(&key).unwrap(), Some(1_700_000_000));
    }

    #[test]
    fn test_increment_accumulates() {
        let store = Store::temporary().unwrap();
        let key = balance_key(b"address");
        assert_eq!(store.increment(&key, 100).unwrap(), 100);
        assert_eq!(store.increment(&key, -150).unwrap(), -50);
        assert_eq!(store.get_value::<i64>(&key).unwrap(), Some(-50));
    }

    #[test]
    fn test_aborted_transaction_writes_nothing() {
        let store = Store::temporary().unwrap();
        let key = tx_key(b"x").with_tag(Tag::Confirmed);
        let result: Result<()> = store.transaction(|txn| {
            txn.put_value(&key, &1i64)?;
            crate::storage::txn::abort(TangleError::Integrity("boom".to_string()))
        });
        assert_eq!(result, Err(TangleError::Integrity("boom".to_string())));
        assert!(!store.has(&key).unwrap());
    }

    #[test]
    fn test_remove_all_spans_several_batches() {
        let store = Store::temporary().unwrap().with_max_batch_ops(3);
        for i in 0..10u8 {
            store.put_value(&balance_key(&[i]), &(i as i64)).unwrap();
        }
        store.put_value(&tx_key(b"keep"), &1i64).unwrap();

        assert_eq!(store.remove_all(Tag::Balance).unwrap(), 10);
        assert_eq!(store.count_with_tag(Tag::Balance).unwrap(), 0);
        assert!(store.has(&tx_key(b"keep")).unwrap());
    }

    #[test]
    fn test_keys_with_tag_only_returns_that_tag() {
        let store = Store::temporary().unwrap();
        let a = tx_key(b"a");
        store.put_value(&a.with_tag(Tag::ConfirmationPending), &1i64).unwrap();
        store.put_value(&a.with_tag(Tag::Timestamp), &1i64).unwrap();
        let keys = store.keys_with_tag(Tag::ConfirmationPending).unwrap();
        assert_eq!(keys, vec![a.with_tag(Tag::ConfirmationPending)]);
    }
}
