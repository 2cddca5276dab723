use crate::error::Result;
use crate::storage::keys::EntityKey;
use crate::storage::Store;
use log::debug;
use sled::Batch;

/// Write batch that commits itself and starts over once it grows too large
///
/// Long-running bulk writes never fail on size: when the batch reaches
/// `max_ops` it is applied and a fresh one is opened.
pub struct BatchWriter<'a> {
    store: &'a Store,
    batch: Batch,
    ops: usize,
    max_ops: usize,
    committed: usize,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a Store, max_ops: usize) -> BatchWriter<'a> {
        BatchWriter {
            store,
            batch: Batch::default(),
            ops: 0,
            max_ops: max_ops.max(1),
            committed: 0,
        }
    }

    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.make_room()?;
        self.batch.insert(key, value);
        self.ops += 1;
        Ok(())
    }

    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.make_room()?;
        self.batch.remove(key);
        self.ops += 1;
        Ok(())
    }

    pub fn remove_key(&mut self, key: &EntityKey) -> Result<()> {
        self.remove(key.as_bytes())
    }

    fn make_room(&mut self) -> Result<()> {
        if self.ops >= self.max_ops {
            debug!("Batch full at {} ops, committing and retrying", self.ops);
            self.commit_current()?;
        }
        Ok(())
    }

    fn commit_current(&mut self) -> Result<()> {
        let batch = std::mem::take(&mut self.batch);
        self.store.apply_batch(batch)?;
        self.committed += self.ops;
        self.ops = 0;
        Ok(())
    }

    /// Commit what is left; returns the total number of operations written
    pub fn finish(mut self) -> Result<usize> {
        if self.ops > 0 {
            self.commit_current()?;
        }
        Ok(self.committed)
    }
}
