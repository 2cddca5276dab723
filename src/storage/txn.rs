use crate::error::TangleError;
use crate::storage::keys::EntityKey;
use crate::utils::{deserialize, serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::transaction::TransactionalTree;

pub type TxResult<T> = ConflictableTransactionResult<T, TangleError>;

/// Abort the surrounding transaction; nothing it wrote becomes visible
pub fn abort<T>(err: TangleError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

/// Typed view over one sled transaction
///
/// The closure handed to `Store::transaction` may run more than once on
/// conflict, so everything done through a `Txn` must stay inside the store.
pub struct Txn<'a> {
    tree: &'a TransactionalTree,
}

impl<'a> Txn<'a> {
    pub fn new(tree: &'a TransactionalTree) -> Txn<'a> {
        Txn { tree }
    }

    pub fn get(&self, key: &EntityKey) -> TxResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    pub fn has(&self, key: &EntityKey) -> TxResult<bool> {
        Ok(self.tree.get(key.as_bytes())?.is_some())
    }

    pub fn get_value<T: bincode::Decode<()>>(&self, key: &EntityKey) -> TxResult<Option<T>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => match deserialize(&bytes) {
                Ok(value) => Ok(Some(value)),
                Err(e) => abort(e),
            },
            None => Ok(None),
        }
    }

    pub fn put_raw(&self, key: &EntityKey, value: &[u8]) -> TxResult<()> {
        self.tree.insert(key.as_bytes(), value)?;
        Ok(())
    }

    pub fn put_value<T: bincode::Encode>(&self, key: &EntityKey, value: &T) -> TxResult<()> {
        let bytes = match serialize(value) {
            Ok(bytes) => bytes,
            Err(e) => return abort(e),
        };
        self.tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn remove(&self, key: &EntityKey) -> TxResult<bool> {
        Ok(self.tree.remove(key.as_bytes())?.is_some())
    }

    /// Add `delta` to the integer at `key` (absent counts as 0)
    pub fn incr_by(&self, key: &EntityKey, delta: i64) -> TxResult<i64> {
        let current: i64 = self.get_value(key)?.unwrap_or(0);
        let next = match current.checked_add(delta) {
            Some(next) => next,
            None => {
                return abort(TangleError::Integrity(format!(
                    "Balance overflow at {key}: {current} + {delta}"
                )))
            }
        };
        self.put_value(key, &next)?;
        Ok(next)
    }
}
