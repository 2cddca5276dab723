//! Data storage and persistence
//!
//! An ordered, transactional key-value store (sled) holding transaction
//! records, confirmation markers, balances and the persisted pending-request
//! table. Keys follow the tagged layout in `keys`.

pub mod batch;
pub mod keys;
pub mod store;
pub mod txn;

pub use batch::BatchWriter;
pub use keys::{balance_key, fingerprint_key, pending_key, tx_key, EntityKey, Tag, KEY_LEN};
pub use store::Store;
pub use txn::{abort, Txn, TxResult};
