//! Core ledger functionality
//!
//! Transaction records and their persisted layout, the decoding seam, the
//! milestone reference, tips, ledger queries and confirmation propagation.

pub mod codec;
pub mod confirmation;
pub mod ledger;
pub mod milestone;
pub mod tips;
pub mod transaction;

pub use codec::{LayoutCodec, TransactionCodec};
pub use confirmation::{ConfirmOutcome, ConfirmationPropagator, CycleReport};
pub use ledger::{balance, inclusion_states, were_addresses_spent_from};
pub use milestone::{LatestMilestone, MilestoneTx, Sentinel};
pub use tips::TipPool;
pub use transaction::{has_transaction, transaction_bytes, Relation, TransactionRecord};
