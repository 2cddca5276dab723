//! # Tangle Relay - gossip and confirmation for a tangle node
//!
//! A node in a DAG ledger where every transaction approves two parents
//! (trunk and branch). This crate is the part of the node that keeps
//! transactions moving between neighbors and turns milestone approvals into
//! confirmed transactions and balances.
//!
//! ## Layout
//! - `storage/`: sled-backed store, tagged key layout, transactions and batches
//! - `core/`: transaction records, tips, ledger queries, confirmation propagation
//! - `network/`: neighbors, the UDP frame transport and the frame layout
//! - `gossip/`: pending requests, per-neighbor queues, outbound scheduling, inbound frames
//! - `node/`: wires the services together and runs the background loops
//! - `config/`: TOML settings with environment overrides
//! - `utils/`: digests, timestamps and the bincode value codec
//! - `cli/`: command-line interface
//!
//! ## Where to start
//! 1. `node/mod.rs` shows every loop the node runs
//! 2. `gossip/scheduler.rs` for how frames are composed and sent
//! 3. `core/confirmation.rs` for the confirmation worklist

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod gossip;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, FingerprintPolicy, GossipTuning};
pub use core::{
    ConfirmOutcome, ConfirmationPropagator, LatestMilestone, LayoutCodec, MilestoneTx, Sentinel,
    TipPool, TransactionCodec, TransactionRecord,
};
pub use error::{Result, TangleError};
pub use gossip::{GossipScheduler, IncomingProcessor, PendingRequestTracker, RequestQueues};
pub use network::{Neighbor, NeighborRegistry, Neighbors, Transport, UdpTransport};
pub use node::Node;
pub use storage::{EntityKey, Store, Tag};
