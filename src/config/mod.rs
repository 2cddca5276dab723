//! Configuration management
//!
//! Node settings come from an optional TOML file, then environment
//! overrides. The low-end profile tightens sample bounds, queue sizes and
//! the tip request cadence for limited hardware.

pub mod settings;

pub use settings::{
    Config, ConfirmSettings, FingerprintPolicy, GossipSettings, GossipTuning, NeighborEntry,
    NodeSettings, StorageSettings, DEFAULT_HASH_SIZE, DEFAULT_NODE_ADDR, DEFAULT_TX_SIZE,
};
