//! Test fixtures for the node
//!
//! Deterministic transaction records, a transport that records what it was
//! asked to send, and the default frame sizes the fixtures use.

pub mod test_utils;

pub use test_utils::*;
