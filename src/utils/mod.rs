//! Utility functions and helpers
//!
//! Digests used for key derivation, timestamps, and the bincode value codec.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, hex_decode, now_secs, sha256_digest, sha384_digest};
pub use serialization::{deserialize, serialize};
