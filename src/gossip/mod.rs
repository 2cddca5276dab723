//! Replication protocol
//!
//! Wanted hashes (`pending`), explicit per-neighbor request queues
//! (`queue`), outbound scheduling and replies (`scheduler`) and inbound
//! frame handling (`incoming`).

pub mod incoming;
pub mod pending;
pub mod queue;
pub mod scheduler;

pub use incoming::{Inbound, IncomingProcessor};
pub use pending::{PendingRequest, PendingRequestTracker};
pub use queue::RequestQueues;
pub use scheduler::{GossipScheduler, GossipStats, SchedulerParts, SchedulerSettings};
