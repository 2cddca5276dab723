//! Peer-to-peer networking
//!
//! Neighbors, the raw frame transport and the frame layout. What goes into
//! a frame is decided by the gossip layer.

pub mod message;
pub mod neighbor;
pub mod transport;

pub use message::{FrameLayout, Message, PeerRequest, Request};
pub use neighbor::{Neighbor, NeighborRegistry, Neighbors};
pub use transport::{InboundFrame, Transport, UdpTransport};
