//! Gossip messages and the fixed-size frame layout

use crate::error::{Result, TangleError};

/// Something a peer wants from us, or we want from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub requested: Vec<u8>,
    pub tip: bool,
}

/// A request together with the ip:port it arrived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRequest {
    pub request: Request,
    pub source: String,
}

/// An outbound frame before it is laid out.
///
/// `destination` is a neighbor's ip:port; none means every neighbor.
/// `explicit` is set when `requested` was asked for by name rather than
/// filled in by a fallback (tip hash, sampled pending entry, zeros).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub bytes: Vec<u8>,
    pub requested: Vec<u8>,
    pub destination: Option<String>,
    pub explicit: bool,
}

/// `transaction bytes ++ requested hash`, both fixed length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub tx_size: usize,
    pub hash_size: usize,
}

impl FrameLayout {
    pub fn new(tx_size: usize, hash_size: usize) -> FrameLayout {
        FrameLayout { tx_size, hash_size }
    }

    pub fn frame_size(&self) -> usize {
        self.tx_size + self.hash_size
    }

    /// Lay out a message, padding or truncating each part to its size
    pub fn compose(&self, message: &Message) -> Vec<u8> {
        let mut frame = vec![0u8; self.frame_size()];
        let n = message.bytes.len().min(self.tx_size);
        frame[..n].copy_from_slice(&message.bytes[..n]);
        let m = message.requested.len().min(self.hash_size);
        frame[self.tx_size..self.tx_size + m].copy_from_slice(&message.requested[..m]);
        frame
    }

    pub fn decompose<'a>(&self, frame: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
        if frame.len() != self.frame_size() {
            return Err(TangleError::InvalidFrame(format!(
                "expected {} bytes, got {}",
                self.frame_size(),
                frame.len()
            )));
        }
        Ok(frame.split_at(self.tx_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_parts_are_zero_padded() {
        let layout = FrameLayout::new(8, 4);
        let frame = layout.compose(&Message {
            bytes: vec![1, 2, 3],
            requested: vec![9, 9, 9, 9, 9, 9],
            destination: None,
            explicit: false,
        });
        assert_eq!(frame.len(), 12);

        let (tx, requested) = layout.decompose(&frame).unwrap();
        assert_eq!(tx, &[1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(requested, &[9, 9, 9, 9]);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let layout = FrameLayout::new(1604, 46);
        assert_eq!(layout.frame_size(), 1650);
        assert!(layout.decompose(&[0u8; 1604]).is_err());
    }
}
