use crate::error::{Result, TangleError};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, info, warn};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// A frame received from `source` (ip:port)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub source: String,
    pub frame: Vec<u8>,
}

/// Raw frame exchange with neighbors
pub trait Transport: Send + Sync {
    fn send(&self, destination: &str, frame: &[u8]) -> Result<()>;

    /// Frames received but not yet processed
    fn inbound_depth(&self) -> usize;
}

/// One UDP socket for both directions, so peers see our listen port as the
/// source of everything we send.
pub struct UdpTransport {
    socket: UdpSocket,
    frame_size: usize,
    inbound_tx: Sender<InboundFrame>,
    inbound_rx: Receiver<InboundFrame>,
}

impl UdpTransport {
    pub fn bind(addr: &str, frame_size: usize, capacity: usize) -> Result<UdpTransport> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| TangleError::Network(format!("Failed to bind to {addr}: {e}")))?;
        socket
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| TangleError::Network(format!("Failed to set read timeout: {e}")))?;
        let (inbound_tx, inbound_rx) = bounded(capacity.max(1));
        info!("Transport listening on {addr}");
        Ok(UdpTransport {
            socket,
            frame_size,
            inbound_tx,
            inbound_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn inbound(&self) -> Receiver<InboundFrame> {
        self.inbound_rx.clone()
    }

    /// Read frames into the inbound queue until `stop` fires or disconnects
    pub fn start_receiver(self: &Arc<Self>, stop: Receiver<()>) -> io::Result<JoinHandle<()>> {
        let transport = Arc::clone(self);
        thread::Builder::new()
            .name("udp-receiver".to_string())
            .spawn(move || transport.receive_loop(stop))
    }

    fn receive_loop(&self, stop: Receiver<()>) {
        // One spare byte so oversized datagrams are detectable
        let mut buf = vec![0u8; self.frame_size + 1];
        loop {
            match stop.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    continue
                }
                Err(e) => {
                    warn!("Failed to receive frame: {e}");
                    continue;
                }
            };
            if len != self.frame_size {
                debug!("Dropping {len}-byte datagram from {from}");
                continue;
            }
            let inbound = InboundFrame {
                source: from.to_string(),
                frame: buf[..len].to_vec(),
            };
            match self.inbound_tx.try_send(inbound) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Inbound queue full, dropping frame from {from}"),
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        info!("Transport receiver stopped");
    }
}

impl Transport for UdpTransport {
    fn send(&self, destination: &str, frame: &[u8]) -> Result<()> {
        let addr = destination
            .parse::<SocketAddr>()
            .map_err(|e| TangleError::Network(format!("Invalid address {destination}: {e}")))?;
        self.socket
            .send_to(frame, addr)
            .map_err(|e| TangleError::Network(format!("Failed to send to {addr}: {e}")))?;
        Ok(())
    }

    fn inbound_depth(&self) -> usize {
        self.inbound_rx.len()
    }
}
