use crate::network::Request;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

type Queue = (Sender<Request>, Receiver<Request>);

/// Bounded FIFO of explicit requests per neighbor address, created on first
/// use. A push into a full queue waits `push_timeout` and then drops.
pub struct RequestQueues {
    queues: Mutex<HashMap<String, Queue>>,
    capacity: usize,
    push_timeout: Duration,
}

impl RequestQueues {
    pub fn new(capacity: usize, push_timeout: Duration) -> RequestQueues {
        RequestQueues {
            queues: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            push_timeout,
        }
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<String, Queue>> {
        match self.queues.lock() {
            Ok(queues) => queues,
            Err(poisoned) => {
                log::error!("Request queue map poisoned, continuing");
                poisoned.into_inner()
            }
        }
    }

    fn sender(&self, addr: &str) -> Sender<Request> {
        let mut queues = self.queues();
        let (tx, _) = queues
            .entry(addr.to_string())
            .or_insert_with(|| bounded(self.capacity));
        tx.clone()
    }

    fn receiver(&self, addr: &str) -> Option<Receiver<Request>> {
        self.queues().get(addr).map(|(_, rx)| rx.clone())
    }

    /// Returns false when the request was dropped
    pub fn push(&self, addr: &str, request: Request) -> bool {
        // The map lock is released before a possibly blocking send
        let tx = self.sender(addr);
        match tx.send_timeout(request, self.push_timeout) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Request queue for {addr} full, dropping request");
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                debug!("Request queue for {addr} was removed");
                false
            }
        }
    }

    /// Enqueue without waiting; returns false when the queue is full
    pub fn try_push(&self, addr: &str, request: Request) -> bool {
        match self.sender(addr).try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                debug!("Request queue for {addr} was removed");
                false
            }
        }
    }

    pub fn pop(&self, addr: &str) -> Option<Request> {
        self.receiver(addr)?.try_recv().ok()
    }

    pub fn len(&self, addr: &str) -> usize {
        self.receiver(addr).map(|rx| rx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, addr: &str) -> bool {
        self.len(addr) == 0
    }

    /// Forget a neighbor's queue along with anything still in it
    pub fn remove(&self, addr: &str) -> bool {
        self.queues().remove(addr).is_some()
    }
}
