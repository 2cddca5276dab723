//! Outbound side of the gossip protocol
//!
//! Every frame carries a transaction and a requested hash. The scheduler
//! decides what goes into both halves, who gets it, and when.

use crate::config::{Config, FingerprintPolicy};
use crate::core::{LatestMilestone, Sentinel, TipPool};
use crate::error::Result;
use crate::gossip::pending::PendingRequestTracker;
use crate::gossip::queue::RequestQueues;
use crate::network::{FrameLayout, Message, NeighborRegistry, PeerRequest, Request, Transport};
use crate::storage::{fingerprint_key, pending_key, tx_key, EntityKey, Store, Tag};
use crate::utils::now_secs;
use crossbeam_channel::{bounded, select, Receiver, SendTimeoutError, Sender};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Already scaled for the low-end profile
    pub tip_request_interval: Duration,
    pub max_incoming: usize,
    pub push_timeout: Duration,
    pub fingerprint_policy: FingerprintPolicy,
    pub fingerprint_ttl: Duration,
    pub outgoing_queue_size: usize,
    pub reply_queue_size: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> SchedulerSettings {
        SchedulerSettings {
            tip_request_interval: config.tip_request_interval(),
            max_incoming: config.gossip.max_incoming,
            push_timeout: config.push_timeout(),
            fingerprint_policy: config.gossip.fingerprint_policy,
            fingerprint_ttl: config.fingerprint_ttl(),
            outgoing_queue_size: config.gossip.outgoing_queue_size,
            reply_queue_size: config.gossip.reply_queue_size,
        }
    }
}

/// Everything the scheduler shares with the rest of the node
pub struct SchedulerParts {
    pub store: Arc<Store>,
    pub neighbors: Arc<dyn NeighborRegistry>,
    pub transport: Arc<dyn Transport>,
    pub pending: Arc<PendingRequestTracker>,
    pub queues: Arc<RequestQueues>,
    pub tips: Arc<TipPool>,
    pub milestone: Arc<LatestMilestone>,
    pub sentinel: Sentinel,
    pub layout: FrameLayout,
}

#[derive(Debug, Default)]
pub struct GossipStats {
    outgoing: AtomicU64,
    outgoing_processed: AtomicU64,
}

impl GossipStats {
    /// Messages handed to `respond`
    pub fn outgoing(&self) -> u64 {
        self.outgoing.load(Ordering::Relaxed)
    }

    /// Messages `respond` actually sent
    pub fn outgoing_processed(&self) -> u64 {
        self.outgoing_processed.load(Ordering::Relaxed)
    }
}

pub struct GossipScheduler {
    store: Arc<Store>,
    neighbors: Arc<dyn NeighborRegistry>,
    transport: Arc<dyn Transport>,
    pending: Arc<PendingRequestTracker>,
    queues: Arc<RequestQueues>,
    tips: Arc<TipPool>,
    milestone: Arc<LatestMilestone>,
    sentinel: Sentinel,
    layout: FrameLayout,
    settings: SchedulerSettings,
    last_tip: Mutex<Instant>,
    outgoing_tx: Sender<Message>,
    outgoing_rx: Receiver<Message>,
    reply_tx: Sender<PeerRequest>,
    reply_rx: Receiver<PeerRequest>,
    stats: GossipStats,
}

impl GossipScheduler {
    pub fn new(parts: SchedulerParts, settings: SchedulerSettings) -> GossipScheduler {
        let (outgoing_tx, outgoing_rx) = bounded(settings.outgoing_queue_size.max(1));
        let (reply_tx, reply_rx) = bounded(settings.reply_queue_size.max(1));
        GossipScheduler {
            store: parts.store,
            neighbors: parts.neighbors,
            transport: parts.transport,
            pending: parts.pending,
            queues: parts.queues,
            tips: parts.tips,
            milestone: parts.milestone,
            sentinel: parts.sentinel,
            layout: parts.layout,
            settings,
            last_tip: Mutex::new(Instant::now()),
            outgoing_tx,
            outgoing_rx,
            reply_tx,
            reply_rx,
            stats: GossipStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn neighbors(&self) -> &Arc<dyn NeighborRegistry> {
        &self.neighbors
    }

    pub fn pending(&self) -> &Arc<PendingRequestTracker> {
        &self.pending
    }

    pub fn queues(&self) -> &Arc<RequestQueues> {
        &self.queues
    }

    pub fn tips(&self) -> &Arc<TipPool> {
        &self.tips
    }

    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn stats(&self) -> &GossipStats {
        &self.stats
    }

    pub fn outgoing_depth(&self) -> usize {
        self.outgoing_rx.len()
    }

    pub fn reply_depth(&self) -> usize {
        self.reply_rx.len()
    }

    /// Compose a message for `destination` (ip:port, none for everyone).
    ///
    /// Each half falls back through a fixed cascade so the frame is always
    /// full size. Response: `response`, a random tip, the latest milestone,
    /// zeros. Requested: `requested`, the tip's own hash when `tip` is set,
    /// a cooled-down pending request, any pending request, the response's
    /// own hash, zeros.
    pub fn get_message(
        &self,
        response: Option<Vec<u8>>,
        requested: Option<Vec<u8>>,
        tip: bool,
        destination: Option<&str>,
    ) -> Message {
        let explicit = requested.is_some();
        let mut own_hash = None;
        let bytes = match response {
            Some(bytes) => bytes,
            None => match self.random_tip() {
                Some((hash, bytes)) => {
                    own_hash = Some(hash);
                    bytes
                }
                None => match self.milestone.usable(&self.sentinel) {
                    Some(milestone) => {
                        own_hash = Some(milestone.hash);
                        milestone.bytes
                    }
                    None => vec![0u8; self.layout.tx_size],
                },
            },
        };

        let requested = match requested {
            Some(requested) => Some(requested),
            None if tip => own_hash.clone(),
            None => {
                let exclude = destination
                    .and_then(|dest| self.neighbors.lookup_by_ip_port(dest))
                    .map(|n| n.get_addr().to_string())
                    .or_else(|| destination.map(str::to_string))
                    .unwrap_or_default();
                self.pending
                    .get_old_pending(&exclude)
                    .or_else(|| self.pending.get_any_random_old_pending(&exclude))
                    .map(|p| p.hash)
            }
        };
        let requested = requested
            .or(own_hash)
            .unwrap_or_else(|| self.sentinel.hash().to_vec());

        Message {
            bytes,
            requested,
            destination: destination.map(str::to_string),
            explicit,
        }
    }

    fn random_tip(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        match self.tips.random_tip(&self.store) {
            Ok(tip) => tip,
            Err(e) => {
                warn!("Failed to read a random tip: {e}");
                None
            }
        }
    }

    /// Next hash to ask neighbor `addr` for: its explicit queue first, then
    /// the pending table
    pub fn get_some_request_by_address(&self, addr: &str, any: bool) -> Option<Vec<u8>> {
        self.owed_request(addr, any).map(|(hash, _)| hash)
    }

    // The flag is true when the hash came off the neighbor's queue
    fn owed_request(&self, addr: &str, any: bool) -> Option<(Vec<u8>, bool)> {
        if let Some(request) = self.queues.pop(addr) {
            return Some((request.requested, true));
        }
        let pending = match self.pending.get_old_pending(addr) {
            Some(pending) => Some(pending),
            None if any => self.pending.get_any_random_old_pending(addr),
            None => None,
        };
        pending.map(|p| (p.hash, false))
    }

    /// One tick of the outgoing loop; returns the number of frames sent.
    ///
    /// Skipped entirely while the inbound queue is over its ceiling.
    /// Otherwise every neighbor gets at most one frame: a request if one is
    /// owed, else a tip request when the tip interval has elapsed.
    pub fn outgoing_runner(&self) -> usize {
        let depth = self.transport.inbound_depth();
        if depth > self.settings.max_incoming {
            debug!("Inbound queue at {depth}, skipping outgoing tick");
            return 0;
        }

        let should_request_tip = match self.last_tip.lock() {
            Ok(last_tip) => last_tip.elapsed() > self.settings.tip_request_interval,
            Err(_) => {
                log::error!("Failed to acquire lock on last tip time");
                false
            }
        };

        let mut sent = 0;
        for neighbor in self.neighbors.list_neighbors() {
            let destination = neighbor.ip_address_with_port();
            let message = match self.owed_request(neighbor.get_addr(), false) {
                Some((requested, queued)) => Message {
                    explicit: queued,
                    ..self.get_message(None, Some(requested), false, Some(&destination))
                },
                None if should_request_tip => {
                    if let Ok(mut last_tip) = self.last_tip.lock() {
                        *last_tip = Instant::now();
                    }
                    self.get_message(None, None, true, Some(&destination))
                }
                None => continue,
            };
            match self.respond(message) {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to send to {destination}: {e}"),
            }
        }
        sent
    }

    /// Send `data` to every neighbor except `exclude` (a logical address),
    /// each frame carrying whatever that neighbor owes us
    pub fn broadcast(&self, data: &[u8], exclude: &str) -> usize {
        let mut sent = 0;
        for neighbor in self.neighbors.list_neighbors() {
            if neighbor.get_addr() == exclude {
                continue;
            }
            let request = self.get_some_request_by_address(neighbor.get_addr(), false);
            let tip = request.is_none();
            let destination = neighbor.ip_address_with_port();
            let message = self.get_message(Some(data.to_vec()), request, tip, Some(&destination));
            match self.send_reply(&message) {
                Ok(_) => sent += 1,
                Err(e) => warn!("Failed to broadcast to {destination}: {e}"),
            }
        }
        sent
    }

    /// Queue a generic request for everyone
    pub fn periodic_request(&self) -> bool {
        let message = self.get_message(None, None, false, None);
        self.enqueue_outgoing(message)
    }

    /// Queue a tip request for everyone
    pub fn periodic_tip_request(&self) -> bool {
        let message = self.get_message(None, None, true, None);
        self.enqueue_outgoing(message)
    }

    pub fn enqueue_outgoing(&self, message: Message) -> bool {
        match self
            .outgoing_tx
            .send_timeout(message, self.settings.push_timeout)
        {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Outgoing queue full, dropping message");
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }

    /// Queue a peer's request for the reply loop
    pub fn submit_request(&self, request: PeerRequest) -> bool {
        match self
            .reply_tx
            .send_timeout(request, self.settings.push_timeout)
        {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Request reply queue full, dropping request");
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }

    /// Register `hash` as wanted from the neighbor at `ip_port` unless we
    /// hold it or already want it. Returns true when nothing was requested.
    pub fn request_if_missing(&self, hash: &[u8], ip_port: &str) -> Result<bool> {
        if self.sentinel.is_hash(hash) {
            return Ok(true);
        }
        if self.store.has(&tx_key(hash))?
            || self
                .store
                .has(&pending_key(hash).with_tag(Tag::PendingTimestamp))?
        {
            return Ok(true);
        }

        let neighbor = self.neighbors.lookup_by_ip_port(ip_port);
        let origin = neighbor.as_ref().map(|n| n.get_addr());
        self.pending.add_pending_request(hash, None, origin, true)?;
        if let Some(neighbor) = neighbor {
            self.queues.push(
                neighbor.get_addr(),
                Request {
                    requested: hash.to_vec(),
                    tip: false,
                },
            );
        }
        Ok(false)
    }

    /// Send a composed message unless the same explicit (requested,
    /// destination) pair was sent recently. Returns whether it went out.
    ///
    /// Only explicit requests to one neighbor carry a fingerprint. Tip
    /// requests and hashes picked from the pending table go out every time.
    pub fn respond(&self, message: Message) -> Result<bool> {
        self.store.wait_idle();
        self.stats.outgoing.fetch_add(1, Ordering::Relaxed);

        let fingerprint = match &message.destination {
            Some(destination) if message.explicit && !self.sentinel.is_hash(&message.requested) => {
                Some(fingerprint_key(&message.requested, destination))
            }
            _ => None,
        };
        if let Some(fingerprint) = &fingerprint {
            if !self.claim_fingerprint(fingerprint)? {
                debug!("Already sent {fingerprint}, skipping");
                return Ok(false);
            }
        }

        self.stats.outgoing_processed.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.send_reply(&message) {
            if let (Some(fingerprint), FingerprintPolicy::Record) =
                (&fingerprint, self.settings.fingerprint_policy)
            {
                self.store.remove(fingerprint)?;
            }
            return Err(e);
        }
        Ok(true)
    }

    // Check and stamp in one store transaction so two senders racing on
    // the same pair cannot both get through
    fn claim_fingerprint(&self, fingerprint: &EntityKey) -> Result<bool> {
        match self.settings.fingerprint_policy {
            FingerprintPolicy::Passthrough => Ok(!self.store.has(fingerprint)?),
            FingerprintPolicy::Record => {
                let ttl = self.ttl_secs();
                self.store.transaction(|txn| {
                    let now = now_secs();
                    if let Some(sent_at) = txn.get_value::<i64>(fingerprint)? {
                        if now - sent_at < ttl {
                            return Ok(false);
                        }
                    }
                    txn.put_value(fingerprint, &now)?;
                    Ok(true)
                })
            }
        }
    }

    fn ttl_secs(&self) -> i64 {
        self.settings.fingerprint_ttl.as_secs() as i64
    }

    /// Delete fingerprints older than the TTL; returns how many went
    pub fn prune_fingerprints(&self) -> Result<usize> {
        let cutoff = now_secs() - self.ttl_secs();
        let mut writer = self.store.batch();
        for (key, value) in self.store.entries_with_tag(Tag::Fingerprint)? {
            let expired = match crate::utils::deserialize::<i64>(&value) {
                Ok(sent_at) => sent_at <= cutoff,
                Err(_) => true,
            };
            if expired {
                writer.remove_key(&key)?;
            }
        }
        writer.finish()
    }

    /// Lay out and send without any deduplication; no destination means
    /// every neighbor. Returns the number of frames sent.
    pub fn send_reply(&self, message: &Message) -> Result<usize> {
        let frame = self.layout.compose(message);
        match &message.destination {
            Some(destination) => {
                self.transport.send(destination, &frame)?;
                Ok(1)
            }
            None => {
                let mut sent = 0;
                for neighbor in self.neighbors.list_neighbors() {
                    let destination = neighbor.ip_address_with_port();
                    match self.transport.send(&destination, &frame) {
                        Ok(()) => sent += 1,
                        Err(e) => warn!("Failed to send to {destination}: {e}"),
                    }
                }
                Ok(sent)
            }
        }
    }

    /// Answer one peer request.
    ///
    /// Tip requests and hashes we hold are answered straight away. A hash we
    /// are missing ourselves is re-requested from everyone instead, so the
    /// demand travels on. Anything else is dropped.
    pub fn reply_to_request(&self, request: PeerRequest) -> Result<bool> {
        self.store.wait_idle();
        let PeerRequest { request, source } = request;

        let response = if request.tip {
            None
        } else {
            crate::core::transaction_bytes(&self.store, &request.requested)?
        };
        if request.tip || response.is_some() {
            let message = self.get_message(response, None, false, Some(&source));
            self.send_reply(&message)?;
            return Ok(true);
        }

        if self.pending.contains(&request.requested)
            || self
                .store
                .has(&pending_key(&request.requested).with_tag(Tag::PendingTimestamp))?
        {
            let message = self.get_message(None, Some(request.requested), false, None);
            return Ok(self.enqueue_outgoing(message));
        }

        debug!("Dropping request for unknown hash from {source}");
        Ok(false)
    }

    /// Drain the outgoing queue until `stop` fires
    pub fn run_responses(&self, stop: &Receiver<()>) {
        info!("Response runner started");
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(self.outgoing_rx) -> message => match message {
                    Ok(message) => {
                        if let Err(e) = self.respond(message) {
                            warn!("Failed to respond: {e}");
                        }
                    }
                    Err(_) => break,
                },
            }
        }
        info!("Response runner stopped");
    }

    /// Drain the request reply queue until `stop` fires
    pub fn run_replies(&self, stop: &Receiver<()>) {
        info!("Request reply runner started");
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(self.reply_rx) -> request => match request {
                    Ok(request) => {
                        if let Err(e) = self.reply_to_request(request) {
                            warn!("Failed to reply to request: {e}");
                        }
                    }
                    Err(_) => break,
                },
            }
        }
        info!("Request reply runner stopped");
    }

    /// Handle whatever is queued right now without blocking
    pub fn drain_once(&self) -> usize {
        let mut handled = 0;
        while let Ok(request) = self.reply_rx.try_recv() {
            if let Err(e) = self.reply_to_request(request) {
                warn!("Failed to reply to request: {e}");
            }
            handled += 1;
        }
        while let Ok(message) = self.outgoing_rx.try_recv() {
            if let Err(e) = self.respond(message) {
                warn!("Failed to respond: {e}");
            }
            handled += 1;
        }
        handled
    }
}
