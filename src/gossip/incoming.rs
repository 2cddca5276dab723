use crate::core::TransactionCodec;
use crate::error::Result;
use crate::gossip::scheduler::GossipScheduler;
use crate::network::{InboundFrame, PeerRequest, Request};
use crossbeam_channel::{select, Receiver};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Sender is not a neighbor (any more)
    UnknownSource,
    /// Frame handled; `new_transaction` when its transaction was stored now
    Processed { new_transaction: bool },
}

/// Turns inbound frames into stored transactions and queued requests
pub struct IncomingProcessor {
    scheduler: Arc<GossipScheduler>,
    codec: Arc<dyn TransactionCodec>,
    received: AtomicU64,
    new_transactions: AtomicU64,
}

impl IncomingProcessor {
    pub fn new(scheduler: Arc<GossipScheduler>, codec: Arc<dyn TransactionCodec>) -> Self {
        IncomingProcessor {
            scheduler,
            codec,
            received: AtomicU64::new(0),
            new_transactions: AtomicU64::new(0),
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn new_transactions(&self) -> u64 {
        self.new_transactions.load(Ordering::Relaxed)
    }

    pub fn process(&self, inbound: &InboundFrame) -> Result<Inbound> {
        let scheduler = &self.scheduler;
        let Some(neighbor) = scheduler.neighbors().lookup_by_ip_port(&inbound.source) else {
            debug!("Dropping frame from unknown source {}", inbound.source);
            return Ok(Inbound::UnknownSource);
        };
        self.received.fetch_add(1, Ordering::Relaxed);

        let (tx_bytes, requested) = scheduler.layout().decompose(&inbound.frame)?;

        let mut own_hash = None;
        let mut new_transaction = false;
        if tx_bytes.iter().any(|&b| b != 0) {
            let tx = self.codec.decode(tx_bytes)?;
            if tx.persist(scheduler.store())? {
                new_transaction = true;
                self.new_transactions.fetch_add(1, Ordering::Relaxed);
                scheduler.pending().remove_pending_request(&tx.hash)?;

                let tips = scheduler.tips();
                tips.remove(&tx.trunk);
                tips.remove(&tx.branch);
                tips.add(&tx.hash);

                scheduler.request_if_missing(&tx.trunk, &inbound.source)?;
                scheduler.request_if_missing(&tx.branch, &inbound.source)?;
                scheduler.broadcast(tx_bytes, neighbor.get_addr());
            }
            own_hash = Some(tx.hash);
        }

        let tip = scheduler.sentinel().is_hash(requested) || own_hash.as_deref() == Some(requested);
        scheduler.submit_request(PeerRequest {
            request: Request {
                requested: requested.to_vec(),
                tip,
            },
            source: inbound.source.clone(),
        });
        Ok(Inbound::Processed { new_transaction })
    }

    /// Process frames from `inbound` until `stop` fires
    pub fn run(&self, inbound: &Receiver<InboundFrame>, stop: &Receiver<()>) {
        info!("Incoming processor started");
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(inbound) -> frame => match frame {
                    Ok(frame) => {
                        if let Err(e) = self.process(&frame) {
                            warn!("Failed to process frame from {}: {e}", frame.source);
                        }
                    }
                    Err(_) => break,
                },
            }
        }
        info!("Incoming processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FingerprintPolicy, GossipTuning};
    use crate::core::{has_transaction, LatestMilestone, LayoutCodec, Sentinel, TipPool};
    use crate::gossip::{PendingRequestTracker, RequestQueues, SchedulerParts, SchedulerSettings};
    use crate::network::{FrameLayout, Message, Neighbor, Neighbors};
    use crate::storage::Store;
    use crate::testnet::{hash_of, RecordingTransport, HASH_SIZE, TX_SIZE};
    use std::time::Duration;

    const A: &str = "10.0.0.1:14600";

    fn processor() -> (Arc<GossipScheduler>, Arc<RecordingTransport>, IncomingProcessor, LayoutCodec) {
        let store = Arc::new(Store::temporary().unwrap());
        let neighbors = Arc::new(Neighbors::new());
        neighbors.add_neighbor(Neighbor::new("udp://a", "10.0.0.1", 14600));
        neighbors.add_neighbor(Neighbor::new("udp://b", "10.0.0.2", 14600));
        let transport = Arc::new(RecordingTransport::new());
        let scheduler = Arc::new(GossipScheduler::new(
            SchedulerParts {
                store: store.clone(),
                neighbors,
                transport: transport.clone(),
                pending: Arc::new(PendingRequestTracker::new(
                    store,
                    Duration::from_secs(10),
                    &GossipTuning::normal(),
                )),
                queues: Arc::new(RequestQueues::new(16, Duration::from_millis(10))),
                tips: Arc::new(TipPool::default()),
                milestone: Arc::new(LatestMilestone::new()),
                sentinel: Sentinel::new(HASH_SIZE),
                layout: FrameLayout::new(TX_SIZE, HASH_SIZE),
            },
            SchedulerSettings {
                tip_request_interval: Duration::from_secs(60),
                max_incoming: 100,
                push_timeout: Duration::from_millis(10),
                fingerprint_policy: FingerprintPolicy::Record,
                fingerprint_ttl: Duration::from_secs(10),
                outgoing_queue_size: 16,
                reply_queue_size: 16,
            },
        ));
        let codec = LayoutCodec::new(TX_SIZE, HASH_SIZE).unwrap();
        let incoming = IncomingProcessor::new(scheduler.clone(), Arc::new(codec));
        (scheduler, transport, incoming, codec)
    }

    fn frame(layout: FrameLayout, bytes: Vec<u8>, requested: Vec<u8>) -> Vec<u8> {
        layout.compose(&Message {
            bytes,
            requested,
            destination: None,
            explicit: false,
        })
    }

    #[test]
    fn test_new_transaction_is_stored_and_spread() {
        let (scheduler, transport, incoming, codec) = processor();
        let bytes = codec.encode(&[1u8; HASH_SIZE], 0, 1_700_000_000, &hash_of(2), &hash_of(3), b"");
        let hash = codec.hash_of(&bytes);
        scheduler
            .pending()
            .add_pending_request(&hash, None, None, true)
            .unwrap();

        let inbound = InboundFrame {
            source: A.to_string(),
            frame: frame(scheduler.layout(), bytes.clone(), hash.clone()),
        };
        assert_eq!(
            incoming.process(&inbound).unwrap(),
            Inbound::Processed { new_transaction: true }
        );

        assert!(has_transaction(scheduler.store(), &hash).unwrap());
        assert!(!scheduler.pending().contains(&hash));
        assert!(scheduler.pending().contains(&hash_of(2)));
        assert!(scheduler.pending().contains(&hash_of(3)));
        assert_eq!(scheduler.queues().len("udp://a"), 2);
        assert_eq!(scheduler.tips().len(), 1);

        // Broadcast reached only the other neighbor
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "10.0.0.2:14600");
        assert_eq!(&sent[0].1[..TX_SIZE], bytes.as_slice());

        // Requested hash equal to its own hash is a tip request
        assert_eq!(scheduler.reply_depth(), 1);

        assert_eq!(
            incoming.process(&inbound).unwrap(),
            Inbound::Processed { new_transaction: false }
        );
        assert_eq!(incoming.new_transactions(), 1);
        assert_eq!(incoming.received(), 2);
    }

    #[test]
    fn test_unknown_source_is_dropped() {
        let (scheduler, transport, incoming, _) = processor();
        let inbound = InboundFrame {
            source: "10.9.9.9:1".to_string(),
            frame: frame(scheduler.layout(), vec![], vec![]),
        };
        assert_eq!(incoming.process(&inbound).unwrap(), Inbound::UnknownSource);
        assert_eq!(scheduler.reply_depth(), 0);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_request_only_frame_queues_reply() {
        let (scheduler, _, incoming, _) = processor();
        let inbound = InboundFrame {
            source: A.to_string(),
            frame: frame(scheduler.layout(), vec![], hash_of(5)),
        };
        incoming.process(&inbound).unwrap();
        assert_eq!(scheduler.store().count_with_tag(crate::storage::Tag::Hash).unwrap(), 0);
        assert_eq!(scheduler.reply_depth(), 1);
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let (_, _, incoming, _) = processor();
        let inbound = InboundFrame {
            source: A.to_string(),
            frame: vec![1u8; 10],
        };
        assert!(incoming.process(&inbound).is_err());
    }
}
