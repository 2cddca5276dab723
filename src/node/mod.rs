//! Node wiring
//!
//! A `Node` owns the store, the neighbor registry, the transport and every
//! gossip and confirmation service, and runs each background loop on its
//! own thread. All loops share one stop channel; dropping its sender stops
//! them between ticks.

pub mod workers;

use crate::config::Config;
use crate::core::{
    ConfirmationPropagator, LatestMilestone, LayoutCodec, Sentinel, TipPool, TransactionCodec,
};
use crate::error::Result;
use crate::gossip::{
    GossipScheduler, IncomingProcessor, PendingRequestTracker, RequestQueues, SchedulerParts,
    SchedulerSettings,
};
use crate::network::{FrameLayout, Neighbors, Transport, UdpTransport};
use crate::storage::Store;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
pub use workers::{spawn_ticker, spawn_worker};

pub struct Node {
    config: Config,
    store: Arc<Store>,
    neighbors: Arc<Neighbors>,
    transport: Arc<UdpTransport>,
    milestone: Arc<LatestMilestone>,
    scheduler: Arc<GossipScheduler>,
    incoming: Arc<IncomingProcessor>,
    propagator: Arc<ConfirmationPropagator>,
    stop_tx: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Node {
    /// Open the configured database, bind the transport and wire services
    pub fn new(config: Config) -> Result<Node> {
        let store = Store::open(&config.storage.path)?.with_max_batch_ops(config.storage.max_batch_ops);
        let codec = LayoutCodec::new(config.gossip.tx_size, config.gossip.hash_size)?;
        Node::with_parts(config, Arc::new(store), Arc::new(codec))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<Store>,
        codec: Arc<dyn TransactionCodec>,
    ) -> Result<Node> {
        let tuning = config.tuning();
        let layout = FrameLayout::new(config.gossip.tx_size, config.gossip.hash_size);
        let sentinel = Sentinel::new(config.gossip.hash_size);

        let neighbors = Arc::new(Neighbors::from_entries(&config.neighbors));
        let transport = Arc::new(UdpTransport::bind(
            &config.node.listen_addr,
            layout.frame_size(),
            config.gossip.inbound_capacity,
        )?);
        let milestone = Arc::new(LatestMilestone::new());
        let pending = Arc::new(PendingRequestTracker::new(
            store.clone(),
            config.re_request_interval(),
            &tuning,
        ));
        let queues = Arc::new(RequestQueues::new(
            tuning.max_queue_size,
            config.push_timeout(),
        ));

        let scheduler = Arc::new(GossipScheduler::new(
            SchedulerParts {
                store: store.clone(),
                neighbors: neighbors.clone(),
                transport: transport.clone(),
                pending,
                queues,
                tips: Arc::new(TipPool::default()),
                milestone: milestone.clone(),
                sentinel: sentinel.clone(),
                layout,
            },
            SchedulerSettings::from_config(&config),
        ));
        let incoming = Arc::new(IncomingProcessor::new(scheduler.clone(), codec));
        let propagator = Arc::new(ConfirmationPropagator::new(
            store.clone(),
            config.coordinator_address(),
            sentinel,
        ));

        Ok(Node {
            config,
            store,
            neighbors,
            transport,
            milestone,
            scheduler,
            incoming,
            propagator,
            stop_tx: None,
            workers: Vec::new(),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn neighbors(&self) -> &Arc<Neighbors> {
        &self.neighbors
    }

    pub fn milestone(&self) -> &Arc<LatestMilestone> {
        &self.milestone
    }

    pub fn scheduler(&self) -> &Arc<GossipScheduler> {
        &self.scheduler
    }

    pub fn propagator(&self) -> &Arc<ConfirmationPropagator> {
        &self.propagator
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Recover pending requests and start every background loop
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let (added, total) = self
            .scheduler
            .pending()
            .load_pending_requests(self.neighbors.as_ref(), self.scheduler.queues())?;
        info!("Recovered {added} of {total} pending requests");

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let mut workers = Vec::new();
        workers.push(self.transport.start_receiver(stop_rx.clone())?);
        self.spawn_gossip(&stop_rx, &mut workers)?;
        self.spawn_confirmation(&stop_rx, &mut workers)?;
        self.spawn_housekeeping(&stop_rx, &mut workers)?;

        self.workers = workers;
        self.stop_tx = Some(stop_tx);
        info!(
            "Node listening on {} with {} neighbors",
            self.local_addr()?,
            self.neighbors.len()
        );
        Ok(())
    }

    fn spawn_gossip(&self, stop: &Receiver<()>, workers: &mut Vec<JoinHandle<()>>) -> Result<()> {
        let gossip = &self.config.gossip;

        let incoming = self.incoming.clone();
        let inbound = self.transport.inbound();
        let stop_rx = stop.clone();
        workers.push(spawn_worker("incoming", move || {
            incoming.run(&inbound, &stop_rx)
        })?);

        let scheduler = self.scheduler.clone();
        let stop_rx = stop.clone();
        workers.push(spawn_worker("responses", move || {
            scheduler.run_responses(&stop_rx)
        })?);

        let scheduler = self.scheduler.clone();
        let stop_rx = stop.clone();
        workers.push(spawn_worker("replies", move || {
            scheduler.run_replies(&stop_rx)
        })?);

        let scheduler = self.scheduler.clone();
        workers.push(spawn_ticker(
            "outgoing",
            Duration::from_millis(gossip.outgoing_tick_ms),
            stop.clone(),
            move || {
                scheduler.outgoing_runner();
            },
        )?);

        let scheduler = self.scheduler.clone();
        workers.push(spawn_ticker(
            "periodic-request",
            Duration::from_millis(gossip.periodic_request_interval_ms),
            stop.clone(),
            move || {
                scheduler.periodic_request();
            },
        )?);

        let scheduler = self.scheduler.clone();
        workers.push(spawn_ticker(
            "periodic-tip",
            Duration::from_millis(gossip.periodic_tip_interval_ms),
            stop.clone(),
            move || {
                scheduler.periodic_tip_request();
            },
        )?);
        Ok(())
    }

    fn spawn_confirmation(
        &self,
        stop: &Receiver<()>,
        workers: &mut Vec<JoinHandle<()>>,
    ) -> Result<()> {
        let propagator = self.propagator.clone();
        workers.push(spawn_ticker(
            "confirm",
            self.config.confirm_interval(),
            stop.clone(),
            move || {
                if let Err(e) = propagator.run_cycle() {
                    error!("Confirmation cycle failed: {e}");
                }
            },
        )?);
        Ok(())
    }

    fn spawn_housekeeping(
        &self,
        stop: &Receiver<()>,
        workers: &mut Vec<JoinHandle<()>>,
    ) -> Result<()> {
        let store = self.store.clone();
        let scheduler = self.scheduler.clone();
        workers.push(spawn_ticker(
            "maintenance",
            self.config.tuning().cleanup_interval,
            stop.clone(),
            move || {
                if let Err(e) = store.maintain() {
                    warn!("Database maintenance failed: {e}");
                }
                match scheduler.prune_fingerprints() {
                    Ok(0) => {}
                    Ok(pruned) => info!("Pruned {pruned} reply fingerprints"),
                    Err(e) => warn!("Failed to prune fingerprints: {e}"),
                }
            },
        )?);

        if self.config.node.report_interval_secs > 0 {
            let scheduler = self.scheduler.clone();
            let incoming = self.incoming.clone();
            let propagator = self.propagator.clone();
            let transport = self.transport.clone();
            workers.push(spawn_ticker(
                "report",
                Duration::from_secs(self.config.node.report_interval_secs),
                stop.clone(),
                move || {
                    info!(
                        "Received {} ({} new), outgoing {} / {} sent, pending {}, tips {}, inbound {}, confirmed {}",
                        incoming.received(),
                        incoming.new_transactions(),
                        scheduler.stats().outgoing(),
                        scheduler.stats().outgoing_processed(),
                        scheduler.pending().len(),
                        scheduler.tips().len(),
                        transport.inbound_depth(),
                        propagator.total_confirmations()
                    );
                },
            )?);
        }
        Ok(())
    }

    /// Block until every background loop has exited
    pub fn wait(&mut self) {
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("Background loop {name} panicked");
            }
        }
    }

    /// Block until `signal` fires or its sender goes away, then shut down
    pub fn run_until(&mut self, signal: &Receiver<()>) -> Result<()> {
        let _ = signal.recv();
        self.shutdown()
    }

    /// Stop the loops, let in-flight work finish, then flush the store
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down node");
        drop(self.stop_tx.take());
        self.wait();
        let _guard = self.store.lock_gate();
        self.store.flush()?;
        info!("Node stopped");
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.shutdown() {
                error!("Failed to shut down cleanly: {e}");
            }
        }
    }
}
