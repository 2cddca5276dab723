//! Node integration tests
//!
//! Real nodes on loopback UDP with on-disk stores.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tangle_relay::core::{has_transaction, LayoutCodec, TransactionCodec};
use tangle_relay::network::Neighbor;
use tangle_relay::storage::Store;
use tangle_relay::{Config, Node};
use tempfile::tempdir;

fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.node.listen_addr = "127.0.0.1:0".to_string();
    config.node.report_interval_secs = 0;
    config.storage.path = dir.join("db").to_string_lossy().into_owned();
    config.gossip.outgoing_tick_ms = 20;
    config.gossip.periodic_request_interval_ms = 50;
    config.gossip.periodic_tip_interval_ms = 50;
    config.gossip.tip_request_interval_ms = 20;
    config.confirm.interval_ms = 50;
    config
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

#[test]
fn test_start_and_shutdown() {
    let dir = tempdir().unwrap();
    let mut node = Node::new(config(dir.path())).unwrap();
    assert!(!node.is_running());

    node.start().unwrap();
    assert!(node.is_running());
    assert!(node.local_addr().unwrap().port() > 0);

    node.shutdown().unwrap();
    assert!(!node.is_running());
}

#[test]
fn test_tip_spreads_between_neighbors() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let config_a = config(dir_a.path());
    let codec = LayoutCodec::new(config_a.gossip.tx_size, config_a.gossip.hash_size).unwrap();
    let hash_size = config_a.gossip.hash_size;

    let mut a = Node::new(config_a).unwrap();
    let mut b = Node::new(config(dir_b.path())).unwrap();
    let port_a = a.local_addr().unwrap().port();
    let port_b = b.local_addr().unwrap().port();
    a.neighbors()
        .add_neighbor(Neighbor::new("udp://b", "127.0.0.1", port_b));
    b.neighbors()
        .add_neighbor(Neighbor::new("udp://a", "127.0.0.1", port_a));

    let sentinel = vec![0u8; hash_size];
    let bytes = codec.encode(&[1u8; 8], 25, 1_700_000_000, &sentinel, &sentinel, b"hello");
    let tx = codec.decode(&bytes).unwrap();
    assert!(tx.persist(a.store()).unwrap());
    a.scheduler().tips().add(&tx.hash);

    a.start().unwrap();
    b.start().unwrap();

    let store_b = b.store().clone();
    let arrived = wait_for(Duration::from_secs(10), || {
        has_transaction(&store_b, &tx.hash).unwrap_or(false)
    });
    assert!(arrived, "transaction never reached the neighbor");
    assert!(wait_for(Duration::from_secs(2), || b.scheduler().tips().len() == 1));

    b.shutdown().unwrap();
    a.shutdown().unwrap();
}

#[test]
fn test_pending_request_survives_node_restart() {
    let dir = tempdir().unwrap();
    let wanted = vec![9u8; 46];

    {
        let mut node = Node::new(config(dir.path())).unwrap();
        assert!(!node
            .scheduler()
            .request_if_missing(&wanted, "127.0.0.1:9")
            .unwrap());
        node.start().unwrap();
        node.shutdown().unwrap();
    }

    let mut node = Node::new(config(dir.path())).unwrap();
    assert!(!node.scheduler().pending().contains(&wanted));
    node.start().unwrap();
    assert!(node.scheduler().pending().contains(&wanted));
    node.shutdown().unwrap();
}

#[test]
fn test_run_until_shuts_down_on_signal() {
    let dir = tempdir().unwrap();
    let mut node = Node::new(config(dir.path())).unwrap();
    node.start().unwrap();

    let (signal_tx, signal_rx) = crossbeam_channel::bounded::<()>(1);
    let signaller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        signal_tx.send(()).unwrap();
    });
    node.run_until(&signal_rx).unwrap();
    signaller.join().unwrap();
    assert!(!node.is_running());

    // Every worker let go of the database
    drop(node);
    assert!(Store::open(dir.path().join("db")).is_ok());
}
