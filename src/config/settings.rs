use crate::error::{Result, TangleError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

const NODE_ADDRESS_KEY: &str = "TANGLE_NODE_ADDRESS";
const DB_PATH_KEY: &str = "TANGLE_DB_PATH";
const LOW_END_KEY: &str = "TANGLE_LOW_END";

pub const DEFAULT_NODE_ADDR: &str = "0.0.0.0:14600";
pub const DEFAULT_TX_SIZE: usize = 1604;
pub const DEFAULT_HASH_SIZE: usize = 46;

/// Node configuration, read from a TOML file with every section optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeSettings,
    pub storage: StorageSettings,
    pub gossip: GossipSettings,
    pub confirm: ConfirmSettings,
    pub neighbors: Vec<NeighborEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// UDP address the transport binds to
    pub listen_addr: String,
    /// Resource-constrained profile
    pub low_end: bool,
    /// Hex-encoded coordinator address, exempt from trim-pending deferral
    pub coordinator_address: String,
    /// Seconds between counter reports in the log
    pub report_interval_secs: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_NODE_ADDR.to_string(),
            low_end: false,
            coordinator_address: String::new(),
            report_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub path: String,
    /// Operations per write batch before it is committed and reopened
    pub max_batch_ops: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: "data".to_string(),
            max_batch_ops: 10_000,
        }
    }
}

/// How `respond` treats the reply fingerprint of a sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintPolicy {
    /// Record the fingerprint after a send and suppress exact repeats until it expires
    Record,
    /// Check for a fingerprint but never record one
    Passthrough,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GossipSettings {
    pub tx_size: usize,
    pub hash_size: usize,
    pub tip_request_interval_ms: u64,
    pub re_request_interval_secs: u64,
    pub outgoing_tick_ms: u64,
    pub periodic_request_interval_ms: u64,
    pub periodic_tip_interval_ms: u64,
    /// Inbound queue depth above which the outgoing runner skips a tick
    pub max_incoming: usize,
    /// Capacity of the transport's inbound queue
    pub inbound_capacity: usize,
    pub max_queue_size: Option<usize>,
    pub reply_queue_size: usize,
    pub outgoing_queue_size: usize,
    pub push_timeout_ms: u64,
    pub fingerprint_policy: FingerprintPolicy,
    pub fingerprint_ttl_secs: u64,
}

impl Default for GossipSettings {
    fn default() -> Self {
        Self {
            tx_size: DEFAULT_TX_SIZE,
            hash_size: DEFAULT_HASH_SIZE,
            tip_request_interval_ms: 200,
            re_request_interval_secs: 10,
            outgoing_tick_ms: 100,
            periodic_request_interval_ms: 1_000,
            periodic_tip_interval_ms: 5_000,
            max_incoming: 100,
            inbound_capacity: 1_000,
            max_queue_size: None,
            reply_queue_size: 1_000,
            outgoing_queue_size: 1_000,
            push_timeout_ms: 100,
            fingerprint_policy: FingerprintPolicy::Record,
            fingerprint_ttl_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfirmSettings {
    pub interval_ms: u64,
}

impl Default for ConfirmSettings {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

/// Statically configured neighbor
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NeighborEntry {
    pub address: String,
    pub ip: String,
    pub port: u16,
}

/// Numbers that depend on the normal / low-end profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GossipTuning {
    pub old_pending_sample: usize,
    pub any_pending_sample: usize,
    pub tip_interval_multiplier: u32,
    pub max_queue_size: usize,
    pub cleanup_interval: Duration,
}

impl GossipTuning {
    pub fn normal() -> Self {
        Self {
            old_pending_sample: 1_000,
            any_pending_sample: 10_000,
            tip_interval_multiplier: 1,
            max_queue_size: 5_000,
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }

    pub fn low_end() -> Self {
        Self {
            old_pending_sample: 200,
            any_pending_sample: 300,
            tip_interval_multiplier: 5,
            max_queue_size: 1_000,
            cleanup_interval: Duration::from_secs(2 * 60),
        }
    }
}

impl Config {
    /// Read the TOML file at `path`, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let text = fs::read_to_string(&path).map_err(|e| {
            TangleError::Config(format!(
                "couldn't read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let mut config = Config::from_toml(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    /// Defaults plus environment overrides, used when no file is given
    pub fn from_env() -> Config {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = env::var(NODE_ADDRESS_KEY) {
            self.node.listen_addr = addr;
        }
        if let Ok(path) = env::var(DB_PATH_KEY) {
            self.storage.path = path;
        }
        if let Ok(flag) = env::var(LOW_END_KEY) {
            self.node.low_end = flag != "0" && !flag.eq_ignore_ascii_case("false");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.gossip.tx_size == 0 || self.gossip.hash_size == 0 {
            return Err(TangleError::Config(
                "tx_size and hash_size must be non-zero".to_string(),
            ));
        }
        if self.gossip.outgoing_tick_ms == 0 || self.confirm.interval_ms == 0 {
            return Err(TangleError::Config(
                "loop intervals must be non-zero".to_string(),
            ));
        }
        if !self.node.coordinator_address.is_empty() {
            hex::decode(&self.node.coordinator_address).map_err(|e| {
                TangleError::Config(format!("coordinator_address is not hex: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn tuning(&self) -> GossipTuning {
        let mut tuning = if self.node.low_end {
            GossipTuning::low_end()
        } else {
            GossipTuning::normal()
        };
        if let Some(size) = self.gossip.max_queue_size {
            tuning.max_queue_size = size;
        }
        tuning
    }

    pub fn coordinator_address(&self) -> Vec<u8> {
        hex::decode(&self.node.coordinator_address).unwrap_or_default()
    }

    pub fn tip_request_interval(&self) -> Duration {
        Duration::from_millis(self.gossip.tip_request_interval_ms)
            * self.tuning().tip_interval_multiplier
    }

    pub fn re_request_interval(&self) -> Duration {
        Duration::from_secs(self.gossip.re_request_interval_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.gossip.push_timeout_ms)
    }

    pub fn fingerprint_ttl(&self) -> Duration {
        Duration::from_secs(self.gossip.fingerprint_ttl_secs)
    }

    pub fn confirm_interval(&self) -> Duration {
        Duration::from_millis(self.confirm.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sections() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.gossip.tx_size, 1604);
        assert_eq!(config.gossip.hash_size, 46);
        assert_eq!(config.confirm.interval_ms, 500);
        assert_eq!(config.gossip.fingerprint_policy, FingerprintPolicy::Record);
        assert!(config.neighbors.is_empty());
    }

    #[test]
    fn test_low_end_tuning() {
        let config = Config::from_toml("[node]\nlow_end = true\n").unwrap();
        let tuning = config.tuning();
        assert_eq!(tuning.old_pending_sample, 200);
        assert_eq!(tuning.any_pending_sample, 300);
        assert_eq!(config.tip_request_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_neighbors_and_policy_parse() {
        let text = r#"
            [gossip]
            fingerprint_policy = "passthrough"
            max_queue_size = 12

            [[neighbors]]
            address = "udp://peer-a:14600"
            ip = "10.0.0.2"
            port = 14600
        "#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.gossip.fingerprint_policy, FingerprintPolicy::Passthrough);
        assert_eq!(config.tuning().max_queue_size, 12);
        assert_eq!(config.neighbors.len(), 1);
        assert_eq!(config.neighbors[0].port, 14600);
    }

    #[test]
    fn test_rejects_non_hex_coordinator() {
        let config = Config::from_toml("[node]\ncoordinator_address = \"xyz\"\n").unwrap();
        assert!(config.validate().is_err());
    }
}
