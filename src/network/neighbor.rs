use crate::config::NeighborEntry;
use std::sync::RwLock;

/// A peer we exchange frames with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    addr: String,
    ip: String,
    port: u16,
}

impl Neighbor {
    pub fn new(addr: impl Into<String>, ip: impl Into<String>, port: u16) -> Neighbor {
        Neighbor {
            addr: addr.into(),
            ip: ip.into(),
            port,
        }
    }

    /// Logical address; stable for the neighbor's lifetime
    pub fn get_addr(&self) -> &str {
        &self.addr
    }

    pub fn get_ip(&self) -> &str {
        &self.ip
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn ip_address_with_port(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl From<&NeighborEntry> for Neighbor {
    fn from(entry: &NeighborEntry) -> Self {
        Neighbor::new(entry.address.clone(), entry.ip.clone(), entry.port)
    }
}

/// The node's view of its current peers.
///
/// Gossip components only hold references; membership changes happen
/// elsewhere and may race with them.
pub trait NeighborRegistry: Send + Sync {
    fn list_neighbors(&self) -> Vec<Neighbor>;
    fn lookup_by_address(&self, addr: &str) -> Option<Neighbor>;
    fn lookup_by_ip_port(&self, ip_port: &str) -> Option<Neighbor>;
}

/// In-memory registry fed from configuration
pub struct Neighbors {
    inner: RwLock<Vec<Neighbor>>,
}

impl Default for Neighbors {
    fn default() -> Self {
        Self::new()
    }
}

impl Neighbors {
    pub fn new() -> Neighbors {
        Neighbors {
            inner: RwLock::new(vec![]),
        }
    }

    pub fn from_entries(entries: &[NeighborEntry]) -> Neighbors {
        let neighbors = Neighbors::new();
        for entry in entries {
            neighbors.add_neighbor(Neighbor::from(entry));
        }
        neighbors
    }

    /// Add a neighbor unless one with the same address is already known
    pub fn add_neighbor(&self, neighbor: Neighbor) -> bool {
        match self.inner.write() {
            Ok(mut inner) => {
                if inner.iter().any(|n| n.addr == neighbor.addr) {
                    return false;
                }
                inner.push(neighbor);
                true
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on neighbors");
                false
            }
        }
    }

    pub fn remove_neighbor(&self, addr: &str) -> bool {
        match self.inner.write() {
            Ok(mut inner) => match inner.iter().position(|n| n.addr == addr) {
                Some(idx) => {
                    inner.remove(idx);
                    true
                }
                None => false,
            },
            Err(_) => {
                log::error!("Failed to acquire write lock on neighbors");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.list_neighbors().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, pred: impl Fn(&Neighbor) -> bool) -> Option<Neighbor> {
        match self.inner.read() {
            Ok(inner) => inner.iter().find(|n| pred(n)).cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on neighbors");
                None
            }
        }
    }
}

impl NeighborRegistry for Neighbors {
    fn list_neighbors(&self) -> Vec<Neighbor> {
        match self.inner.read() {
            Ok(inner) => inner.to_vec(),
            Err(_) => {
                log::error!("Failed to acquire read lock on neighbors");
                vec![]
            }
        }
    }

    fn lookup_by_address(&self, addr: &str) -> Option<Neighbor> {
        self.find(|n| n.addr == addr)
    }

    fn lookup_by_ip_port(&self, ip_port: &str) -> Option<Neighbor> {
        self.find(|n| n.ip_address_with_port() == ip_port)
    }
}
