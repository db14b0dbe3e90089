//! Ring configuration.
//!
//! Loaded from a TOML file, then overridden by environment variables:
//! - `RING_FRAGMENT_SIZE`
//! - `RING_REPLICATION_FACTOR`

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::node::node_data::NodeId;
use crate::protocol::Protocol;
use crate::routing::Ring;
use crate::{
    FRAGMENT_SIZE, MESSAGE_LENGTH, PROBE_TIMEOUT, REPLICATION_FACTOR, REQUEST_TIMEOUT, WORKER_COUNT,
};

/// Static configuration shared by every member of a ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listening address of every ring member, keyed by node id.
    pub nodes: BTreeMap<String, String>,
    /// The successor of every ring member.
    pub successors: BTreeMap<String, String>,
    pub fragment_size: usize,
    pub replication_factor: u32,
    pub probe_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Connection handler threads per node.
    pub workers: usize,
    pub max_message_bytes: u64,
}

impl Default for Config {
    /// The four-node ring `A -> B -> C -> D -> A` on `127.0.0.1:5001..5004`.
    fn default() -> Self {
        let ids = ["A", "B", "C", "D"];
        let nodes = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), format!("127.0.0.1:{}", 5001 + i)))
            .collect();
        let successors = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), ids[(i + 1) % ids.len()].to_string()))
            .collect();

        Config {
            nodes,
            successors,
            fragment_size: FRAGMENT_SIZE,
            replication_factor: REPLICATION_FACTOR,
            probe_timeout_ms: PROBE_TIMEOUT,
            request_timeout_ms: REQUEST_TIMEOUT,
            workers: WORKER_COUNT,
            max_message_bytes: MESSAGE_LENGTH,
        }
    }
}

impl Config {
    /// Loads the config at `path`, or the default ring if `path` is `None`, then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!("Loading config from {:?}", path);
                let contents = std::fs::read_to_string(path)?;
                Config::from_toml(&contents)?
            },
            None => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Builds a config for a ring whose successor order is the order of `nodes`.
    pub fn with_nodes(nodes: &[(&str, SocketAddr)]) -> Self {
        let successors = nodes
            .iter()
            .enumerate()
            .map(|(i, &(id, _))| (id.to_string(), nodes[(i + 1) % nodes.len()].0.to_string()))
            .collect();
        Config {
            nodes: nodes
                .iter()
                .map(|&(id, addr)| (id.to_string(), addr.to_string()))
                .collect(),
            successors,
            ..Config::default()
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("RING_FRAGMENT_SIZE") {
            if let Ok(size) = size.parse() {
                self.fragment_size = size;
            }
        }
        if let Ok(factor) = std::env::var("RING_REPLICATION_FACTOR") {
            if let Ok(factor) = factor.parse() {
                self.replication_factor = factor;
            }
        }
    }

    /// Checks the scalar settings and the ring topology.
    pub fn validate(&self) -> Result<()> {
        if self.fragment_size == 0 {
            return Err(Error::InvalidConfig("fragment_size must be positive".to_string()));
        }
        if self.replication_factor == 0 {
            return Err(Error::InvalidConfig(
                "replication_factor must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".to_string()));
        }
        if self.probe_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be positive".to_string()));
        }
        self.ring().map(|_| ())
    }

    /// Builds the validated ring topology.
    pub fn ring(&self) -> Result<Ring> {
        let mut addrs = BTreeMap::new();
        for (id, addr) in &self.nodes {
            let addr: SocketAddr = addr.parse().map_err(|_| {
                Error::InvalidConfig(format!("node {} has invalid address '{}'", id, addr))
            })?;
            if addrs.insert(NodeId::new(id), addr).is_some() {
                return Err(Error::InvalidConfig(format!("node {} is listed twice", id)));
            }
        }
        let successors: HashMap<NodeId, NodeId> = self
            .successors
            .iter()
            .map(|(from, to)| (NodeId::new(from), NodeId::new(to)))
            .collect();
        Ring::new(addrs, successors)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::new(
            self.probe_timeout(),
            self.request_timeout(),
            self.max_message_bytes,
        )
    }
}
