//! Node configuration

use anyhow::Context;
use lrv_client::ClientConfig;
use lrv_transport::{PeerAddress, TransportConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Node configuration, read from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub client: ClientConfig,
    pub transport: TransportConfig,
    /// `host`, `host:port` or `ws://host:port`
    pub peers: Vec<String>,
    /// Identities followed from startup
    pub subscriptions: Vec<String>,
    /// Directory of the transaction store
    pub data_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            transport: TransportConfig::default(),
            peers: Vec::new(),
            subscriptions: Vec::new(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn peer_addresses(&self) -> anyhow::Result<Vec<PeerAddress>> {
        self.peers.iter().map(|peer| peer.parse()).collect()
    }
}
