//! Tick ledger light client
//!
//! Connects to the configured peers, follows the committee and confirmed
//! ticks, and prints every client event as one JSON line on stdout.

use anyhow::Result;
use clap::Parser;
use lrv_client::{ClientEvent, LightClient, SledStore};
use lrv_transport::Hub;
use lrv_wire::DefaultCrypto;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::NodeConfig;

/// Quorum-verifying light client
#[derive(Parser, Debug)]
#[command(name = "lrv")]
#[command(about = "Quorum-verifying light client for the tick ledger", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peer to connect to; replaces the configured peers (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Identity to follow in addition to the configured ones (repeatable)
    #[arg(long = "subscribe")]
    subscriptions: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Data directory for the transaction store
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };
        if !self.peers.is_empty() {
            config.peers = self.peers;
        }
        config.subscriptions.extend(self.subscriptions);
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = args.into_config()?;
    let peers = config.peer_addresses()?;
    if peers.is_empty() {
        anyhow::bail!("no peers configured; pass --peer or set \"peers\" in the config file");
    }

    tracing::info!("Starting light client");
    tracing::info!("  Peers: {}", config.peers.join(", "));
    tracing::info!("  Checkpoint epoch: {}", config.client.trust_anchor.checkpoint.epoch);
    tracing::info!("  Target tick duration: {}ms", config.client.target_tick_duration_ms);
    tracing::info!("  Data directory: {:?}", config.data_dir);

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(SledStore::open(config.data_dir.join("transactions"))?);

    tracing::warn!("Verifying with blake3/ed25519; peers must use the same primitives");
    let client = LightClient::new(config.client.clone(), Arc::new(DefaultCrypto::new()), store.clone())?;
    let printer = tokio::spawn(print_events(client.subscribe_events()));

    let hub = Hub::new(config.transport.clone(), Arc::new(client.clone()));
    client.attach(Arc::new(hub.clone()));

    for identity in &config.subscriptions {
        client.subscribe(identity)?;
    }
    hub.connect(peers)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    hub.shutdown();
    client.shutdown();
    store.flush()?;
    printer.abort();

    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<ClientEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(error) => tracing::warn!("Unprintable event: {}", error),
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
