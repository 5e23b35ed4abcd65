//! Chronoflux Simulator
//!
//! Builds the Alpha/Beta/Gamma triad, gossips one signed message from Alpha
//! and prints what each node accepted.

use anyhow::{Context, Result};
use chronoflux_core::{logging, ChronofluxConfig};
use chronoflux_crypto::{KeyProvider, SeededKeyProvider};
use chronoflux_mesh::{FixedSensor, MeshNetwork, MetricsSnapshot, TracingSink};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

const NODES: [&str; 3] = ["Alpha", "Beta", "Gamma"];

/// Reading reported by a Byzantine Gamma.
const BYZANTINE_READING: f64 = 5.0;

#[derive(Parser)]
#[command(name = "chronoflux-sim")]
#[command(about = "Run a three-node Chronoflux mesh and gossip one message")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Vorticity carried by the message
    #[arg(long, default_value_t = 0.85)]
    vorticity: f64,

    /// Message content
    #[arg(long, default_value = "Temporal Sync")]
    content: String,

    /// Make Gamma report a wildly wrong measurement
    #[arg(long)]
    byzantine: bool,

    /// Coherence Φ assigned to every node
    #[arg(long, default_value_t = 0.74)]
    coherence: f64,

    /// Seed for deterministic node keys
    #[arg(long, default_value = "chronoflux-sim")]
    seed: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct NodeReport {
    id: String,
    coherence: f64,
    log_len: usize,
}

#[derive(Debug, Serialize)]
struct SimReport {
    message_id: String,
    forwarded_to: Vec<String>,
    nodes: Vec<NodeReport>,
    metrics: MetricsSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ChronofluxConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ChronofluxConfig::default(),
    };
    if cli.json {
        config.logging.json = true;
    }
    logging::init_with(&config.logging)?;

    let mesh = MeshNetwork::new(config, Arc::new(TracingSink))?;
    let provider = SeededKeyProvider::new(cli.seed.as_bytes().to_vec());

    for id in NODES {
        if cli.byzantine && id == "Gamma" {
            let keys = provider.provision(id)?;
            let sensor = Arc::new(FixedSensor(BYZANTINE_READING));
            mesh.create_node_with_sensor(id, keys, cli.coherence, sensor)?;
        } else {
            mesh.provision_node(&provider, id, cli.coherence)?;
        }
    }
    mesh.link("Alpha", "Beta")?;
    mesh.link("Alpha", "Gamma")?;
    mesh.link("Beta", "Gamma")?;

    let alpha = mesh.node("Alpha").context("Alpha not registered")?;
    let message = alpha.sign_message_now(cli.vorticity, 0.0, cli.content.into_bytes());
    let message_id = message.message_id();

    let forwarded_to = mesh.gossip("Alpha", message).await?;
    mesh.wait_idle().await;

    let nodes = NODES
        .iter()
        .filter_map(|id| mesh.node(id))
        .map(|node| NodeReport {
            id: node.id().to_string(),
            coherence: node.coherence(),
            log_len: node.log_len(),
        })
        .collect();

    let report = SimReport {
        message_id: message_id.to_hex(),
        forwarded_to,
        nodes,
        metrics: mesh.metrics(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
