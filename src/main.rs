//! Ringleader - Distributed Leader Election and Token-Ring Mutual Exclusion
//!
//! Runs one coordination node: a TCP server for peer protocol messages and
//! an HTTP API for operators.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ringleader::api::HttpServer;
use ringleader::config::RingleaderConfig;
use ringleader::election::ElectionTiming;
use ringleader::error::Result;
use ringleader::mutex::MutexTiming;
use ringleader::network::{NetworkClient, NetworkServer, PeerTransport};
use ringleader::node::Node;

/// Ringleader - distributed coordination node
#[derive(Parser)]
#[command(name = "ringleader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ringleader.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordination node
    Start,

    /// Query a running node's status over its HTTP API
    Status {
        /// HTTP API endpoint to query
        #[arg(short, long, default_value = "http://localhost:8080")]
        endpoint: String,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "ringleader.toml")]
        output: PathBuf,

        /// This node's rank
        #[arg(long, default_value_t = 0)]
        rank: u32,

        /// Total number of processes in the cluster
        #[arg(long, default_value_t = 3)]
        cluster_size: u32,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Start => run_start(cli.config).await,
        Commands::Status { endpoint } => run_status(endpoint).await,
        Commands::Init {
            output,
            rank,
            cluster_size,
        } => run_init(output, rank, cluster_size),
        Commands::Validate => run_validate(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Start the coordination node
async fn run_start(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting Ringleader node...");

    // Load configuration
    let config = match RingleaderConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            return Err(e);
        }
    };
    let identity = Arc::new(config.identity()?);
    tracing::info!(
        "Loaded configuration: rank {} of {}",
        identity.rank(),
        identity.cluster_size()
    );

    // Peer transport
    let transport: Arc<dyn PeerTransport> = Arc::new(NetworkClient::new(
        Arc::clone(&identity),
        config.connect_timeout(),
    ));

    // Assemble the node
    let node = Arc::new(Node::new(
        Arc::clone(&identity),
        transport,
        ElectionTiming {
            request_timeout: config.election_timeout(),
            announce_timeout: config.announce_timeout(),
            retry_delay: config.election_retry_delay(),
        },
        MutexTiming {
            transfer_timeout: config.token_timeout(),
            hold_time: config.critical_section_hold(),
        },
    ));
    if identity.rank() == 0 {
        tracing::info!("Holding the initial token (rank 0)");
    }

    // Peer server
    let peer_server = Arc::new(NetworkServer::new(
        config.node.bind_address.clone(),
        node.message_handler(),
    ));
    let peer_task = {
        let server = Arc::clone(&peer_server);
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                tracing::error!("Peer server error: {}", e);
            }
        })
    };

    // HTTP API
    let http_server = HttpServer::new(config.api.clone(), Arc::clone(&node));
    tokio::spawn(async move {
        if let Err(e) = http_server.start().await {
            tracing::error!("HTTP API error: {}", e);
        }
    });

    tracing::info!("Node is up; waiting for peers");

    tokio::select! {
        _ = peer_task => {
            tracing::error!("Peer server stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    peer_server.stop();
    Ok(())
}

/// Query a running node's status
async fn run_status(endpoint: String) -> Result<()> {
    let url = format!("{}/status", endpoint.trim_end_matches('/'));

    let response = reqwest::get(url.as_str())
        .await
        .map_err(|e| ringleader::Error::Network(format!("request to {} failed: {}", url, e)))?;
    let status: serde_json::Value = response
        .json()
        .await
        .map_err(|e| ringleader::Error::Network(format!("invalid status payload: {}", e)))?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Initialize a new configuration file
fn run_init(output: PathBuf, rank: u32, cluster_size: u32) -> Result<()> {
    if cluster_size == 0 || rank >= cluster_size {
        return Err(ringleader::Error::Config(format!(
            "rank {} is out of range for a cluster of {}",
            rank, cluster_size
        )));
    }

    let peers = (0..cluster_size)
        .map(|r| format!("\"127.0.0.1:{}\"", 7600 + r))
        .collect::<Vec<_>>()
        .join(", ");

    let template = format!(
        r#"# Ringleader node configuration
[node]
rank = {rank}
cluster_size = {cluster_size}
bind_address = "0.0.0.0:{peer_port}"

[cluster]
# Peer addresses indexed by rank (entry {rank} is this node)
peers = [{peers}]
election_timeout_ms = 2000
announce_timeout_ms = 3000
token_timeout_ms = 5000
election_retry_delay_ms = 500
critical_section_hold_ms = 2000
connect_timeout_ms = 1000

[api]
enabled = true
bind_address = "0.0.0.0:{api_port}"
cors_enabled = false

[logging]
level = "info"
format = "pretty"
"#,
        rank = rank,
        cluster_size = cluster_size,
        peers = peers,
        peer_port = 7600 + rank,
        api_port = 8080 + rank,
    );

    std::fs::write(&output, template)?;

    println!("Configuration written to {}", output.display());
    println!("Then start with: ringleader start --config {}", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match RingleaderConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Rank:           {}", config.node.rank);
            println!("  Cluster Size:   {}", config.node.cluster_size);
            println!("  Bind Address:   {}", config.node.bind_address);
            println!("  Peers:          {:?}", config.cluster.peers);
            println!("  Election:       {} ms", config.cluster.election_timeout_ms);
            println!("  Announcement:   {} ms", config.cluster.announce_timeout_ms);
            println!("  Token:          {} ms", config.cluster.token_timeout_ms);
            println!("  API:            {} (enabled: {})", config.api.bind_address, config.api.enabled);
            println!("  Log Level:      {}", config.logging.level);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}
