//! RingCtl - Command line tool for driving Ringleader nodes
//!
//! Usage:
//!   ringctl status            - Show node status
//!   ringctl elect             - Trigger an election round on the node
//!   ringctl lock              - Request the critical section
//!   ringctl unlock            - Release the critical section / forward the token
//!   ringctl send <content>    - Log a multicast message
//!   ringctl health            - Health check

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

/// Ringleader node control tool
#[derive(Parser)]
#[command(name = "ringctl")]
#[command(about = "Control and monitor Ringleader nodes", long_about = None)]
struct Cli {
    /// HTTP API endpoint of the node to talk to
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node status
    Status,
    /// Trigger an election round on the node
    Elect,
    /// Request the critical section
    Lock,
    /// Release the critical section / forward an unused token
    Unlock,
    /// Log a multicast message
    Send {
        /// Message content
        content: String,
    },
    /// Health check
    Health,
}

// ============ API Response Types ============

#[derive(Debug, Deserialize)]
struct NodeStatus {
    rank: u32,
    cluster_size: u32,
    election: ElectionStatus,
    mutex: MutexStatus,
    multicast: MulticastStatus,
}

#[derive(Debug, Deserialize)]
struct ElectionStatus {
    coordinator_rank: Option<u32>,
    is_coordinator: bool,
    election_in_progress: bool,
}

#[derive(Debug, Deserialize)]
struct MutexStatus {
    has_token: bool,
    in_critical_section: bool,
    wants_access: bool,
    entries: u64,
}

#[derive(Debug, Deserialize)]
struct MulticastStatus {
    logical_clock: u64,
    log_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let endpoint = cli.endpoint.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let status: NodeStatus = client
                .get(format!("{}/status", endpoint))
                .send()
                .await
                .with_context(|| format!("request to {} failed", endpoint))?
                .json()
                .await
                .context("invalid status payload")?;

            println!("Node {} of {}", status.rank, status.cluster_size);
            println!();
            println!("Election:");
            match status.election.coordinator_rank {
                Some(rank) if status.election.is_coordinator => {
                    println!("  Coordinator:  {} (this node)", rank)
                }
                Some(rank) => println!("  Coordinator:  {}", rank),
                None => println!("  Coordinator:  unknown"),
            }
            println!("  In Progress:  {}", status.election.election_in_progress);
            println!();
            println!("Mutex:");
            println!("  Has Token:    {}", status.mutex.has_token);
            println!("  In Section:   {}", status.mutex.in_critical_section);
            println!("  Wants Access: {}", status.mutex.wants_access);
            println!("  Entries:      {}", status.mutex.entries);
            println!();
            println!("Multicast:");
            println!("  Clock:        {}", status.multicast.logical_clock);
            println!("  Log Size:     {}", status.multicast.log_size);
        }

        Commands::Elect => {
            post(&client, &endpoint, "/election/start").await?;
            println!("Election round triggered");
        }

        Commands::Lock => {
            post(&client, &endpoint, "/mutex/request").await?;
            println!("Critical section requested");
        }

        Commands::Unlock => {
            post(&client, &endpoint, "/mutex/release").await?;
            println!("Released");
        }

        Commands::Send { content } => {
            let response = client
                .post(format!("{}/multicast/send", endpoint))
                .json(&serde_json::json!({ "content": content }))
                .send()
                .await
                .with_context(|| format!("request to {} failed", endpoint))?;
            let body: serde_json::Value = response.json().await.context("invalid reply")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", endpoint))
                .send()
                .await
                .with_context(|| format!("request to {} failed", endpoint))?;
            let body: serde_json::Value = response.json().await.context("invalid reply")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

/// POST to a node endpoint and fail on a non-success status
async fn post(client: &reqwest::Client, endpoint: &str, path: &str) -> Result<()> {
    let response = client
        .post(format!("{}{}", endpoint, path))
        .send()
        .await
        .with_context(|| format!("request to {}{} failed", endpoint, path))?;

    anyhow::ensure!(
        response.status().is_success(),
        "node answered {}",
        response.status()
    );
    Ok(())
}
