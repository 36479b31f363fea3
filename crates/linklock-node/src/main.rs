use anyhow::Result;
use clap::{Parser, Subcommand};
use linklock_node::api;
use linklock_node::config::NodeConfig;
use linklock_node::logging::init_logging;
use linklock_node::node::LockerNode;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "linklock")]
#[command(about = "Link-locker task gating and revenue attribution node", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the linklock node
    Start {
        /// Port for the HTTP API
        #[arg(long)]
        api_port: Option<u16>,

        /// Override the task dwell duration in seconds
        #[arg(long)]
        dwell_secs: Option<u64>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "linklock.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };

    match cli.command {
        Commands::Start {
            api_port,
            dwell_secs,
        } => {
            if let Some(port) = api_port {
                config.api.port = port;
            }
            if let Some(secs) = dwell_secs {
                config.gate.dwell_secs = secs;
            }

            init_logging(&config.logging);
            info!(
                name = %config.node.name,
                dwell_secs = config.gate.dwell_secs,
                "🚀 Starting linklock node"
            );

            let node = LockerNode::new(config.clone())?;
            let _worker = node.start_completion_worker();

            let api_handle = if config.api.enabled {
                Some(api::start_api_server(
                    node.clone(),
                    config.api.host.clone(),
                    config.api.port,
                ))
            } else {
                None
            };

            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            if let Some(handle) = api_handle {
                handle.abort();
            }
        }

        Commands::InitConfig { output } => {
            let config = NodeConfig::default();
            config.save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}
