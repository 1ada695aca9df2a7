//! drawtree daemon: entry point for running a drawtree node.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use drawtree_crypto::generate_keypair;
use drawtree_node::{init_logging, load_keypair, load_or_generate, save_keypair, DrawtreeNode, NodeConfig};

#[derive(Parser)]
#[command(name = "drawtree-daemon", about = "drawtree blocktree node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "DRAWTREE_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT or SIGTERM.
    Run(RunArgs),

    /// Generate a signing key and write its hex seed to a file.
    Keygen {
        /// Destination key file.
        #[arg(long, default_value = "./drawtree.key")]
        out: PathBuf,

        /// Overwrite an existing key file.
        #[arg(long)]
        force: bool,
    },

    /// Print the account identity of a key file.
    Account {
        #[arg(long, default_value = "./drawtree.key", env = "DRAWTREE_KEY_FILE")]
        key_file: PathBuf,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Address to listen on.
    #[arg(long, env = "DRAWTREE_HOST")]
    host: Option<String>,

    /// Port for P2P connections.
    #[arg(long, env = "DRAWTREE_PORT")]
    port: Option<u16>,

    /// Bootstrap peer addresses (comma-separated: "10.0.0.1:4000,10.0.0.2:4000").
    #[arg(long, env = "DRAWTREE_BOOTSTRAP_PEERS", value_delimiter = ',')]
    bootstrap_peers: Vec<String>,

    /// Signing key file; generated on first run if missing.
    #[arg(long, env = "DRAWTREE_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Propose a node every slot, even without pending transactions.
    #[arg(long, env = "DRAWTREE_PROPOSE_EMPTY")]
    propose_empty: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "DRAWTREE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "DRAWTREE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Seconds between status log lines; 0 disables them.
    #[arg(long, default_value_t = 30, env = "DRAWTREE_STATUS_INTERVAL")]
    status_interval: u64,
}

#[derive(Serialize)]
struct KeyInfo<'a> {
    account: String,
    key_file: &'a Path,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NodeConfig> {
    match path {
        Some(path) => {
            let path_str = path
                .to_str()
                .context("config path is not valid UTF-8")?;
            NodeConfig::from_toml_file(path_str)
                .with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(NodeConfig::default()),
    }
}

fn apply_overrides(config: &mut NodeConfig, args: &RunArgs) {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if !args.bootstrap_peers.is_empty() {
        config.bootstrap_peers = args.bootstrap_peers.clone();
    }
    if let Some(key_file) = &args.key_file {
        config.key_file = key_file.clone();
    }
    if args.propose_empty {
        config.propose_empty = true;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.log_format = format.clone();
    }
}

async fn run(mut config: NodeConfig, args: RunArgs) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args);
    init_logging(config.log_format()?, &config.log_level)?;

    let keys = load_or_generate(&config.key_file)
        .with_context(|| format!("loading key file {}", config.key_file.display()))?;
    if !config.bootstrap_peers.is_empty() {
        tracing::info!("Bootstrap peers: {}", config.bootstrap_peers.join(", "));
    }

    let mut node = DrawtreeNode::with_system_clock(config, keys);
    let handle = node.start().await?;
    tracing::info!(
        account = %handle.account(),
        address = %handle.local_address(),
        "drawtree node running"
    );

    let shutdown = node.shutdown_controller();
    let status_every = Duration::from_secs(args.status_interval);
    let status_loop = async {
        if status_every.is_zero() {
            return std::future::pending::<()>().await;
        }
        let mut interval = tokio::time::interval(status_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            match handle.status().await {
                Ok(status) => tracing::info!(
                    slot = status.current_slot,
                    head = %status.head,
                    depth = status.head_depth,
                    nodes = status.tree_size,
                    leaves = status.leaves,
                    pending = status.pending,
                    "status"
                ),
                Err(e) => tracing::warn!(error = %e, "status query failed"),
            }
        }
    };

    tokio::select! {
        _ = shutdown.wait_for_signal() => {}
        _ = status_loop => {}
    }

    tracing::info!("Shutdown signal received, stopping node");
    node.stop().await?;
    tracing::info!("drawtree daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => run(config, args).await?,
        Command::Keygen { out, force } => {
            if out.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", out.display());
            }
            let keys = generate_keypair()?;
            save_keypair(&out, &keys)?;
            let info = KeyInfo {
                account: keys.account().to_string(),
                key_file: &out,
            };
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Account { key_file } => {
            let keys = load_keypair(&key_file)
                .with_context(|| format!("reading key file {}", key_file.display()))?;
            println!("{}", keys.account());
        }
        Command::Config => {
            print!("{}", config.to_toml_string());
        }
    }

    Ok(())
}
