use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use molti_maker::chain::InMemoryChain;
use molti_maker::core::config::Config;
use molti_maker::core::persistence::PersistenceManager;
use molti_maker::core::shutdown::Shutdown;
use molti_maker::core::supervisor::Supervisor;

#[derive(Parser)]
#[clap(author, version, about = "Autonomous supervisor that spawns and funds child agents")]
struct Cli {
    /// Path to config file
    #[clap(short, long, default_value = "molti.toml")]
    config: String,

    /// Debug mode
    #[clap(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the supervisor loop (default)
    Run {
        /// Run a single cycle and exit
        #[clap(long)]
        once: bool,

        /// Feed lines from stdin into the chat trend counter
        #[clap(long)]
        chat_stdin: bool,
    },

    /// Write a config file populated with defaults
    InitConfig {
        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },

    /// List the agents in the registry snapshot
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logger
    let log_level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .init();

    // Dispatch the subcommand, running the supervisor by default
    match cli.command.unwrap_or(Command::Run {
        once: false,
        chat_stdin: false,
    }) {
        Command::Run { once, chat_stdin } => run(&cli.config, once, chat_stdin).await,
        Command::InitConfig { force } => init_config(&cli.config, force),
        Command::Status => status(&cli.config),
    }
}

async fn run(config_path: &str, once: bool, chat_stdin: bool) -> Result<()> {
    print_banner();

    // Load configuration
    let config = Config::load(config_path)?;
    info!("Starting Molti-Maker supervisor on {}", config.chain.network);

    // Create the simulated ledger holding the parent wallet
    let chain = Arc::new(
        InMemoryChain::new(&config.chain.network, config.chain.initial_parent_balance)
            .context("Failed to create chain client")?,
    );

    // Initialize supervisor
    let shutdown = Shutdown::new();
    let supervisor = Supervisor::from_config(&config, chain, shutdown.clone())?;

    // Start the chat listener feeding trend detection
    let (chat_tx, listener) = supervisor.chat_channel(256);
    let listener_handle = listener.spawn(shutdown.clone());

    if chat_stdin {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while !shutdown.is_triggered() {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if chat_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read chat from stdin: {}", e);
                        break;
                    }
                }
            }
        });
    } else {
        drop(chat_tx);
    }

    // Stop cleanly on ctrl-c
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after the current step");
                shutdown.trigger();
            }
        });
    }

    // Start supervisor's main loop
    if once {
        let report = supervisor.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        supervisor.run().await?;
    }

    // Release the chat listener
    shutdown.trigger();
    let messages = listener_handle.await.unwrap_or_default();
    info!("Chat listener processed {} messages", messages);

    Ok(())
}

fn init_config(config_path: &str, force: bool) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() && !force {
        bail!(
            "Config file {:?} already exists; pass --force to overwrite",
            path
        );
    }

    // Write default configuration
    let text = Config::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("Failed to write config file: {:?}", path))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn status(config_path: &str) -> Result<()> {
    // Load configuration and the registry snapshot
    let config = Config::load(config_path)?;
    let persistence = PersistenceManager::new(&config.persistence.data_dir)?;
    let agents = persistence.load_agents()?;

    if agents.is_empty() {
        println!("No agents registered");
        return Ok(());
    }

    println!("{} agents registered", agents.len());
    for agent in &agents {
        let summary = agent.summary();
        println!(
            "  {:<32} {:<18} {:<10} {:<11} {}",
            summary.id,
            summary.name,
            summary.status.to_string(),
            if summary.funded { "funded" } else { "unfunded" },
            summary.wallet_address
        );
    }
    Ok(())
}

fn print_banner() {
    println!("\n====================================================");
    println!("  MOLTI-MAKER - Autonomous Agent Supervisor v{}", env!("CARGO_PKG_VERSION"));
    println!("====================================================");
    println!("  ✅ Opportunity Scanner   ✅ Agent Factory");
    println!("  ✅ Treasury              ✅ Registry Snapshots");
    println!("====================================================\n");
}
