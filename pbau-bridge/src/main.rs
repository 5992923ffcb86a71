//! PBAU bridge — entry point.
//!
//! ```text
//! pbau-bridge                          Monitor the configured sequences
//! pbau-bridge discover                 Print the server's sequences as JSON
//! pbau-bridge transport <seq> <mode>   Set play / pause / stop
//! pbau-bridge cue <seq> <cue>          Jump a sequence to a cue
//! pbau-bridge save-project             Save the server's project
//! pbau-bridge --config <path>          Load a custom config TOML
//! pbau-bridge --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pbau_bridge::config::BridgeConfig;
use pbau_bridge::service::{BridgeCommand, BridgeService, DISCOVERY_TIMEOUT};
use pbau_core::TransportState;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pbau-bridge", about = "PandorasAutomation show-control bridge")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pbau-bridge.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Server host (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// Show domain (overrides the config file).
    #[arg(long)]
    domain: Option<i32>,

    /// Sequences to watch, comma separated (overrides the config file).
    #[arg(long, value_delimiter = ',')]
    sequences: Option<Vec<i32>>,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Poll the watched sequences until Ctrl-C.
    Monitor,
    /// Run sequence discovery and print the result as JSON.
    Discover,
    /// Set a sequence's transport mode.
    Transport {
        sequence: i32,
        /// play, pause or stop
        state: TransportState,
    },
    /// Move a sequence to a cue.
    Cue { sequence: i32, cue: i32 },
    /// Save the server's project.
    SaveProject,
}

impl Cli {
    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(domain) = self.domain {
            config.network.domain = domain;
        }
        if let Some(sequences) = &self.sequences {
            config.polling.sequences = sequences.clone();
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        println!("{}", BridgeConfig::default_toml()?);
        return Ok(());
    }

    // Load config.
    let mut config = BridgeConfig::load(&cli.config);
    cli.apply_overrides(&mut config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("pbau-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "server: {}:{} (domain {})",
        config.network.host, config.network.port, config.network.domain
    );

    let service = BridgeService::new(config);

    match cli.command.unwrap_or(Mode::Monitor) {
        Mode::Monitor => {
            // Ctrl-C handler.
            let stop = service.stop_handle();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Ctrl-C received, shutting down");
                stop.store(false, std::sync::atomic::Ordering::SeqCst);
            });
            service.run().await?;
        }
        Mode::Discover => {
            let sequences = service.discover(DISCOVERY_TIMEOUT).await?;
            println!("{}", serde_json::to_string_pretty(&sequences)?);
        }
        Mode::Transport { sequence, state } => {
            service
                .send_command(BridgeCommand::Transport { sequence, state })
                .await?;
        }
        Mode::Cue { sequence, cue } => {
            service
                .send_command(BridgeCommand::Cue { sequence, cue })
                .await?;
        }
        Mode::SaveProject => service.send_command(BridgeCommand::SaveProject).await?,
    }

    Ok(())
}
