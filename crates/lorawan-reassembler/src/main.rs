// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LoRaWAN Fragment Reassembler CLI
//!
//! # Usage
//!
//! ```bash
//! # Run with config.yaml (config_dev.yaml when ENV=dev)
//! lorawan-reassembler
//!
//! # Explicit configuration file and log level
//! lorawan-reassembler --config /etc/reassembler.yaml --log-level debug
//!
//! # Generate / validate a configuration file
//! lorawan-reassembler gen-config --output config.yaml
//! lorawan-reassembler validate --config config.yaml
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lorawan_reassembler::config::{LogLevel, EXAMPLE_CONFIG};
use lorawan_reassembler::{Config, Service};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// LoRaWAN Fragment Reassembler
#[derive(Parser, Debug)]
#[command(name = "lorawan-reassembler")]
#[command(about = "Reassembles fragmented LoRaWAN uplinks and forwards the decoded frames")]
#[command(version)]
struct Args {
    /// Configuration file path (default: config.yaml, config_dev.yaml when ENV=dev)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error or a RUST_LOG directive);
    /// overrides RUST_LOG and the configuration file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the service (default)
    Run,

    /// Validate a configuration file
    Validate,

    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);

    let result = match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config_path, args.log_level.as_deref()).await,
        Commands::Validate => cmd_validate(&config_path),
        Commands::GenConfig { output, force } => cmd_gen_config(&output, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                error!("{:#}", e);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &Path, log_level: Option<&str>) -> anyhow::Result<()> {
    let loaded = Config::from_file(config_path);

    init_tracing(
        log_level,
        loaded.as_ref().map(|c| c.log.level).unwrap_or_default(),
    );

    let config = loaded.with_context(|| format!("Failed to load {}", config_path.display()))?;

    info!("LoRaWAN Fragment Reassembler v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path.display());

    let handle = Service::new(config).start().await?;
    info!("Application started and waiting for input...");

    shutdown_signal().await;
    handle.shutdown().await;

    Ok(())
}

/// Precedence: `--log-level`, then `RUST_LOG`, then the config file.
fn init_tracing(cli: Option<&str>, configured: LogLevel) {
    let filter = match cli {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.directive())),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)
        .with_context(|| format!("Configuration invalid: {}", config_path.display()))?;

    let enabled = |on: bool| if on { "enabled" } else { "disabled" };

    println!("Configuration valid!");
    println!();
    println!("LNS:          {}", config.frame.lns);
    println!(
        "Frames:       max {} chunks, {}h timeout",
        config.frame.max_chunks, config.frame.timeout
    );
    println!(
        "MQTT input:   {} ({}:{} '{}')",
        enabled(config.input.mqtt.enable),
        config.input.mqtt.host,
        config.input.mqtt.port,
        config.input.mqtt.topic
    );
    println!(
        "HTTP input:   {} ({}:{})",
        enabled(config.input.http.enable),
        config.input.http.host,
        config.input.http.port
    );
    println!(
        "MQTT output:  {} ({}:{} '{}/<DevEUI>')",
        enabled(config.output.mqtt.enable),
        config.output.mqtt.host,
        config.output.mqtt.port,
        config.output.mqtt.topic
    );
    println!(
        "HTTP output:  {} ({})",
        enabled(config.output.http.enable),
        config.output.http.url.as_deref().unwrap_or("-")
    );
    println!("Local broker: {}", enabled(config.local_broker.enable));
    println!("Decoder:      {}", config.decoder.command.join(" "));

    Ok(())
}

fn cmd_gen_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    std::fs::write(output, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}
