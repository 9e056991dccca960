//! PadBridge GW
//!
//! Relays MIDI between a pad controller and target devices, lighting the pads
//! from local presses or from Voicemeeter.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use padbridge_gw::app;
use padbridge_gw::config::AppConfig;
use padbridge_gw::context::BridgeContext;
use padbridge_gw::transport::hardware;

/// PadBridge Gateway - pad LEDs and MIDI relay for Voicemeeter setups
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (.json, .yaml or .yml)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Validate the configuration, print a summary and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.json)?;

    info!("Starting PadBridge GW v{}", env!("CARGO_PKG_VERSION"));

    if args.list_ports {
        hardware::print_ports().context("failed to enumerate MIDI ports")?;
        return Ok(());
    }

    info!("Configuration file: {}", args.config.display());
    let config = AppConfig::load(&args.config)
        .await
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    info!("Configuration loaded successfully");

    if args.check {
        print_summary(&config);
        return Ok(());
    }

    app::run(config, shutdown_signal())
        .await
        .context("bridge stopped with an error")?;

    info!("PadBridge GW shutdown complete");
    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for Ctrl+C, shutting down: {}", e),
    }
}

fn print_summary(config: &AppConfig) {
    let ctx = BridgeContext::new(config.clone());

    println!("\n{}", "=== Configuration ===".bold().cyan());
    println!("  Mode:    {}", format!("{:?}", config.mode).to_lowercase().green());
    println!("  Source:  {}", config.source_device_name.bright_white());
    if config.target_devices_names.is_empty() {
        println!("  Targets: {}", "(none)".dimmed());
    }
    for name in &config.target_devices_names {
        println!("  Target:  {}", name.bright_white());
    }

    println!("\n{}", format!("Pads ({}):", config.pads_config.len()).bold());
    for (index, pad) in config.pads_config.iter().enumerate() {
        let [r, g, b] = pad.rgb;
        let mut flags = Vec::new();
        if pad.is_static {
            flags.push("static");
        }
        if pad.reverse {
            flags.push("reverse");
        }
        let shadowed = ctx.cc_index.get(pad.cc) != Some(index);
        println!(
            "  {:>2}: cc {:>3}  #{:02X}{:02X}{:02X} {}{}",
            index,
            pad.cc,
            r,
            g,
            b,
            flags.join(",").yellow(),
            if shadowed { " (shadowed by a later pad)".red().to_string() } else { String::new() }
        );
    }

    if !config.vm_parameter_to_cc.is_empty() {
        println!("\n{}", "Voicemeeter parameters:".bold());
        for (parameter, cc) in &config.vm_parameter_to_cc {
            println!("  {} -> cc {}", parameter.yellow(), cc);
        }
    }
    if !config.vm_button_to_cc.is_empty() {
        println!("\n{}", "Voicemeeter macro buttons:".bold());
        for (button, cc) in &config.vm_button_to_cc {
            println!("  button {} -> cc {}", button.to_string().yellow(), cc);
        }
    }

    println!("\n{}", "✅ Configuration is valid".green().bold());
}
