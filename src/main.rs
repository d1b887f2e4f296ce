// Main entry point for the lilith-gate middleware
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use lilith_gate::config::{self, Config};
use lilith_gate::engine::PolicyEngine;
use lilith_gate::mcp::proxy::FirewallProxy;
use lilith_gate::state::PendingActionStore;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Target tool server command (e.g., "python")
    #[arg(short, long)]
    target_cmd: Option<String>,

    /// Path to the rule YAML file (defaults to ./lilith-gate.yaml, then the
    /// bundled rules)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server name selecting a per-server override section in the rule file
    #[arg(long)]
    server_name: Option<String>,

    /// Enable debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Write a starter rule file to the current directory and exit
    #[arg(long)]
    generate_config: bool,

    /// Target tool server arguments (e.g. "tools.py")
    #[arg(last = true)]
    target_args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    install_panic_hook();

    if cli.generate_config {
        let path = config::generate_rules_file(std::path::Path::new("."))?;
        println!("Generated {}", path.display());
        println!("Edit this file to customize the gate rules.");
        println!("The gate auto-detects it in the current directory.");
        return Ok(());
    }

    let mut config = Config::from_env().unwrap_or_else(|e| {
        eprintln!(
            "Warning: Failed to load config from env, using defaults: {}",
            e
        );
        Config::default()
    });
    if let Some(p) = cli.config {
        config.rules_path = Some(p);
    }
    config.server_name = cli.server_name;
    if cli.verbose {
        config.log_level = "debug".to_string();
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to init tracing: {}", e);
    }

    let target_cmd = cli
        .target_cmd
        .ok_or_else(|| anyhow::anyhow!("Missing --target-cmd (or use --generate-config)"))?;

    info!("lilith-gate starting");
    info!("   Target : {} {:?}", target_cmd, cli.target_args);
    info!(
        "   Rules  : {}",
        config
            .rules_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(bundled default)".to_string())
    );
    info!(
        "   Server : {}",
        config.server_name.as_deref().unwrap_or("(global only)")
    );

    let server_name = config.server_name.clone();
    let policy = match config::resolve_rules_path(config.rules_path.as_deref()) {
        Some(path) => PolicyEngine::load(&path, server_name.as_deref())?,
        None => PolicyEngine::from_yaml(config::DEFAULT_RULES, server_name.as_deref())?,
    };
    let store = PendingActionStore::new(config.otp_ttl, config.otp_max_attempts);

    let mut proxy = FirewallProxy::new(
        target_cmd,
        cli.target_args,
        policy,
        store,
        Arc::new(config),
    );

    match proxy.run().await {
        Ok(()) => {
            info!("Session ended");
            // The stdin reader may still be parked in a blocking read;
            // exit without waiting for it.
            std::process::exit(0);
        }
        Err(e) => {
            error!("Fatal error in gate proxy: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC: {} at {}", message, location);
    }));
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    // Logs go to stderr; stdout carries the JSON-RPC stream.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("lilith_gate=debug,info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
