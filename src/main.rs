//! Starhold server entry point.
//!
//! A multiplayer space-sandbox simulation core written in Rust using:
//! - **bevy_ecs** for entity storage
//! - **crossbeam-channel** and a worker pool for action dispatch
//! - **configparser** for the INI configuration file
//!
//! # Startup
//!
//! 1. Load `starhold.ini` (or `--config PATH`); missing keys keep defaults
//! 2. Apply command-line overrides (`--host`, `--port`, `--server-id`)
//! 3. Build the registry, optionally seed the demo system
//! 4. Start the dispatcher workers and register in the session directory
//! 5. Serve newline-delimited JSON over TCP until stdin closes
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --seed-demo --port 3000
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use starhold::error::SimError;
use starhold::resources::dispatcher::Dispatcher;
use starhold::resources::gateway::Gateway;
use starhold::resources::registry::Registry;
use starhold::resources::session::{LocalSession, SessionDirectory, generate_server_id};
use starhold::resources::simclock::SystemClock;
use starhold::resources::simconfig::SimConfig;
use starhold::scenario::seed_demo;
use starhold::server::SimServer;
use starhold::systems::actions::ActionTable;

/// Starhold space-sandbox server
#[derive(Parser)]
#[command(version, about = "Simulation core of a multiplayer space sandbox.")]
struct Cli {
    /// Path to the INI configuration file.
    #[arg(long, value_name = "PATH", default_value = "./starhold.ini")]
    config: PathBuf,

    /// Interface to listen on (overrides [server] host).
    #[arg(long)]
    host: Option<String>,

    /// TCP port (overrides [server] port).
    #[arg(long)]
    port: Option<u16>,

    /// Identity of this server in the session directory.
    #[arg(long)]
    server_id: Option<String>,

    /// Populate the registry with the sample star system.
    #[arg(long)]
    seed_demo: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = SimConfig::with_path(&cli.config);
    if cli.config.exists() {
        if let Err(e) = config.load_from_file().map_err(SimError::Config) {
            error!("{} ({})", e, e.kind());
            std::process::exit(1);
        }
    } else {
        warn!("Config file {:?} not found, using defaults", cli.config);
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.server_id.is_some() {
        config.server_id = cli.server_id;
    }

    // Early-exit: write config and quit
    if cli.write_config {
        match config.save_to_file() {
            Ok(()) => println!("Configuration written to {}", config.config_path.display()),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let server_id = config.server_id.clone().unwrap_or_else(generate_server_id);
    let listen_addr = config.listen_addr();
    let auto_claim = config.auto_claim;

    let mut registry = Registry::new(config, Arc::new(SystemClock::new()));
    if cli.seed_demo {
        match seed_demo(&mut registry) {
            Ok(demo) => {
                for id in demo.all() {
                    info!("  {}", id);
                }
            }
            Err(e) => {
                error!("Failed to seed demo system: {}", e);
                std::process::exit(1);
            }
        }
    }

    let dispatcher = Arc::new(Dispatcher::start(registry, ActionTable::with_builtin()));
    let directory = Arc::new(SessionDirectory::new());
    let session = LocalSession::register(server_id, directory);
    let gateway = Gateway::new(Arc::new(session.clone()), Arc::clone(&dispatcher));

    let handle = match SimServer::new(gateway, session.clone(), auto_claim).start(&listen_addr) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to listen on {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };
    info!("Press Ctrl-D (close stdin) to stop");

    // Block until stdin closes; Ctrl-C simply terminates the process.
    let mut sink = Vec::new();
    let _ = std::io::stdin().read_to_end(&mut sink);

    info!("Server shutting down");
    handle.shutdown();
    handle.join();
    session.deregister();
}
