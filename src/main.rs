//! Binary entrypoint for the meshbot CLI.
//!
//! Commands:
//! - `start [--port <path>]` - run the bot, optionally overriding the configured device
//! - `init` - create a starter `config.toml`
//! - `status` - print configuration and Mastodon login state
//!
//! See the library crate docs for module-level details: `meshbot::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};

use meshbot::config::Config;
use meshbot::errors::StartupError;
use meshbot::server::BridgeServer;

#[derive(Parser)]
#[command(name = "meshbot")]
#[command(about = "Command bot and Mastodon bridge for Meshtastic mesh networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Start {
        /// Meshtastic device port (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Show configuration and login status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { port } => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            info!("Starting meshbot v{}", env!("CARGO_PKG_VERSION"));
            let server = BridgeServer::new(config);
            if let Err(e) = server.run(port).await {
                if let Some(startup) = e.downcast_ref::<StartupError>() {
                    error!("{}", startup);
                    std::process::exit(1);
                }
                return Err(e);
            }
        }
        Commands::Init => {
            init_logging(None, cli.verbose);
            info!("Initializing new meshbot configuration");
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                error!("{} already exists; not overwriting", cli.config);
                std::process::exit(1);
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            BridgeServer::new(config).show_status().await?;
        }
    }

    Ok(())
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    let security_path = config.and_then(|c| c.logging.security_file.clone());

    match log_file {
        Some(f) => {
            let file = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Foreground runs mirror the log to the console
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
