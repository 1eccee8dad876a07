use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use talkback::Config;

mod cli;

#[derive(Parser)]
#[command(name = "talkback")]
#[command(about = "Converse with a process that answers over UDP")]
#[command(version)]
struct Cli {
    /// Working directory used to find .talkback/config.toml (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session with the target (default)
    Chat {
        /// Target process name (overrides delivery.target)
        #[arg(short, long)]
        target: Option<String>,

        /// Window title of the target process
        #[arg(short, long)]
        window: Option<String>,
    },

    /// Print incoming datagrams until Ctrl+C
    Listen {
        /// Port to listen on (overrides listener.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Send reply fragments to a listener
    Sink {
        /// Fragments to send, one datagram each
        fragments: Vec<String>,

        /// Send the end-of-reply sentinel afterwards
        #[arg(long)]
        finish: bool,

        /// Port to send to (overrides listener.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Write a default configuration file
    Init {
        /// Write ./.talkback/config.toml instead of the global file
        #[arg(long)]
        local: bool,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let work_dir = cli.path.unwrap_or_else(|| PathBuf::from("."));

    let command = cli.command.unwrap_or(Commands::Chat {
        target: None,
        window: None,
    });

    match command {
        Commands::Init { local, force } => {
            cli::init::init_command(&work_dir, cli.config, local, force)?;
        }
        Commands::Chat { target, window } => {
            let mut config = Config::load(cli.config.as_deref(), &work_dir)?;
            if let Some(target) = target {
                config.delivery.target = target;
            }
            if window.is_some() {
                config.delivery.window_title = window;
            }
            cli::chat::chat_command(config).await?;
        }
        Commands::Listen { port } => {
            let mut config = Config::load(cli.config.as_deref(), &work_dir)?;
            if let Some(port) = port {
                config.listener.port = port;
            }
            cli::listen::listen_command(config.listener).await?;
        }
        Commands::Sink {
            fragments,
            finish,
            port,
        } => {
            let mut config = Config::load(cli.config.as_deref(), &work_dir)?;
            if let Some(port) = port {
                config.listener.port = port;
            }
            cli::sink::sink_command(&config, &fragments, finish)?;
        }
    }

    Ok(())
}
