//! Tincture chat server.
//!
//! Loads configuration, starts the in-process host, wires the chat pipeline
//! and drives it from operator console input until stdin closes or a
//! shutdown signal arrives.

mod app;
mod cli;
mod config;
mod console;
mod logging;
mod signals;

use anyhow::{anyhow, Result};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use app::{report, ChatServer};
use cli::CliArgs;
use config::AppConfig;
use console::parse_line;
use signals::StopReason;

/// Main application struct.
pub struct Application {
    config: AppConfig,
    server: ChatServer,
}

impl Application {
    /// Loads configuration, applies command line overrides, sets up logging
    /// and starts the server.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command line arguments.
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Configuration comes first so logging can honour it.
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if args.threaded_regions {
            config.host.threaded_regions = true;
        }
        if let Some(regions) = args.regions {
            config.host.regions = regions;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        logging::setup_logging(&config.logging)?;
        display_banner();

        let server = ChatServer::start(&config, Handle::current())?;
        info!(
            "📂 Config: {} | Format: {}",
            args.config_path.display(),
            config.chat.format
        );

        Ok(Self { config, server })
    }

    /// Seeds the configured players and serves console input until a stop
    /// signal or end of input.
    pub async fn run(self) -> Result<()> {
        for seed in &self.config.players {
            self.server.seed(seed);
        }
        info!(
            "📋 {} player(s) online, scheduler: {}",
            self.server.roster().len(),
            self.server.pipeline().scheduler().profile()
        );
        info!("✅ Ready. Type '<name>: <message>' to chat, /help for commands");
        info!("🛑 Press Ctrl+C or close input (Ctrl+D) to shut down");

        let mut lines = BufReader::new(stdin()).lines();
        let stop = signals::stop_requested();
        tokio::pin!(stop);
        let mut signals_armed = true;
        let reason = loop {
            tokio::select! {
                signal = &mut stop, if signals_armed => match signal {
                    Ok(reason) => break reason,
                    Err(e) => {
                        // Only end of input can stop the session now.
                        warn!("⚠️ Signal handling unavailable: {}", e);
                        signals_armed = false;
                    }
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line),
                    Ok(None) => break StopReason::InputClosed,
                    Err(e) => {
                        error!("❌ Failed to read console input: {}", e);
                        break StopReason::InputClosed;
                    }
                },
            }
        };

        info!("🛑 Shutting down ({})...", reason);
        let server = self.server;
        tokio::task::spawn_blocking(move || server.shutdown()).await?;
        info!("👋 Tincture shutdown complete");
        Ok(())
    }

    fn handle_line(&self, line: &str) {
        let command = match parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(e) => {
                warn!("⚠️ {}", e);
                return;
            }
        };
        match self.server.execute(command) {
            Ok(Some(ticket)) => {
                tokio::spawn(report(ticket));
            }
            Ok(None) => {}
            Err(e) => warn!("⚠️ {}", e),
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to start tincture: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Application error: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║             🎨 TINCTURE 🎨               ║");
    info!("║          Chat formatting v{:<15}║", version);
    info!("╚══════════════════════════════════════════╝");
}
