// src/main.rs
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oscpulse::{
    config::Config,
    controllers::PrintHandler,
    services::ShutdownSignal,
    Error,
};

#[derive(Parser, Debug)]
#[command(name = "oscpulse")]
#[command(about = "Send a fixed set of OSC messages every interval and print what comes back")]
struct Args {
    /// Config file (defaults to config.toml next to the binary, then in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only received messages
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    // Load config
    let config = match args.config {
        Some(path) => Config::load_from(path)?,
        None => match Config::load() {
            Ok(config) => config,
            Err(Error::ConfigFile(e)) => {
                warn!("No config file found ({}), using the built-in demo", e);
                Config::default()
            }
            Err(e) => return Err(e.into()),
        },
    };

    let signal = ShutdownSignal::new();
    signal.install_ctrlc()?;

    let mut message_loop = config.build_loop(PrintHandler)?;
    message_loop.run(&signal)?;

    info!("Sent {} messages, stopped", message_loop.sent_count());
    Ok(())
}
