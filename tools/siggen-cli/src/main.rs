//! siggen - sample-accurate test signals for audio devices
//!
//! # Commands
//!
//! - `siggen tone` - Play a stereo pair of sine waves
//! - `siggen encode` - Play a file (or stdin) as differential Manchester code
//!
//! # Usage
//!
//! ```bash
//! # 1 kHz on both channels until interrupted
//! siggen tone
//!
//! # Quadrature pair, rendered to a file
//! siggen tone --right-phase 90 --duration 5 --wav quadrature.wav
//!
//! # Mono data signal at 1200 bits/s
//! echo "hello" | siggen encode --bits-per-second 1200
//! ```
//!
//! Defaults come from `signals.toml` (see [`config`]); flags override it.

mod config;
mod device;
mod encode;
mod output;
mod tone;
mod wav;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// siggen - sample-accurate test signals for audio devices
#[derive(Parser)]
#[command(name = "siggen")]
#[command(about = "Play calibration tones and Manchester-encoded data")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a stereo pair of sine waves
    Tone(tone::ToneArgs),

    /// Play a byte stream as differential Manchester code (mono)
    Encode(encode::EncodeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Commands::Tone(args) => tone::execute(args),
        Commands::Encode(args) => encode::execute(args),
    }
}
