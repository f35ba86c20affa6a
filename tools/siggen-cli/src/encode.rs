//! Encode command - play a byte stream as differential Manchester code

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use siggen_core::{Controller, DifferentialManchester, spawn_encoder, spawn_reader};
use tracing::info;

use crate::output::{Output, OutputArgs};

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// File to encode (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Bit rate of the encoded signal
    #[arg(short, long)]
    pub bits_per_second: Option<f64>,

    /// Signal amplitude (-1.0 to 1.0); negative values invert polarity
    #[arg(long, allow_hyphen_values = true)]
    pub amplitude: Option<f64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn execute(args: EncodeArgs) -> Result<()> {
    let mut config = args.output.load_config()?;
    if let Some(bps) = args.bits_per_second {
        config.manchester.bits_per_second = bps;
    }
    if let Some(amplitude) = args.amplitude {
        config.manchester.amplitude = amplitude;
    }

    let output = Output::open(&args.output, &config.output, 1)?;
    let sample_rate = output.geometry().sample_rate;
    let encoder = DifferentialManchester::new(
        config.manchester.bits_per_second,
        config.manchester.amplitude,
        sample_rate,
    )
    .context("Invalid Manchester settings")?;
    info!(
        "Encoding at {} bits/s ({} Hz sample rate)",
        config.manchester.bits_per_second, sample_rate
    );

    let controller = Controller::new(config.output.queue_depth(sample_rate));
    let depth = controller.queue_depth();
    let token = controller.source_token();
    let bytes = match &args.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            spawn_reader(file, depth, token)?
        }
        None => spawn_reader(std::io::stdin(), depth, token)?,
    };
    let samples = spawn_encoder(encoder, bytes, depth, token)?;

    output.play(controller, vec![samples])?;
    Ok(())
}
