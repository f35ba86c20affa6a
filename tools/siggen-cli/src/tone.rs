//! Tone command - play a stereo pair of sine waves

use anyhow::{Context, Result, bail};
use clap::Args;
use crossbeam_channel::Receiver;
use siggen_core::{CancelToken, Controller, Sample, SineWave, Tone, spawn_source};
use tracing::info;

use crate::config::Config;
use crate::output::{Output, OutputArgs};

#[derive(Args, Debug)]
pub struct ToneArgs {
    /// Left channel frequency in Hz
    #[arg(long)]
    pub left_frequency: Option<f64>,

    /// Left channel amplitude (-1.0 to 1.0)
    #[arg(long, allow_hyphen_values = true)]
    pub left_amplitude: Option<f64>,

    /// Left channel phase in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub left_phase: Option<f64>,

    /// Right channel frequency in Hz
    #[arg(long)]
    pub right_frequency: Option<f64>,

    /// Right channel amplitude (-1.0 to 1.0)
    #[arg(long, allow_hyphen_values = true)]
    pub right_amplitude: Option<f64>,

    /// Right channel phase in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub right_phase: Option<f64>,

    /// Stop after this many seconds (required with --wav)
    #[arg(short, long)]
    pub duration: Option<f64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl ToneArgs {
    fn apply(&self, config: &mut Config) {
        let overrides = [
            (&mut config.left.frequency, self.left_frequency),
            (&mut config.left.amplitude, self.left_amplitude),
            (&mut config.left.phase, self.left_phase),
            (&mut config.right.frequency, self.right_frequency),
            (&mut config.right.amplitude, self.right_amplitude),
            (&mut config.right.phase, self.right_phase),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

pub fn execute(args: ToneArgs) -> Result<()> {
    let mut config = args.output.load_config()?;
    args.apply(&mut config);
    let left = Tone::from(&config.left);
    let right = Tone::from(&config.right);

    let output = Output::open(&args.output, &config.output, 2)?;
    let sample_rate = output.geometry().sample_rate;
    let limit = args
        .duration
        .map(|seconds| sample_count(seconds, sample_rate))
        .transpose()?;
    if output.is_file() && limit.is_none() {
        bail!("--duration is required when rendering to a WAV file");
    }

    info!(
        "Left: {} Hz, amplitude {}, phase {}°; right: {} Hz, amplitude {}, phase {}°",
        left.frequency, left.amplitude, left.phase, right.frequency, right.amplitude, right.phase
    );

    let controller = Controller::new(config.output.queue_depth(sample_rate));
    let depth = controller.queue_depth();
    let token = controller.source_token();
    let channels = vec![
        sine_source("sine-left", left, sample_rate, limit, depth, token)?,
        sine_source("sine-right", right, sample_rate, limit, depth, token)?,
    ];

    output.play(controller, channels)?;
    Ok(())
}

fn sine_source(
    name: &'static str,
    tone: Tone,
    sample_rate: u32,
    limit: Option<usize>,
    depth: usize,
    token: &CancelToken,
) -> Result<Receiver<Sample>> {
    let sine = SineWave::new(tone, sample_rate).with_context(|| format!("Invalid {name} tone"))?;
    let samples = match limit {
        Some(count) => spawn_source(name, sine.take(count), depth, token)?,
        None => spawn_source(name, sine, depth, token)?,
    };
    Ok(samples)
}

/// Number of samples in `seconds` of audio
fn sample_count(seconds: f64, sample_rate: u32) -> Result<usize> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("Duration must be a positive number of seconds, got {}", seconds);
    }
    Ok((seconds * f64::from(sample_rate)).round() as usize)
}
