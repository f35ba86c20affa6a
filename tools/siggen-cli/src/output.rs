//! Output selection shared by all commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use crossbeam_channel::Receiver;
use siggen_core::{Controller, PlaybackReport, Sample, Sink, TargetGeometry};
use tracing::info;

use crate::config::{Config, OutputConfig};
use crate::device::{self, DeviceOutput, DeviceSink};
use crate::wav::WavSink;

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Signal configuration file
    #[arg(short, long, default_value = "signals.toml")]
    pub config: PathBuf,

    /// Render to a WAV file instead of the default audio device
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Samples per channel in one output period
    #[arg(long)]
    pub period_size: Option<usize>,

    /// WAV sample format (s16le, s16be, s32le, s32be)
    #[arg(long)]
    pub format: Option<String>,
}

impl OutputArgs {
    /// Load the config file and apply the output overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = crate::config::load(&self.config)?;
        if let Some(rate) = self.sample_rate {
            config.output.sample_rate = rate;
        }
        if let Some(period) = self.period_size {
            config.output.period_size = period;
        }
        if let Some(format) = &self.format {
            config.output.format = format.clone();
        }
        Ok(config)
    }
}

/// An opened sink
pub enum Output {
    Device {
        sink: DeviceSink,
        stream: DeviceOutput,
    },
    Wav(WavSink),
}

impl Output {
    pub fn open(args: &OutputArgs, config: &OutputConfig, channels: usize) -> Result<Self> {
        match &args.wav {
            Some(path) => {
                let geometry = TargetGeometry {
                    sample_rate: config.sample_rate,
                    channels,
                    format: config.pcm_format()?,
                    period_size: config.period_size,
                };
                Ok(Output::Wav(WavSink::create(path, geometry)?))
            }
            None => {
                let (stream, sink) = device::open(channels, config.sample_rate, config.period_size)?;
                info!("Opened device with config: {}", sink.geometry());
                Ok(Output::Device { sink, stream })
            }
        }
    }

    pub fn geometry(&self) -> &TargetGeometry {
        match self {
            Output::Device { sink, .. } => sink.geometry(),
            Output::Wav(sink) => sink.geometry(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Output::Wav(_))
    }

    /// Play `channels` to completion.
    pub fn play(self, controller: Controller, channels: Vec<Receiver<Sample>>) -> Result<PlaybackReport> {
        let report = match self {
            Output::Device { sink, stream } => {
                let report = controller.play(sink, channels)?.wait()?;
                drop(stream);
                report
            }
            Output::Wav(sink) => controller.play(sink, channels)?.wait()?,
        };
        info!(
            "Played {} buffers ({} bytes, {} short)",
            report.buffers, report.bytes, report.short_buffers
        );
        Ok(report)
    }
}
