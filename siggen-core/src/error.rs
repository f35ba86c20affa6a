//! Error types for the signal pipeline

use std::io;
use std::time::Duration;

/// Errors raised while building or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Frequency is zero, negative or not finite
    #[error("invalid frequency {0} Hz (must be finite and > 0)")]
    InvalidFrequency(f64),

    #[error("invalid sample rate {0} (must be > 0)")]
    InvalidSampleRate(u32),

    /// The waveform period would be shorter than one sample
    #[error("frequency {frequency} Hz exceeds sample rate {sample_rate}")]
    FrequencyAboveSampleRate { frequency: f64, sample_rate: u32 },

    #[error("invalid amplitude {0} (must be within -1.0..=1.0)")]
    InvalidAmplitude(f64),

    #[error("invalid target geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("unknown sample format '{0}' (expected s16le, s16be, s32le or s32be)")]
    UnknownFormat(String),

    #[error("channel merger needs at least one input")]
    NoInputs,

    #[error("{sources} sources supplied for a {channels}-channel sink")]
    ChannelMismatch { sources: usize, channels: usize },

    #[error("failed to spawn {stage} stage: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    /// A stage thread ended without reporting how (it panicked)
    #[error("{0} stage stopped unexpectedly")]
    StageLost(&'static str),

    /// Terminal failure reported by the sink
    #[error("sink write failed: {0}")]
    Sink(#[from] SinkError),
}

/// Errors reported by [`Sink`](crate::Sink) implementations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Device or encoder specific failure
    #[error("{0}")]
    Backend(String),

    #[error("buffer of {len} bytes is not aligned to {sample_size}-byte samples")]
    Misaligned { len: usize, sample_size: usize },

    #[error("output stalled for {0:?}")]
    Stalled(Duration),

    #[error("sink is closed")]
    Closed,
}
