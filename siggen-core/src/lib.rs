//! siggen-core: sample-accurate signal pipeline
//!
//! Synthesizes sine tones and differential-Manchester line code as streams of
//! quantized samples, aligns several streams into multi-channel frames and
//! repacks them into fixed-size PCM buffers for a [`Sink`].
//!
//! # Architecture
//!
//! ```text
//! Source Threads          Merge Thread        Pack Thread        Writer Thread
//!     │                        │                   │                   │
//! [SineWave]──(queue)───►[Gather step]             │                   │
//! [Manchester]─(queue)──►[Emit Frame]──(queue)──►[Encode]              │
//!                              │                 [Cut period]─(queue)─►[Sink::write]
//!                              │                   │                 [Completion event]
//! ```
//!
//! Every stage is a named thread joined to its neighbours by a bounded
//! `crossbeam-channel` queue. A [`CancelToken`] is handed to every stage and is
//! part of every blocking wait, so cancelling never leaves a peer blocked.
//!
//! # Usage
//!
//! ```ignore
//! let controller = Controller::new(441);
//! let left = spawn_source("sine-left", SineWave::new(Tone::default(), 44_100)?, 441, controller.source_token())?;
//! let right = spawn_source("sine-right", SineWave::new(Tone::default(), 44_100)?, 441, controller.source_token())?;
//! let playback = controller.play(sink, vec![left, right])?;
//! let report = playback.wait()?;
//! ```

pub mod cancel;
pub mod clock;
pub mod error;
pub mod format;
pub mod manchester;
pub mod merge;
pub mod pack;
pub mod pipeline;
pub mod sample;
pub mod sine;
pub mod sink;
pub mod source;

mod stage;

pub use cancel::CancelToken;
pub use clock::SampleClock;
pub use error::{SignalError, SinkError};
pub use format::{ByteOrder, PcmFormat, SampleEncoder, SampleWidth, TargetGeometry};
pub use manchester::DifferentialManchester;
pub use merge::merge_channels;
pub use pack::FramePacker;
pub use pipeline::{Controller, Playback, PlaybackReport, StopHandle};
pub use sample::{EncodedBuffer, FULL_SCALE, Frame, Sample};
pub use sine::{SineWave, Tone};
pub use sink::{MemorySink, Sink, SinkEvent, spawn_writer};
pub use source::{bytes_from_slice, spawn_encoder, spawn_reader, spawn_source};
