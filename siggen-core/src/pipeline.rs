//! Pipeline controller
//!
//! Wires source streams through the merger, packer and writer for one sink and
//! owns the two cancellation scopes of a run:
//!
//! - **sources** (child token): cancelled by [`StopHandle::stop`]. Generators
//!   end, the merger ends on the first closed input, the packer flushes its
//!   residual and the sink drains. Graceful.
//! - **shutdown** (parent token): cancelled by [`StopHandle::abort`] or a sink
//!   failure. Every stage stops at its next wait; partial data is dropped.

use crossbeam_channel::Receiver;
use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::error::SignalError;
use crate::merge::merge_channels;
use crate::pack::FramePacker;
use crate::sample::Sample;
use crate::sink::{Sink, SinkEvent, spawn_writer};

/// Encoded buffers queued between the packer and the sink
const BUFFER_QUEUE_DEPTH: usize = 2;

/// Builds a pipeline; hand [`source_token`](Self::source_token) to every
/// generator, then call [`play`](Self::play).
pub struct Controller {
    stop: StopHandle,
    queue_depth: usize,
}

impl Controller {
    /// `queue_depth` is the capacity of the sample and frame queues.
    pub fn new(queue_depth: usize) -> Self {
        let shutdown = CancelToken::new();
        let sources = shutdown.child_token();
        Self {
            stop: StopHandle { shutdown, sources },
            queue_depth,
        }
    }

    /// Token for source stages. Cancelled by both stop and abort.
    pub fn source_token(&self) -> &CancelToken {
        &self.stop.sources
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Start merging `channels` into `sink`.
    ///
    /// `channels` must hold one stream per sink channel, in channel order. On
    /// error every source is cancelled.
    pub fn play<S: Sink>(self, sink: S, channels: Vec<Receiver<Sample>>) -> Result<Playback, SignalError> {
        let started = self.start(sink, channels);
        if started.is_err() {
            self.stop.abort();
        }
        started
    }

    fn start<S: Sink>(&self, sink: S, channels: Vec<Receiver<Sample>>) -> Result<Playback, SignalError> {
        let geometry = sink.geometry().clone();
        geometry.validate()?;
        if channels.len() != geometry.channels {
            return Err(SignalError::ChannelMismatch {
                sources: channels.len(),
                channels: geometry.channels,
            });
        }

        let shutdown = &self.stop.shutdown;
        let packer = FramePacker::new(geometry.frame_byte_size(), geometry.format)?;
        let frame_bytes = packer.frame_bytes();

        let frames = merge_channels(channels, self.queue_depth, shutdown)?;
        let buffers = packer.spawn(frames, BUFFER_QUEUE_DEPTH, shutdown)?;
        let events = spawn_writer(sink, buffers, shutdown)?;

        info!("Stream started ({})", geometry);
        Ok(Playback {
            events,
            stop: self.stop.clone(),
            frame_bytes,
        })
    }
}

/// Cloneable handle to end a run from any thread.
#[derive(Clone, Debug)]
pub struct StopHandle {
    shutdown: CancelToken,
    sources: CancelToken,
}

impl StopHandle {
    /// Stop the generators and let buffered data drain into the sink.
    pub fn stop(&self) {
        debug!("Stopping sources");
        self.sources.cancel();
    }

    /// Stop every stage immediately.
    pub fn abort(&self) {
        debug!("Aborting pipeline");
        self.shutdown.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Buffers accepted by the sink
    pub buffers: u64,
    /// Bytes accepted by the sink
    pub bytes: u64,
    /// Buffers shorter than a full period (the final flush)
    pub short_buffers: u64,
}

/// A running pipeline. Dropping it aborts the run.
pub struct Playback {
    events: Receiver<SinkEvent>,
    stop: StopHandle,
    frame_bytes: usize,
}

impl Playback {
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Block until the sink closes.
    ///
    /// Returns the first sink failure, after aborting every stage. A writer that
    /// dies without closing the sink is reported as [`SignalError::StageLost`].
    pub fn wait(self) -> Result<PlaybackReport, SignalError> {
        let mut report = PlaybackReport::default();
        for event in self.events.iter() {
            match event {
                SinkEvent::Written { bytes } => {
                    report.buffers += 1;
                    report.bytes += bytes as u64;
                    if bytes < self.frame_bytes {
                        report.short_buffers += 1;
                    }
                }
                SinkEvent::Failed(e) => {
                    error!("Sink failed after {} buffers: {}", report.buffers, e);
                    self.stop.abort();
                    return Err(e.into());
                }
                SinkEvent::Closed => {
                    info!(
                        "Stream finished: {} buffers, {} bytes",
                        report.buffers, report.bytes
                    );
                    return Ok(report);
                }
            }
        }

        error!("Writer stopped after {} buffers without closing the sink", report.buffers);
        self.stop.abort();
        Err(SignalError::StageLost("writer"))
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::format::{PcmFormat, TargetGeometry};
    use crate::sine::{SineWave, Tone};
    use crate::sink::MemorySink;
    use crate::source::spawn_source;
    use std::thread;
    use std::time::{Duration, Instant};

    fn stereo(format: PcmFormat, period_size: usize) -> TargetGeometry {
        TargetGeometry {
            sample_rate: 8_000,
            channels: 2,
            format,
            period_size,
        }
    }

    #[test]
    fn test_bounded_sources_play_to_completion() {
        let sink = MemorySink::new(stereo(PcmFormat::S32_LE, 16));
        let controller = Controller::new(8);
        let left: Vec<Sample> = (0..100).collect();
        let right: Vec<Sample> = (0..100).map(|v| -v * 1000).collect();

        let channels = vec![
            spawn_source("left", left.clone(), 8, controller.source_token()).unwrap(),
            spawn_source("right", right.clone(), 8, controller.source_token()).unwrap(),
        ];
        let report = controller.play(sink.clone(), channels).unwrap().wait().unwrap();

        // 100 stereo frames * 8 bytes = 800 bytes = 6 periods of 128 + 32
        assert_eq!(report.bytes, 800);
        assert_eq!(report.buffers, 7);
        assert_eq!(report.short_buffers, 1);
        assert!(sink.is_finished());

        let decoded = PcmFormat::S32_LE.decode(&sink.bytes());
        let expected: Vec<Sample> = left
            .iter()
            .zip(&right)
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_stop_drains_whole_frames() {
        let sink = MemorySink::new(stereo(PcmFormat::S16_LE, 64));
        let controller = Controller::new(16);
        let sine = SineWave::new(Tone::default(), 8_000).unwrap();
        let channels = vec![
            spawn_source("left", sine.clone(), 16, controller.source_token()).unwrap(),
            spawn_source("right", sine, 16, controller.source_token()).unwrap(),
        ];
        let playback = controller.play(sink.clone(), channels).unwrap();
        let stop = playback.stop_handle();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stop.stop();
        });

        let report = playback.wait().unwrap();
        assert!(report.short_buffers <= 1);
        assert_eq!(report.bytes as usize % 4, 0);
        assert!(sink.is_finished());

        // Both channels carry the same tone, so every frame is symmetric
        let decoded = PcmFormat::S16_LE.decode(&sink.bytes());
        assert!(decoded.chunks(2).all(|f| f[0] == f[1]));
    }

    #[test]
    fn test_sink_failure_aborts_infinite_sources() {
        let sink = MemorySink::failing_after(stereo(PcmFormat::S16_LE, 32), 3);
        let controller = Controller::new(8);
        let source_token = controller.source_token().clone();
        let sine = SineWave::new(Tone::default(), 8_000).unwrap();
        let channels = vec![
            spawn_source("left", sine.clone(), 8, controller.source_token()).unwrap(),
            spawn_source("right", sine, 8, controller.source_token()).unwrap(),
        ];

        let started = Instant::now();
        let result = controller.play(sink.clone(), channels).unwrap().wait();
        assert!(matches!(result, Err(SignalError::Sink(_))));
        assert!(source_token.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(sink.buffers().len(), 3);
    }

    /// Sink whose writes panic after `writes` buffers
    struct PanickingSink {
        geometry: TargetGeometry,
        writes: usize,
    }

    impl Sink for PanickingSink {
        fn geometry(&self) -> &TargetGeometry {
            &self.geometry
        }

        fn write(&mut self, _buffer: &[u8]) -> Result<(), SinkError> {
            if self.writes == 0 {
                panic!("device driver crashed");
            }
            self.writes -= 1;
            Ok(())
        }
    }

    #[test]
    fn test_writer_panic_is_not_a_clean_finish() {
        let sink = PanickingSink {
            geometry: stereo(PcmFormat::S16_LE, 8),
            writes: 2,
        };
        let controller = Controller::new(8);
        let token = controller.source_token().clone();
        let sine = SineWave::new(Tone::default(), 8_000).unwrap();
        let channels = vec![
            spawn_source("left", sine.clone().take(1_000), 8, &token).unwrap(),
            spawn_source("right", sine.take(1_000), 8, &token).unwrap(),
        ];

        let result = controller.play(sink, channels).unwrap().wait();
        assert!(matches!(result, Err(SignalError::StageLost("writer"))));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_channel_count_must_match_sink() {
        let sink = MemorySink::new(stereo(PcmFormat::S16_LE, 32));
        let controller = Controller::new(4);
        let token = controller.source_token().clone();
        let mono = vec![spawn_source("mono", 0..10, 4, &token).unwrap()];

        assert!(matches!(
            controller.play(sink, mono),
            Err(SignalError::ChannelMismatch {
                sources: 1,
                channels: 2
            })
        ));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_dropping_playback_aborts() {
        let sink = MemorySink::new(stereo(PcmFormat::S16_LE, 32));
        let controller = Controller::new(4);
        let token = controller.source_token().clone();
        let sine = SineWave::new(Tone::default(), 8_000).unwrap();
        let channels = vec![
            spawn_source("left", sine.clone(), 4, &token).unwrap(),
            spawn_source("right", sine, 4, &token).unwrap(),
        ];

        let playback = controller.play(sink, channels).unwrap();
        let stop = playback.stop_handle();
        drop(playback);
        assert!(stop.is_aborted());
        assert!(token.is_cancelled());
    }
}
