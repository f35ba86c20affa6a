//! Sink contract and the writer stage that drives it
//!
//! A [`Sink`] owns the output device (or file). The core never calls it from
//! the packing thread: [`spawn_writer`] moves it onto a dedicated thread, so
//! packing continues while a write is pending, and reports every completed
//! write on an asynchronous event queue.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::Receiver;
use tracing::{debug, error, trace};

use crate::cancel::CancelToken;
use crate::error::{SignalError, SinkError};
use crate::format::TargetGeometry;
use crate::sample::EncodedBuffer;
use crate::stage::{receive, spawn_stage};

/// Destination for encoded PCM buffers
pub trait Sink: Send + 'static {
    /// Layout the sink expects buffers in
    fn geometry(&self) -> &TargetGeometry;

    /// Write one buffer. May block until the device has room.
    fn write(&mut self, buffer: &[u8]) -> Result<(), SinkError>;

    /// Called once after the last buffer, before the sink is dropped.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Completion event from the writer stage
#[derive(Debug)]
pub enum SinkEvent {
    /// A buffer of `bytes` bytes reached the sink
    Written { bytes: usize },
    /// Terminal failure; no further buffers are written
    Failed(SinkError),
    /// [`Sink::finish`] succeeded; always the last event of a clean run
    Closed,
}

/// Drive `sink` with `buffers` on its own thread.
///
/// The returned event queue ends after [`SinkEvent::Closed`] once the input
/// ended (or the token fired) and [`Sink::finish`] succeeded, or after the first
/// [`SinkEvent::Failed`]. A queue that disconnects without either means the
/// writer thread died.
pub fn spawn_writer<S: Sink>(
    mut sink: S,
    buffers: Receiver<EncodedBuffer>,
    token: &CancelToken,
) -> Result<Receiver<SinkEvent>, SignalError> {
    let (events, rx) = crossbeam_channel::unbounded();
    let token = token.clone();

    spawn_stage("writer", move || {
        let mut written: u64 = 0;
        while let Some(buffer) = receive(&buffers, &token) {
            match sink.write(&buffer) {
                Ok(()) => {
                    written += 1;
                    trace!("Wrote buffer {} ({} bytes)", written, buffer.len());
                    let _ = events.send(SinkEvent::Written {
                        bytes: buffer.len(),
                    });
                }
                Err(e) => {
                    error!("Error streaming data: {}", e);
                    drop(buffers);
                    let _ = events.send(SinkEvent::Failed(e));
                    return;
                }
            }
        }

        // Stop feeding upstream before a possibly slow drain in finish()
        drop(buffers);
        if let Err(e) = sink.finish() {
            error!("Error closing sink: {}", e);
            let _ = events.send(SinkEvent::Failed(e));
            return;
        }
        debug!("Sink closed after {} buffers", written);
        let _ = events.send(SinkEvent::Closed);
    })?;

    Ok(rx)
}

/// Sink that keeps every buffer in memory.
///
/// Useful for dry runs and tests; clones share the same storage, so a clone kept
/// by the caller sees what the writer thread stored. Optionally fails after a
/// given number of writes.
#[derive(Clone)]
pub struct MemorySink {
    geometry: TargetGeometry,
    buffers: Arc<Mutex<Vec<EncodedBuffer>>>,
    finished: Arc<Mutex<bool>>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new(geometry: TargetGeometry) -> Self {
        Self {
            geometry,
            buffers: Arc::new(Mutex::new(Vec::new())),
            finished: Arc::new(Mutex::new(false)),
            fail_after: None,
        }
    }

    /// Accept `writes` buffers, then fail every further write.
    pub fn failing_after(geometry: TargetGeometry, writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
            ..Self::new(geometry)
        }
    }

    /// Buffers written so far, in order
    pub fn buffers(&self) -> Vec<EncodedBuffer> {
        self.lock_buffers().clone()
    }

    /// All written bytes concatenated
    pub fn bytes(&self) -> Vec<u8> {
        self.lock_buffers().concat()
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_buffers(&self) -> MutexGuard<'_, Vec<EncodedBuffer>> {
        self.buffers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for MemorySink {
    fn geometry(&self) -> &TargetGeometry {
        &self.geometry
    }

    fn write(&mut self, buffer: &[u8]) -> Result<(), SinkError> {
        let mut buffers = self.lock_buffers();
        if self.fail_after.is_some_and(|limit| buffers.len() >= limit) {
            return Err(SinkError::Backend("simulated write failure".to_string()));
        }
        buffers.push(buffer.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        *self.finished.lock().unwrap_or_else(|e| e.into_inner()) = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PcmFormat;

    fn geometry() -> TargetGeometry {
        TargetGeometry {
            sample_rate: 8_000,
            channels: 1,
            format: PcmFormat::S16_LE,
            period_size: 2,
        }
    }

    #[test]
    fn test_writer_reports_each_buffer_then_closes() {
        let sink = MemorySink::new(geometry());
        let (tx, rx) = crossbeam_channel::bounded(4);
        let token = CancelToken::new();
        let events = spawn_writer(sink.clone(), rx, &token).unwrap();

        tx.send(vec![1, 2, 3, 4]).unwrap();
        tx.send(vec![5, 6]).unwrap();
        drop(tx);

        let mut sizes = Vec::new();
        let mut closed = false;
        for event in events.iter() {
            match event {
                SinkEvent::Written { bytes } => sizes.push(bytes),
                SinkEvent::Failed(e) => panic!("unexpected failure: {e}"),
                SinkEvent::Closed => closed = true,
            }
        }
        assert_eq!(sizes, vec![4, 2]);
        assert!(closed);
        assert_eq!(sink.bytes(), vec![1, 2, 3, 4, 5, 6]);
        assert!(sink.is_finished());
    }

    #[test]
    fn test_writer_stops_after_failure() {
        let sink = MemorySink::failing_after(geometry(), 1);
        let (tx, rx) = crossbeam_channel::bounded(4);
        let token = CancelToken::new();
        let events = spawn_writer(sink.clone(), rx, &token).unwrap();

        tx.send(vec![1, 2, 3, 4]).unwrap();
        tx.send(vec![5, 6, 7, 8]).unwrap();

        assert!(matches!(events.recv(), Ok(SinkEvent::Written { bytes: 4 })));
        assert!(matches!(events.recv(), Ok(SinkEvent::Failed(_))));
        assert!(events.recv().is_err());

        // The writer hung up, so upstream sees a closed queue
        assert!(tx.send(vec![9, 10]).is_err());
        assert_eq!(sink.buffers().len(), 1);
        assert!(!sink.is_finished());
    }

    #[test]
    fn test_cancel_closes_idle_writer() {
        let sink = MemorySink::new(geometry());
        let (_tx, rx) = crossbeam_channel::bounded::<EncodedBuffer>(1);
        let token = CancelToken::new();
        let events = spawn_writer(sink.clone(), rx, &token).unwrap();

        token.cancel();
        let timeout = std::time::Duration::from_secs(1);
        assert!(matches!(events.recv_timeout(timeout), Ok(SinkEvent::Closed)));
        assert!(events.recv_timeout(timeout).is_err_and(|e| e.is_disconnected()));
        assert!(sink.is_finished());
    }
}
