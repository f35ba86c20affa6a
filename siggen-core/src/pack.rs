//! Frame packer: cuts encoded frames into fixed-size device periods

use crossbeam_channel::Receiver;
use tracing::{debug, info, trace};

use crate::cancel::CancelToken;
use crate::error::SignalError;
use crate::format::SampleEncoder;
use crate::sample::{EncodedBuffer, Frame};
use crate::stage::{forward, receive, spawn_stage};

/// Accumulates encoded samples and hands them out in buffers of exactly
/// `frame_bytes` bytes.
///
/// A buffer boundary may fall inside a multi-channel frame; the remainder is
/// kept as residual for the next buffer. Only [`flush`](Self::flush) can return
/// a shorter buffer.
pub struct FramePacker<E> {
    frame_bytes: usize,
    encoder: E,
    residual: Vec<u8>,
}

impl<E: SampleEncoder> FramePacker<E> {
    pub fn new(frame_bytes: usize, encoder: E) -> Result<Self, SignalError> {
        if frame_bytes == 0 {
            return Err(SignalError::InvalidGeometry("frame size must be at least 1 byte"));
        }
        Ok(Self {
            frame_bytes,
            encoder,
            residual: Vec::with_capacity(frame_bytes * 2),
        })
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Bytes waiting for the next buffer
    pub fn residual_len(&self) -> usize {
        self.residual.len()
    }

    /// Encode every sample of `frame` into the residual.
    pub fn push(&mut self, frame: &Frame) {
        self.residual
            .reserve(frame.channels() * self.encoder.bytes_per_sample());
        for &sample in frame.iter() {
            self.encoder.encode(sample, &mut self.residual);
        }
    }

    /// Take the next full buffer, if one is ready.
    pub fn next_buffer(&mut self) -> Option<EncodedBuffer> {
        if self.residual.len() < self.frame_bytes {
            return None;
        }
        let rest = self.residual.split_off(self.frame_bytes);
        Some(std::mem::replace(&mut self.residual, rest))
    }

    /// Take whatever is left, even if shorter than a full buffer.
    pub fn flush(&mut self) -> Option<EncodedBuffer> {
        if self.residual.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.residual))
        }
    }

    /// Run the packer on its own thread.
    ///
    /// When `frames` ends the residual is flushed as a final short buffer. On
    /// cancellation the residual is dropped and the output closes immediately.
    pub fn spawn(
        mut self,
        frames: Receiver<Frame>,
        depth: usize,
        token: &CancelToken,
    ) -> Result<Receiver<EncodedBuffer>, SignalError> {
        let (tx, rx) = crossbeam_channel::bounded(depth);
        let token = token.clone();

        spawn_stage("pack", move || {
            debug!("Output frame size: {} bytes", self.frame_bytes);
            let mut buffers: u64 = 0;

            'frames: while let Some(frame) = receive(&frames, &token) {
                self.push(&frame);
                while let Some(buffer) = self.next_buffer() {
                    trace!("Packed buffer {} ({} bytes)", buffers, buffer.len());
                    if !forward(&tx, buffer, &token) {
                        break 'frames;
                    }
                    buffers += 1;
                }
            }

            if token.is_cancelled() {
                debug!(
                    "Packer cancelled after {} buffers, dropping {} residual bytes",
                    buffers,
                    self.residual.len()
                );
                return;
            }

            if let Some(last) = self.flush() {
                if last.len() != self.frame_bytes {
                    info!("Writing non-standard frame: {} bytes", last.len());
                }
                if forward(&tx, last, &token) {
                    buffers += 1;
                }
            }
            debug!("Done receiving frames after {} buffers", buffers);
        })?;

        Ok(rx)
    }
}
