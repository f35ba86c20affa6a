//! Source stages: threads that feed generators into bounded queues

use std::io::{ErrorKind, Read};

use crossbeam_channel::Receiver;
use tracing::{debug, trace, warn};

use crate::cancel::CancelToken;
use crate::error::SignalError;
use crate::manchester::DifferentialManchester;
use crate::sample::Sample;
use crate::stage::{forward, receive, spawn_stage};

/// Bytes read from a reader per chunk
const READ_CHUNK: usize = 4096;

/// Run `samples` on its own thread, delivering into a queue of `depth` slots.
///
/// The queue closes when the iterator is exhausted, the consumer drops its
/// receiver or `token` is cancelled. Infinite generators such as
/// [`SineWave`](crate::SineWave) therefore run until cancelled; bound them
/// with [`Iterator::take`] for a fixed length.
pub fn spawn_source<I>(
    name: &'static str,
    samples: I,
    depth: usize,
    token: &CancelToken,
) -> Result<Receiver<Sample>, SignalError>
where
    I: IntoIterator<Item = Sample>,
    I::IntoIter: Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(depth);
    let token = token.clone();
    let samples = samples.into_iter();

    spawn_stage(name, move || {
        debug!("{} source started", name);
        let mut produced: u64 = 0;
        for sample in samples {
            if !forward(&tx, sample, &token) {
                break;
            }
            produced += 1;
        }
        debug!("{} source finished after {} samples", name, produced);
    })?;

    Ok(rx)
}

/// Run a Manchester encoder over `bytes` on its own thread.
///
/// The output ends exactly when `bytes` is exhausted, after the last bit of the
/// last byte has been delivered.
pub fn spawn_encoder(
    mut encoder: DifferentialManchester,
    bytes: Receiver<u8>,
    depth: usize,
    token: &CancelToken,
) -> Result<Receiver<Sample>, SignalError> {
    let (tx, rx) = crossbeam_channel::bounded(depth);
    let token = token.clone();

    spawn_stage("manchester", move || {
        debug!("Manchester encoder started");
        let mut scratch = Vec::new();
        let mut encoded: u64 = 0;

        'bytes: while let Some(byte) = receive(&bytes, &token) {
            scratch.clear();
            encoder.encode_byte(byte, &mut scratch);
            for sample in scratch.drain(..) {
                if !forward(&tx, sample, &token) {
                    break 'bytes;
                }
            }
            encoded += 1;
            trace!("Encoded byte {:#04x}", byte);
        }

        debug!("Manchester encoder finished after {} bytes", encoded);
    })?;

    Ok(rx)
}

/// A closed queue holding `data`, for encoding an in-memory message.
pub fn bytes_from_slice(data: &[u8]) -> Receiver<u8> {
    let (tx, rx) = crossbeam_channel::bounded(data.len());
    for &byte in data {
        // Capacity equals the message length, so this never blocks
        let _ = tx.send(byte);
    }
    rx
}

/// Read `reader` to the end on its own thread, one byte per queue slot.
///
/// A read error ends the byte stream early; it is logged, not escalated.
pub fn spawn_reader<R>(mut reader: R, depth: usize, token: &CancelToken) -> Result<Receiver<u8>, SignalError>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(depth);
    let token = token.clone();

    spawn_stage("reader", move || {
        let mut chunk = [0u8; READ_CHUNK];
        let mut total: u64 = 0;
        'read: loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Input read failed after {} bytes: {}", total, e);
                    break;
                }
            };
            for &byte in &chunk[..n] {
                if !forward(&tx, byte, &token) {
                    break 'read;
                }
            }
            total += n as u64;
        }
        debug!("Input reader finished after {} bytes", total);
    })?;

    Ok(rx)
}
