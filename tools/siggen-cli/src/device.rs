//! Audio device output using cpal and a byte ring buffer
//!
//! The pipeline's writer thread pushes encoded PCM into the ring through
//! [`DeviceSink`]; the cpal callback pops whole samples and converts them to the
//! device's native type. The stream itself is not `Send`, so it stays with the
//! caller in [`DeviceOutput`] and must outlive the playback.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use siggen_core::{ByteOrder, PcmFormat, SampleWidth, Sink, SinkError, TargetGeometry};
use tracing::{debug, error, warn};

/// Ring buffer capacity in device periods
const RING_PERIODS: usize = 4;

/// How long the writer sleeps between checks for free space
const WAIT_SLICE: Duration = Duration::from_millis(1);

/// A device that accepts nothing for this long is considered gone
const MIN_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// State shared between the writer thread and the audio callback
#[derive(Default)]
struct Shared {
    lock: Mutex<()>,
    drained: Condvar,
    error: Mutex<Option<String>>,
}

impl Shared {
    fn notify(&self) {
        self.drained.notify_one();
    }

    fn wait(&self, timeout: Duration) {
        let guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self.drained.wait_timeout(guard, timeout);
    }

    fn record_error(&self, message: String) {
        let mut slot = self.error.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert(message);
    }

    fn take_error(&self) -> Option<String> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Keeps the cpal stream playing. Drop it after the playback finished.
pub struct DeviceOutput {
    _stream: cpal::Stream,
}

/// [`Sink`] half of an opened device
pub struct DeviceSink {
    geometry: TargetGeometry,
    producer: HeapProd<u8>,
    shared: Arc<Shared>,
    stall_timeout: Duration,
}

/// Open the default output device with `channels` channels.
///
/// `sample_rate` and `period_size` are requests; the returned geometry holds
/// what the device actually runs at. Samples are always native-endian.
pub fn open(channels: usize, sample_rate: u32, period_size: usize) -> Result<(DeviceOutput, DeviceSink)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No audio output device available"))?;
    if let Ok(name) = device.name() {
        debug!("Using output device: {}", name);
    }

    let channel_count = u16::try_from(channels).context("Too many channels")?;
    let supported = negotiate(&device, channel_count, sample_rate)?;
    let width = match supported.sample_format() {
        cpal::SampleFormat::I16 => SampleWidth::S16,
        _ => SampleWidth::S32,
    };

    let period = u32::try_from(period_size).context("Period size too large")?;
    let buffer_size = match supported.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&period) => {
            cpal::BufferSize::Fixed(period)
        }
        _ => {
            debug!("Device does not support a {} frame period, using its default", period);
            cpal::BufferSize::Default
        }
    };

    let geometry = TargetGeometry {
        sample_rate: supported.sample_rate().0,
        channels,
        format: PcmFormat::new(width, ByteOrder::native()),
        period_size,
    };
    geometry.validate()?;

    let config = cpal::StreamConfig {
        channels: channel_count,
        sample_rate: supported.sample_rate(),
        buffer_size,
    };

    let ring = HeapRb::<u8>::new(geometry.frame_byte_size() * RING_PERIODS);
    let (producer, consumer) = ring.split();
    let shared = Arc::new(Shared::default());

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => build_stream(&device, &config, consumer, &shared, s16_from_bytes),
        cpal::SampleFormat::I32 => build_stream(&device, &config, consumer, &shared, s32_from_bytes),
        cpal::SampleFormat::F32 => build_stream(&device, &config, consumer, &shared, f32_from_s32_bytes),
        other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
    }
    .context("Failed to build audio stream")?;

    stream.play().context("Failed to play audio stream")?;

    let stall_timeout = (geometry.output_delay() * RING_PERIODS as u32 * 4).max(MIN_STALL_TIMEOUT);
    let sink = DeviceSink {
        geometry,
        producer,
        shared,
        stall_timeout,
    };
    Ok((DeviceOutput { _stream: stream }, sink))
}

/// Pick a config with the requested channel count, preferring the requested rate.
fn negotiate(device: &cpal::Device, channels: u16, sample_rate: u32) -> Result<cpal::SupportedStreamConfig> {
    let wanted = cpal::SampleRate(sample_rate);
    let ranges = device
        .supported_output_configs()
        .context("Failed to query output configs")?;

    let mut fallback = None;
    for range in ranges {
        if range.channels() != channels || !is_playable(range.sample_format()) {
            continue;
        }
        if range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate() {
            return Ok(range.with_sample_rate(wanted));
        }
        fallback.get_or_insert_with(|| range.with_max_sample_rate());
    }

    let config = fallback.ok_or_else(|| {
        anyhow!("Device has no {}-channel output config in a supported sample format", channels)
    })?;
    warn!(
        "Device does not support {} Hz, using {} Hz",
        sample_rate,
        config.sample_rate().0
    );
    Ok(config)
}

fn is_playable(format: cpal::SampleFormat) -> bool {
    matches!(
        format,
        cpal::SampleFormat::I16 | cpal::SampleFormat::I32 | cpal::SampleFormat::F32
    )
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: HeapCons<u8>,
    shared: &Arc<Shared>,
    convert: fn(&[u8]) -> T,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let sample_size = size_of_encoded::<T>();
    let callback_shared = Arc::clone(shared);
    let error_shared = Arc::clone(shared);
    let mut scratch = vec![0u8; 4096 * sample_size];

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let wanted = data.len() * sample_size;
            if scratch.len() < wanted {
                scratch.resize(wanted, 0);
            }
            // Only whole samples leave the ring
            let available = consumer.occupied_len().min(wanted) / sample_size * sample_size;
            let popped = consumer.pop_slice(&mut scratch[..available]);
            let filled = popped / sample_size;

            for (slot, bytes) in data.iter_mut().zip(scratch[..popped].chunks_exact(sample_size)) {
                *slot = convert(bytes);
            }
            data[filled..].fill(T::EQUILIBRIUM);
            callback_shared.notify();
        },
        move |err| {
            error!("Audio stream error: {}", err);
            error_shared.record_error(err.to_string());
        },
        None,
    )
}

/// Bytes per sample the pipeline produces for device type `T`
fn size_of_encoded<T: cpal::SizedSample>() -> usize {
    match T::FORMAT {
        cpal::SampleFormat::I16 => 2,
        _ => 4,
    }
}

fn s16_from_bytes(bytes: &[u8]) -> i16 {
    i16::from_ne_bytes([bytes[0], bytes[1]])
}

fn s32_from_bytes(bytes: &[u8]) -> i32 {
    i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn f32_from_s32_bytes(bytes: &[u8]) -> f32 {
    (f64::from(s32_from_bytes(bytes)) / f64::from(i32::MAX)) as f32
}

impl DeviceSink {
    fn check_stream(&self) -> Result<(), SinkError> {
        match self.shared.take_error() {
            Some(message) => Err(SinkError::Backend(message)),
            None => Ok(()),
        }
    }
}

impl Sink for DeviceSink {
    fn geometry(&self) -> &TargetGeometry {
        &self.geometry
    }

    fn write(&mut self, buffer: &[u8]) -> Result<(), SinkError> {
        let sample_size = self.geometry.format.width.bytes();
        if buffer.len() % sample_size != 0 {
            return Err(SinkError::Misaligned {
                len: buffer.len(),
                sample_size,
            });
        }

        let mut offset = 0;
        let mut last_progress = Instant::now();
        while offset < buffer.len() {
            self.check_stream()?;

            let room = self.producer.vacant_len() / sample_size * sample_size;
            if room > 0 {
                let end = (offset + room).min(buffer.len());
                offset += self.producer.push_slice(&buffer[offset..end]);
                last_progress = Instant::now();
                continue;
            }

            if last_progress.elapsed() >= self.stall_timeout {
                return Err(SinkError::Stalled(self.stall_timeout));
            }
            self.shared.wait(WAIT_SLICE);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let started = Instant::now();
        while self.producer.occupied_len() > 0 {
            self.check_stream()?;
            if started.elapsed() >= self.stall_timeout {
                return Err(SinkError::Stalled(self.stall_timeout));
            }
            self.shared.wait(WAIT_SLICE);
        }
        // The last period is still in the device
        std::thread::sleep(self.geometry.output_delay());
        debug!("Device drained");
        Ok(())
    }
}
