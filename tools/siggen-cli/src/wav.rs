//! WAV file sink (hound)

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use siggen_core::{SampleWidth, Sink, SinkError, TargetGeometry};
use tracing::info;

/// Renders the stream into a WAV file. Finalized by [`Sink::finish`].
pub struct WavSink {
    geometry: TargetGeometry,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn create(path: &Path, geometry: TargetGeometry) -> Result<Self> {
        geometry.validate()?;
        let spec = hound::WavSpec {
            channels: u16::try_from(geometry.channels).context("Too many channels for WAV")?,
            sample_rate: geometry.sample_rate,
            bits_per_sample: (geometry.format.width.bytes() * 8) as u16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        info!("Rendering to {}", path.display());

        Ok(Self {
            geometry,
            writer: Some(writer),
        })
    }
}

fn backend(e: hound::Error) -> SinkError {
    match e {
        hound::Error::IoError(e) => SinkError::Io(e),
        other => SinkError::Backend(other.to_string()),
    }
}

impl Sink for WavSink {
    fn geometry(&self) -> &TargetGeometry {
        &self.geometry
    }

    fn write(&mut self, buffer: &[u8]) -> Result<(), SinkError> {
        let format = self.geometry.format;
        let sample_size = format.width.bytes();
        if buffer.len() % sample_size != 0 {
            return Err(SinkError::Misaligned {
                len: buffer.len(),
                sample_size,
            });
        }
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;

        for sample in format.decode(buffer) {
            let written = match format.width {
                SampleWidth::S16 => writer.write_sample((sample >> 16) as i16),
                SampleWidth::S32 => writer.write_sample(sample),
            };
            written.map_err(backend)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(backend),
            None => Ok(()),
        }
    }
}
