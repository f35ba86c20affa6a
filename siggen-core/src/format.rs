//! PCM sample encodings and sink geometry

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SignalError;
use crate::sample::Sample;

/// Policy turning full-scale samples into the sink's byte layout.
pub trait SampleEncoder: Send + 'static {
    /// Encoded size of one sample in bytes
    fn bytes_per_sample(&self) -> usize;

    /// Append the encoding of `sample` to `out`.
    fn encode(&self, sample: Sample, out: &mut Vec<u8>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the running machine
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// Signed 16-bit; keeps the top half of the full-scale sample
    S16,
    /// Signed 32-bit; the full-scale sample as-is
    S32,
}

impl SampleWidth {
    pub const fn bytes(self) -> usize {
        match self {
            SampleWidth::S16 => 2,
            SampleWidth::S32 => 4,
        }
    }
}

/// Integer PCM layout: width and byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub width: SampleWidth,
    pub order: ByteOrder,
}

impl PcmFormat {
    pub const S16_LE: PcmFormat = PcmFormat::new(SampleWidth::S16, ByteOrder::Little);
    pub const S16_BE: PcmFormat = PcmFormat::new(SampleWidth::S16, ByteOrder::Big);
    pub const S32_LE: PcmFormat = PcmFormat::new(SampleWidth::S32, ByteOrder::Little);
    pub const S32_BE: PcmFormat = PcmFormat::new(SampleWidth::S32, ByteOrder::Big);

    pub const fn new(width: SampleWidth, order: ByteOrder) -> Self {
        Self { width, order }
    }

    /// Inverse of [`SampleEncoder::encode`] for the first sample in `bytes`.
    ///
    /// 16-bit samples come back scaled to full scale with the low half zeroed.
    /// Returns `None` if `bytes` is shorter than one sample.
    pub fn decode_sample(&self, bytes: &[u8]) -> Option<Sample> {
        let sample = match self.width {
            SampleWidth::S16 => {
                let raw = *bytes.first_chunk::<2>()?;
                let value = match self.order {
                    ByteOrder::Little => i16::from_le_bytes(raw),
                    ByteOrder::Big => i16::from_be_bytes(raw),
                };
                Sample::from(value) << 16
            }
            SampleWidth::S32 => {
                let raw = *bytes.first_chunk::<4>()?;
                match self.order {
                    ByteOrder::Little => i32::from_le_bytes(raw),
                    ByteOrder::Big => i32::from_be_bytes(raw),
                }
            }
        };
        Some(sample)
    }

    /// Decode a buffer of whole samples; a trailing partial sample is ignored.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Sample> {
        bytes
            .chunks_exact(self.width.bytes())
            .filter_map(|chunk| self.decode_sample(chunk))
            .collect()
    }
}

impl SampleEncoder for PcmFormat {
    fn bytes_per_sample(&self) -> usize {
        self.width.bytes()
    }

    fn encode(&self, sample: Sample, out: &mut Vec<u8>) {
        match (self.width, self.order) {
            (SampleWidth::S16, ByteOrder::Little) => {
                out.extend_from_slice(&((sample >> 16) as i16).to_le_bytes())
            }
            (SampleWidth::S16, ByteOrder::Big) => {
                out.extend_from_slice(&((sample >> 16) as i16).to_be_bytes())
            }
            (SampleWidth::S32, ByteOrder::Little) => out.extend_from_slice(&sample.to_le_bytes()),
            (SampleWidth::S32, ByteOrder::Big) => out.extend_from_slice(&sample.to_be_bytes()),
        }
    }
}

impl FromStr for PcmFormat {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s16le" | "s16_le" => Ok(PcmFormat::S16_LE),
            "s16be" | "s16_be" => Ok(PcmFormat::S16_BE),
            "s32le" | "s32_le" => Ok(PcmFormat::S32_LE),
            "s32be" | "s32_be" => Ok(PcmFormat::S32_BE),
            _ => Err(SignalError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = match self.width {
            SampleWidth::S16 => "s16",
            SampleWidth::S32 => "s32",
        };
        let order = match self.order {
            ByteOrder::Little => "le",
            ByteOrder::Big => "be",
        };
        write!(f, "{width}{order}")
    }
}

/// Output layout negotiated by a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGeometry {
    pub sample_rate: u32,
    pub channels: usize,
    pub format: PcmFormat,
    /// Samples per channel in one device period
    pub period_size: usize,
}

impl TargetGeometry {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.sample_rate == 0 {
            return Err(SignalError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(SignalError::InvalidGeometry("channel count must be at least 1"));
        }
        if self.period_size == 0 {
            return Err(SignalError::InvalidGeometry("period size must be at least 1"));
        }
        Ok(())
    }

    /// Bytes in one multi-channel frame
    pub fn frame_unit_size(&self) -> usize {
        self.channels * self.format.width.bytes()
    }

    /// Bytes in one full device period
    pub fn frame_byte_size(&self) -> usize {
        self.period_size * self.frame_unit_size()
    }

    /// Playback time covered by one period
    pub fn output_delay(&self) -> Duration {
        Duration::from_secs_f64(self.period_size as f64 / f64::from(self.sample_rate.max(1)))
    }
}

impl fmt::Display for TargetGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Period: {}, SampleSize: {} bits ({}), Rate: {} Hz, Channels: {}",
            self.period_size,
            self.format.width.bytes() * 8,
            self.format,
            self.sample_rate,
            self.channels
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(format: PcmFormat, sample: Sample) -> Vec<u8> {
        let mut out = Vec::new();
        format.encode(sample, &mut out);
        out
    }

    #[test]
    fn test_byte_layouts() {
        let sample = 0x1234_5678;
        assert_eq!(encode(PcmFormat::S32_LE, sample), vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(encode(PcmFormat::S32_BE, sample), vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(encode(PcmFormat::S16_LE, sample), vec![0x34, 0x12]);
        assert_eq!(encode(PcmFormat::S16_BE, sample), vec![0x12, 0x34]);
    }

    #[test]
    fn test_s16_keeps_sign() {
        assert_eq!(encode(PcmFormat::S16_LE, -1), vec![0xFF, 0xFF]);
        assert_eq!(encode(PcmFormat::S16_LE, i32::MIN), vec![0x00, 0x80]);
        assert_eq!(encode(PcmFormat::S16_BE, i32::MAX), vec![0x7F, 0xFF]);
    }

    #[test]
    fn test_decode_inverts_encode() {
        for format in [PcmFormat::S32_LE, PcmFormat::S32_BE] {
            for sample in [0, 1, -1, i32::MAX, i32::MIN, 123_456_789] {
                assert_eq!(format.decode_sample(&encode(format, sample)), Some(sample));
            }
        }
        for format in [PcmFormat::S16_LE, PcmFormat::S16_BE] {
            for sample in [0, 1 << 16, -(1 << 16), 0x7FFF << 16, i32::MIN] {
                assert_eq!(format.decode_sample(&encode(format, sample)), Some(sample));
            }
        }
    }

    #[test]
    fn test_decode_sample_rejects_short_input() {
        assert_eq!(PcmFormat::S32_LE.decode_sample(&[1, 2, 3]), None);
        assert_eq!(PcmFormat::S16_BE.decode_sample(&[1]), None);
        assert_eq!(PcmFormat::S16_LE.decode_sample(&[]), None);
        // Extra bytes past the first sample are ignored
        assert_eq!(PcmFormat::S16_LE.decode_sample(&[0, 1, 0xFF]), Some(1 << 24));
    }

    #[test]
    fn test_decode_ignores_partial_tail() {
        assert_eq!(PcmFormat::S16_LE.decode(&[1, 0, 2, 0, 3]), vec![1 << 16, 2 << 16]);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("s16le".parse::<PcmFormat>().unwrap(), PcmFormat::S16_LE);
        assert_eq!("S32_BE".parse::<PcmFormat>().unwrap(), PcmFormat::S32_BE);
        assert!(matches!(
            "f32le".parse::<PcmFormat>(),
            Err(SignalError::UnknownFormat(_))
        ));
        assert_eq!(PcmFormat::S32_LE.to_string(), "s32le");
    }

    #[test]
    fn test_geometry_sizes() {
        let geometry = TargetGeometry {
            sample_rate: 44_100,
            channels: 2,
            format: PcmFormat::S16_LE,
            period_size: 1024,
        };
        assert!(geometry.validate().is_ok());
        assert_eq!(geometry.frame_unit_size(), 4);
        assert_eq!(geometry.frame_byte_size(), 4096);
        assert_eq!(geometry.output_delay(), Duration::from_secs_f64(1024.0 / 44_100.0));
        assert_eq!(
            geometry.to_string(),
            "Period: 1024, SampleSize: 16 bits (s16le), Rate: 44100 Hz, Channels: 2"
        );
    }

    #[test]
    fn test_geometry_rejects_degenerate_layouts() {
        let geometry = TargetGeometry {
            sample_rate: 48_000,
            channels: 0,
            format: PcmFormat::S32_LE,
            period_size: 256,
        };
        assert!(matches!(
            geometry.validate(),
            Err(SignalError::InvalidGeometry(_))
        ));

        let geometry = TargetGeometry {
            channels: 1,
            period_size: 0,
            ..geometry
        };
        assert!(geometry.validate().is_err());
    }
}
