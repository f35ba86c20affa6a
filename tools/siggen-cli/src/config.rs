//! Signal configuration (signals.toml)
//!
//! ```toml
//! [left]
//! frequency = 1000
//! amplitude = 1
//! phase = 0
//!
//! [right]
//! frequency = 1000
//! phase = 90
//!
//! [manchester]
//! bits_per_second = 1200
//!
//! [output]
//! sample_rate = 44100
//! period_size = 1024
//! format = "s16le"
//! ```
//!
//! Every key is optional. A missing file means "all defaults".

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use siggen_core::{PcmFormat, Tone};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub left: ToneConfig,
    #[serde(default)]
    pub right: ToneConfig,
    #[serde(default)]
    pub manchester: ManchesterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneConfig {
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default)]
    pub phase: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManchesterConfig {
    #[serde(default = "default_bits_per_second")]
    pub bits_per_second: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Requested rate; a device may negotiate another one
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Samples per channel in one period
    #[serde(default = "default_period_size")]
    pub period_size: usize,
    /// Sample format for WAV rendering (devices pick their own)
    #[serde(default = "default_format")]
    pub format: String,
    /// Sample queue depth between stages (default: 10ms of samples)
    #[serde(default)]
    pub queue_depth: Option<usize>,
}

fn default_frequency() -> f64 { 1000.0 }
fn default_amplitude() -> f64 { 1.0 }
fn default_bits_per_second() -> f64 { 1200.0 }
fn default_sample_rate() -> u32 { 44_100 }
fn default_period_size() -> usize { 1024 }
fn default_format() -> String { "s16le".to_string() }

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            amplitude: default_amplitude(),
            phase: 0.0,
        }
    }
}

impl Default for ManchesterConfig {
    fn default() -> Self {
        Self {
            bits_per_second: default_bits_per_second(),
            amplitude: default_amplitude(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            period_size: default_period_size(),
            format: default_format(),
            queue_depth: None,
        }
    }
}

impl From<&ToneConfig> for Tone {
    fn from(config: &ToneConfig) -> Self {
        Tone {
            frequency: config.frequency,
            amplitude: config.amplitude,
            phase: config.phase,
        }
    }
}

impl OutputConfig {
    pub fn pcm_format(&self) -> Result<PcmFormat> {
        Ok(self.format.parse()?)
    }

    /// Queue depth for a stream running at `sample_rate`
    pub fn queue_depth(&self, sample_rate: u32) -> usize {
        self.queue_depth
            .unwrap_or(sample_rate as usize / 100)
            .max(1)
    }
}

/// Load the configuration at `path`, falling back to defaults if it does not exist.
pub fn load(path: &Path) -> Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.left, ToneConfig::default());
        assert_eq!(config.right.frequency, 1000.0);
        assert_eq!(config.right.amplitude, 1.0);
        assert_eq!(config.right.phase, 0.0);
        assert_eq!(config.manchester.bits_per_second, 1200.0);
        assert_eq!(config.output.sample_rate, 44_100);
        assert_eq!(config.output.period_size, 1024);
        assert_eq!(config.output.pcm_format().unwrap(), PcmFormat::S16_LE);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [left]
            frequency = 440
            [right]
            phase = 90.0
            [output]
            format = "s32be"
            queue_depth = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.left.frequency, 440.0);
        assert_eq!(config.left.amplitude, 1.0);
        assert_eq!(config.right.frequency, 1000.0);
        assert_eq!(config.right.phase, 90.0);
        assert_eq!(config.output.pcm_format().unwrap(), PcmFormat::S32_BE);
        assert_eq!(config.output.queue_depth(44_100), 16);
    }

    #[test]
    fn test_queue_depth_defaults_to_ten_milliseconds() {
        let output = OutputConfig::default();
        assert_eq!(output.queue_depth(44_100), 441);
        assert_eq!(output.queue_depth(50), 1);
    }

    #[test]
    fn test_tone_conversion() {
        let tone = Tone::from(&ToneConfig {
            frequency: 250.0,
            amplitude: 0.5,
            phase: 45.0,
        });
        assert_eq!(tone.frequency, 250.0);
        assert_eq!(tone.amplitude, 0.5);
        assert_eq!(tone.phase, 45.0);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("signals.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[manchester]\nbits_per_second = 300").unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.manchester.bits_per_second, 300.0);
        assert_eq!(config.manchester.amplitude, 1.0);
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[left\nfrequency = ").unwrap();
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let output = OutputConfig {
            format: "u8".to_string(),
            ..OutputConfig::default()
        };
        assert!(output.pcm_format().is_err());
    }
}
