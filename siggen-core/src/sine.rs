//! Continuous-phase sine generator

use std::f64::consts::TAU;

use crate::error::SignalError;
use crate::sample::{Sample, quantize};

/// Parameters of one sine channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Frequency in Hz
    pub frequency: f64,
    /// Peak level as a fraction of full scale
    pub amplitude: f64,
    /// Phase offset in degrees
    pub phase: f64,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            amplitude: 1.0,
            phase: 0.0,
        }
    }
}

/// Infinite sequence of quantized sine samples.
///
/// Sample `n` is `sin(2π·f·n/rate + phase)`. The angle is derived from the
/// sample index reduced to one cycle instead of being accumulated, so there is
/// no phase drift however long the tone runs.
#[derive(Debug, Clone)]
pub struct SineWave {
    frequency: f64,
    sample_rate: f64,
    phase_radians: f64,
    amplitude: f64,
    index: u64,
}

impl SineWave {
    pub fn new(tone: Tone, sample_rate: u32) -> Result<Self, SignalError> {
        if !tone.frequency.is_finite() || tone.frequency <= 0.0 {
            return Err(SignalError::InvalidFrequency(tone.frequency));
        }
        if sample_rate == 0 {
            return Err(SignalError::InvalidSampleRate(sample_rate));
        }
        if !tone.amplitude.is_finite() || !(-1.0..=1.0).contains(&tone.amplitude) {
            return Err(SignalError::InvalidAmplitude(tone.amplitude));
        }

        Ok(Self {
            frequency: tone.frequency,
            sample_rate: f64::from(sample_rate),
            phase_radians: tone.phase.to_radians(),
            amplitude: tone.amplitude,
            index: 0,
        })
    }

    fn sample_at(&self, index: u64) -> Sample {
        let cycles = (self.frequency * index as f64 / self.sample_rate).fract();
        quantize((TAU * cycles + self.phase_radians).sin() * self.amplitude)
    }
}

impl Iterator for SineWave {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let sample = self.sample_at(self.index);
        self.index += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::FULL_SCALE;

    fn first(amplitude: f64, frequency: f64, phase: f64, sample_rate: u32, n: usize) -> Vec<Sample> {
        let tone = Tone {
            frequency,
            amplitude,
            phase,
        };
        SineWave::new(tone, sample_rate).unwrap().take(n).collect()
    }

    #[test]
    fn test_one_hertz_at_four_samples_per_second() {
        assert_eq!(
            first(1.0, 1.0, 0.0, 4, 9),
            vec![0, FULL_SCALE, 0, -FULL_SCALE, 0, FULL_SCALE, 0, -FULL_SCALE, 0]
        );
    }

    #[test]
    fn test_nyquist_frequency_is_null() {
        assert_eq!(first(1.0, 2.0, 0.0, 4, 5), vec![0; 5]);
        assert_eq!(first(1.0, 2.0, 180.0, 4, 5), vec![0; 5]);
        assert_eq!(first(1.0, 22_050.0, 0.0, 44_100, 64), vec![0; 64]);
    }

    #[test]
    fn test_nyquist_with_quarter_phase_alternates() {
        assert_eq!(
            first(1.0, 2.0, 90.0, 4, 4),
            vec![FULL_SCALE, -FULL_SCALE, FULL_SCALE, -FULL_SCALE]
        );
    }

    #[test]
    fn test_half_amplitude() {
        assert_eq!(
            first(0.5, 2.0, 90.0, 8, 8),
            vec![
                1_073_741_824,
                0,
                -1_073_741_824,
                0,
                1_073_741_824,
                0,
                -1_073_741_824,
                0
            ]
        );
    }

    #[test]
    fn test_ten_hertz_at_hundred_samples_per_second() {
        assert_eq!(
            first(0.5, 10.0, 0.0, 100, 11),
            vec![
                0,
                631_129_609,
                1_021_189_158,
                1_021_189_158,
                631_129_609,
                0,
                -631_129_609,
                -1_021_189_158,
                -1_021_189_158,
                -631_129_609,
                0
            ]
        );
    }

    #[test]
    fn test_phase_stays_continuous_over_long_runs() {
        // After exactly 1000 cycles the waveform must be back at its start
        let mut sine = SineWave::new(
            Tone {
                frequency: 441.0,
                amplitude: 1.0,
                phase: 30.0,
            },
            44_100,
        )
        .unwrap();
        let start = sine.next().unwrap();
        let later = sine.nth(100_000 - 2).unwrap();
        assert_eq!(sine.next().unwrap(), start);
        assert_ne!(later, 0);
    }

    #[test]
    fn test_rejects_invalid_tones() {
        let bad_frequency = Tone {
            frequency: 0.0,
            ..Tone::default()
        };
        assert!(matches!(
            SineWave::new(bad_frequency, 44_100),
            Err(SignalError::InvalidFrequency(_))
        ));

        let bad_amplitude = Tone {
            amplitude: 1.5,
            ..Tone::default()
        };
        assert!(matches!(
            SineWave::new(bad_amplitude, 44_100),
            Err(SignalError::InvalidAmplitude(_))
        ));

        assert!(matches!(
            SineWave::new(Tone::default(), 0),
            Err(SignalError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_default_tone() {
        let tone = Tone::default();
        assert_eq!(tone.frequency, 1000.0);
        assert_eq!(tone.amplitude, 1.0);
        assert_eq!(tone.phase, 0.0);
    }
}
