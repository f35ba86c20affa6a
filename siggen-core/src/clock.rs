//! Drift-free sample clock
//!
//! Splits a waveform period that is not a whole number of samples into integer
//! high/low half-cycles. The period is held in Q32.32 fixed point: the integer
//! part is the base period, the fraction is added to an accumulator once per
//! cycle and every time it overflows one extra sample is inserted into the low
//! half. The running total therefore never drifts from
//! `cycles * sample_rate / frequency` by more than one sample.

use std::fmt;

use crate::error::SignalError;

/// Fixed-point modulus of the accumulator (one whole sample)
const MODULUS: u64 = 1 << 32;

#[derive(Debug, Clone)]
pub struct SampleClock {
    /// Whole samples per cycle
    base_period: u64,
    /// Fractional samples carried between cycles, in units of `1 / MODULUS`
    accumulator: u64,
    /// Fractional samples added per cycle, in units of `1 / MODULUS`
    increment: u64,
}

impl SampleClock {
    /// Create a clock producing `frequency` cycles per second at `sample_rate`.
    pub fn new(frequency: f64, sample_rate: u32) -> Result<Self, SignalError> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(SignalError::InvalidFrequency(frequency));
        }
        if sample_rate == 0 {
            return Err(SignalError::InvalidSampleRate(sample_rate));
        }

        let period = f64::from(sample_rate) / frequency;
        if period < 1.0 {
            return Err(SignalError::FrequencyAboveSampleRate {
                frequency,
                sample_rate,
            });
        }
        // Periods beyond 2^32 samples do not fit the fixed-point representation
        if period >= MODULUS as f64 {
            return Err(SignalError::InvalidFrequency(frequency));
        }

        let base_period = period.floor() as u64;
        let increment = ((period - period.floor()) * MODULUS as f64).round() as u64;

        Ok(Self {
            base_period,
            accumulator: 0,
            // A fraction rounding up to a whole sample saturates just below it
            increment: increment.min(MODULUS - 1),
        })
    }

    /// Whole samples per cycle before drift compensation
    pub fn base_period(&self) -> u64 {
        self.base_period
    }

    /// Sample counts `(high, low)` for the next cycle.
    pub fn next_cycle(&mut self) -> (usize, usize) {
        let high = self.base_period.div_ceil(2);
        let mut low = self.base_period / 2;

        self.accumulator += self.increment;
        if self.accumulator >= MODULUS {
            low += 1;
            self.accumulator -= MODULUS;
        }

        (high as usize, low as usize)
    }
}

impl Iterator for SampleClock {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_cycle())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl fmt::Display for SampleClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Base Period: {}, Accumulator: {}, Modulus: {}, Increment: {}",
            self.base_period, self.accumulator, MODULUS, self.increment
        )
    }
}
