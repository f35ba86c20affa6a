//! Differential Manchester line coder
//!
//! Every bit starts with a polarity inversion. A `1` bit inverts again at the
//! middle of the bit, a `0` bit holds its level for the whole period. Only the
//! transitions carry data, so the absolute polarity is irrelevant to a decoder.
//!
//! ```text
//! bits:     1       0       1
//!         ┌───┐       ┌───┐   ┌─
//! level:  │   │       │   │   │
//!       ──┘   └───────┘   └───┘
//! ```
//!
//! Bit periods come from a [`SampleClock`] running at the bit rate, so long
//! transmissions stay locked to the nominal rate even when a bit is not a whole
//! number of samples.

use crate::clock::SampleClock;
use crate::error::SignalError;
use crate::sample::{Sample, quantize};

#[derive(Debug, Clone)]
pub struct DifferentialManchester {
    clock: SampleClock,
    /// Current line level; persists across bytes
    level: Sample,
}

impl DifferentialManchester {
    pub fn new(bits_per_second: f64, amplitude: f64, sample_rate: u32) -> Result<Self, SignalError> {
        if !amplitude.is_finite() || !(-1.0..=1.0).contains(&amplitude) {
            return Err(SignalError::InvalidAmplitude(amplitude));
        }
        let clock = SampleClock::new(bits_per_second, sample_rate)?;

        Ok(Self {
            clock,
            level: quantize(amplitude),
        })
    }

    /// Append the samples for one bit to `out`.
    pub fn encode_bit(&mut self, bit: bool, out: &mut Vec<Sample>) {
        // Always transition on the bit boundary
        self.level = -self.level;

        let (high, low) = self.clock.next_cycle();
        out.extend(std::iter::repeat_n(self.level, high));

        // Transition again mid-bit on ones
        if bit {
            self.level = -self.level;
        }
        out.extend(std::iter::repeat_n(self.level, low));
    }

    /// Append the samples for one byte, most significant bit first.
    pub fn encode_byte(&mut self, byte: u8, out: &mut Vec<Sample>) {
        for bit in (0..8).rev() {
            self.encode_bit((byte >> bit) & 1 != 0, out);
        }
    }

    /// Encode a whole message in one go.
    pub fn encode(&mut self, bytes: &[u8]) -> Vec<Sample> {
        let mut out = Vec::with_capacity(bytes.len() * 8 * self.clock.base_period() as usize);
        for &byte in bytes {
            self.encode_byte(byte, &mut out);
        }
        out
    }
}
