//! Sample, frame and buffer types

use std::ops::Deref;

/// One quantized amplitude on one channel
pub type Sample = i32;

/// Largest representable sample magnitude
pub const FULL_SCALE: Sample = i32::MAX;

/// Encoded PCM bytes handed to a sink
pub type EncodedBuffer = Vec<u8>;

/// Quantize a normalized value (`-1.0..=1.0`) to a full-scale sample.
pub fn quantize(value: f64) -> Sample {
    // `as` saturates, so out-of-range values clip instead of wrapping
    (value * FULL_SCALE as f64).round() as Sample
}

/// One sample per channel for a single output step, in channel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<Sample>);

impl Frame {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self(samples)
    }

    /// Number of channels in this frame
    pub fn channels(&self) -> usize {
        self.0.len()
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.0
    }
}

impl Deref for Frame {
    type Target = [Sample];

    fn deref(&self) -> &[Sample] {
        &self.0
    }
}
