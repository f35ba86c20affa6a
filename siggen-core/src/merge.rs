//! Channel merger: aligns N sample streams into multi-channel frames
//!
//! Each output step waits on every input at once and takes exactly one sample
//! from each, in whatever order they arrive. An input that has delivered for the
//! current step is removed from the wait set until the next step, so a fast
//! producer can never contribute twice to one frame.

use crossbeam_channel::{Receiver, Select};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::SignalError;
use crate::sample::{Frame, Sample};
use crate::stage::{forward, spawn_stage};

/// Outcome of gathering one step
enum Step {
    Frame(Frame),
    /// Input `n` ended before contributing to the step
    Closed(usize),
    Cancelled,
}

/// Merge `inputs` into a stream of frames with `inputs.len()` channels.
///
/// Frame `k` holds sample `k` of every input, in input order. The output ends
/// as soon as any input ends mid-step (the partial step is dropped) or `token`
/// is cancelled.
pub fn merge_channels(
    inputs: Vec<Receiver<Sample>>,
    depth: usize,
    token: &CancelToken,
) -> Result<Receiver<Frame>, SignalError> {
    if inputs.is_empty() {
        return Err(SignalError::NoInputs);
    }

    let (tx, rx) = crossbeam_channel::bounded(depth);
    let token = token.clone();

    spawn_stage("merge", move || {
        debug!("Merging {} channels", inputs.len());
        let mut frames: u64 = 0;
        loop {
            match gather(&inputs, &token) {
                Step::Frame(frame) => {
                    if !forward(&tx, frame, &token) {
                        debug!("Merger output closed after {} frames", frames);
                        break;
                    }
                    frames += 1;
                }
                Step::Closed(input) => {
                    debug!(
                        "Input {} closed mid-step, ending merge after {} frames",
                        input, frames
                    );
                    break;
                }
                Step::Cancelled => {
                    debug!("Merge cancelled after {} frames", frames);
                    break;
                }
            }
        }
    })?;

    Ok(rx)
}

/// Collect one sample from every input.
fn gather(inputs: &[Receiver<Sample>], token: &CancelToken) -> Step {
    if token.is_cancelled() {
        return Step::Cancelled;
    }

    let mut samples = vec![0; inputs.len()];
    let mut select = Select::new_biased();
    let cancel = select.recv(token.signal());
    // Operation indices follow registration order: input `i` is `first + i`
    let first = cancel + 1;
    for input in inputs {
        select.recv(input);
    }

    let mut pending = inputs.len();
    while pending > 0 {
        let operation = select.select();
        let index = operation.index();
        if index == cancel {
            let _ = operation.recv(token.signal());
            return Step::Cancelled;
        }

        let input = index - first;
        match operation.recv(&inputs[input]) {
            Ok(sample) => {
                samples[input] = sample;
                select.remove(index);
                pending -= 1;
            }
            Err(_) => return Step::Closed(input),
        }
    }

    Step::Frame(Frame::new(samples))
}
