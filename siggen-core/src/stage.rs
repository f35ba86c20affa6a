//! Thread and queue helpers shared by the pipeline stages

use std::thread;

use crossbeam_channel::{Receiver, Sender, select_biased};

use crate::cancel::CancelToken;
use crate::error::SignalError;

/// Spawn a named stage thread.
///
/// Stage threads are detached; they end when their input ends, their consumer
/// goes away or their token is cancelled.
pub(crate) fn spawn_stage<F>(stage: &'static str, body: F) -> Result<(), SignalError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("siggen-{stage}"))
        .spawn(body)
        .map(drop)
        .map_err(|source| SignalError::Spawn { stage, source })
}

/// Send `value` downstream, waiting for queue space.
///
/// Returns `false` when the token fired or the consumer hung up; the stage
/// should then stop producing.
pub(crate) fn forward<T>(tx: &Sender<T>, value: T, token: &CancelToken) -> bool {
    if token.is_cancelled() {
        return false;
    }
    // Cancellation wins over a slot that frees up at the same time
    select_biased! {
        recv(token.signal()) -> _ => false,
        send(tx, value) -> res => res.is_ok(),
    }
}

/// Receive the next upstream value, waiting for it to arrive.
///
/// Returns `None` when the input ended or the token fired.
pub(crate) fn receive<T>(rx: &Receiver<T>, token: &CancelToken) -> Option<T> {
    if token.is_cancelled() {
        return None;
    }
    select_biased! {
        recv(token.signal()) -> _ => None,
        recv(rx) -> msg => msg.ok(),
    }
}
