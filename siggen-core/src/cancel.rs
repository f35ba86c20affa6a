//! Cancellation token shared by every pipeline stage
//!
//! The token owns the only sender of a zero-capacity channel. Cancelling drops
//! that sender, so every clone of the receiver becomes ready at once. Stages put
//! [`CancelToken::signal`] ahead of their queue operations in a `select_biased!`,
//! which wakes them from any blocking wait without polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    children: Mutex<Vec<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, signal) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal,
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a token that is cancelled together with this one.
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child_token(&self) -> CancelToken {
        let child = CancelToken::new();
        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if self.is_cancelled() {
            child.cancel();
        } else {
            children.push(child.clone());
        }
        child
    }

    /// Cancel this token and all of its children. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        drop(
            self.inner
                .trigger
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );

        let children = std::mem::take(
            &mut *self
                .inner
                .children
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for child in children {
            child.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
