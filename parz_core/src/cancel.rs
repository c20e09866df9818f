use std::fmt;
use std::sync::{Arc, Mutex};

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};

/// Cooperative cancellation signal shared by every pipeline stage.
///
/// The token owns the only sender of a zero-capacity channel that never
/// carries a message. Cancelling drops that sender, which makes the receiver
/// permanently ready, so stages can `select!` on [`signal`](Self::signal)
/// next to their regular send/recv and wake up at any suspension point.
#[derive(Debug, Clone)]
pub struct CancelToken {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let mut trigger = match self.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trigger.take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> anyhow::Result<()> {
        if self.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }
}

/// Error returned by a stage that stopped because the token was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("pipeline cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Whether `err` (or anything in its context chain) is a [`Cancelled`].
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Cancelled>())
}
