//! One-shot resumption point.
//!
//! Stands in for a `setjmp` buffer: the interceptor arms it and blocks in
//! [`ResumptionPoint::wait`]; the entry callback, running on the startup
//! worker, fires it through [`Resumer::resume`]. Each half is used at most
//! once, and misuse is reported instead of silently corrupting state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeError {
    #[error("startup worker went away before resuming")]
    Abandoned,

    #[error("resumption point already fired")]
    AlreadyResumed,
}

/// The waiting half, held by the interceptor.
#[derive(Debug)]
pub struct ResumptionPoint<T> {
    rx: Receiver<T>,
}

/// The firing half, handed to the entry callback.
#[derive(Debug)]
pub struct Resumer<T> {
    tx: SyncSender<T>,
    fired: AtomicBool,
}

/// Arm a fresh resumption point.
pub fn arm<T: Send>() -> (ResumptionPoint<T>, Resumer<T>) {
    let (tx, rx) = sync_channel(1);
    (
        ResumptionPoint { rx },
        Resumer {
            tx,
            fired: AtomicBool::new(false),
        },
    )
}

impl<T> ResumptionPoint<T> {
    /// Block until resumed. No timeout: a startup call that never reaches
    /// the entry callback hangs here.
    pub fn wait(self) -> Result<T, ResumeError> {
        self.rx.recv().map_err(|_| ResumeError::Abandoned)
    }
}

impl<T> Resumer<T> {
    pub fn resume(&self, value: T) -> Result<(), ResumeError> {
        if self.fired.swap(true, Ordering::AcqRel) {
            return Err(ResumeError::AlreadyResumed);
        }
        self.tx.try_send(value).map_err(|e| match e {
            TrySendError::Full(_) => ResumeError::AlreadyResumed,
            TrySendError::Disconnected(_) => ResumeError::Abandoned,
        })
    }

    #[cfg(test)]
    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
