//! One-shot rendezvous between a caller and the writer thread.

use std::sync::mpsc::{self, Receiver, SyncSender};

use log::debug;

use crate::LoadError;

/// Create a connected barrier pair.
///
/// Submit the [`BarrierSignal`] inside [`Command::Sync`](crate::Command::Sync)
/// and block on the [`BarrierWait`]; the writer releases it once every
/// command submitted before the signal has been applied.
///
/// # Examples
///
/// ```
/// use featureload_core::{Command, barrier};
///
/// let (signal, wait) = barrier();
/// let command = Command::Sync(signal);
/// drop(command);
/// assert!(wait.wait().is_err(), "a dropped signal never releases normally");
/// ```
#[must_use]
pub fn barrier() -> (BarrierSignal, BarrierWait) {
    let (tx, rx) = mpsc::sync_channel(1);
    (BarrierSignal { tx }, BarrierWait { rx })
}

/// Writer-side half of a barrier. Consumed by the single release.
#[derive(Debug)]
pub struct BarrierSignal {
    tx: SyncSender<Result<(), LoadError>>,
}

impl BarrierSignal {
    pub(crate) fn release(self, outcome: Result<(), LoadError>) {
        if self.tx.send(outcome).is_err() {
            debug!("barrier released after its waiter went away");
        }
    }
}

/// Caller-side half of a barrier. Consumed by the single wait.
#[derive(Debug)]
pub struct BarrierWait {
    rx: Receiver<Result<(), LoadError>>,
}

impl BarrierWait {
    /// Block until the writer releases the paired signal.
    ///
    /// # Errors
    /// Returns the pipeline's recorded failure, or
    /// [`LoadError::WriterTerminated`] when the signal was dropped without
    /// being released.
    pub fn wait(self) -> Result<(), LoadError> {
        self.rx.recv().map_err(|_| LoadError::WriterTerminated)?
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests fail fast when setup breaks")]

    use super::*;
    use rstest::rstest;
    use std::thread;

    #[rstest]
    fn release_wakes_waiter_on_another_thread() {
        let (signal, wait) = barrier();
        let waiter = thread::spawn(move || wait.wait());
        signal.release(Ok(()));
        let outcome = waiter.join().expect("waiter thread");
        assert!(outcome.is_ok());
    }

    #[rstest]
    fn release_forwards_failure() {
        let (signal, wait) = barrier();
        signal.release(Err(LoadError::Closed));
        assert!(matches!(wait.wait(), Err(LoadError::Closed)));
    }

    #[rstest]
    fn release_without_waiter_is_harmless() {
        let (signal, wait) = barrier();
        drop(wait);
        signal.release(Ok(()));
    }
}
