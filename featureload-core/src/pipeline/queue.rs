//! Bounded monitor queue shared by producers and the writer thread.

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

use crate::{Command, LoadError};

/// FIFO of commands with a hard capacity.
///
/// Besides the commands, the monitor holds the pipeline's terminal state:
/// the first recorded failure and whether the writer has stopped. It is the
/// only structure mutated by more than one thread.
#[derive(Debug)]
pub(crate) struct WorkQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    commands: VecDeque<Command>,
    failure: Option<LoadError>,
    closed: bool,
}

impl WorkQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                commands: VecDeque::with_capacity(capacity),
                ..QueueState::default()
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    // A panic while holding the lock cannot leave the deque half-updated, so
    // poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `command`, blocking while the queue is at capacity.
    ///
    /// Once a failure is recorded only [`Command::Finish`] is accepted; every
    /// other command is handed back as the failure, including to producers
    /// that were already waiting for room. Queuing `Finish` closes the queue,
    /// so anything pushed after it is rejected with [`LoadError::Closed`].
    pub(crate) fn push(&self, command: Command) -> Result<(), LoadError> {
        let is_finish = matches!(command, Command::Finish(_));
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(LoadError::Closed);
            }
            if !is_finish {
                if let Some(failure) = &state.failure {
                    return Err(failure.clone());
                }
            }
            if state.commands.len() < self.capacity {
                break;
            }
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.commands.push_back(command);
        state.closed |= is_finish;
        drop(state);
        self.not_empty.notify_one();
        if is_finish {
            self.not_full.notify_all();
        }
        Ok(())
    }

    /// Remove the oldest command, blocking while the queue is empty.
    pub(crate) fn pop_blocking(&self) -> Command {
        let mut state = self.lock();
        loop {
            if let Some(command) = state.commands.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return command;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Record the pipeline's terminal failure. Later failures are ignored.
    pub(crate) fn record_failure(&self, error: LoadError) {
        let mut state = self.lock();
        if state.failure.is_none() {
            state.failure = Some(error);
        }
        drop(state);
        self.not_full.notify_all();
    }

    /// The recorded failure, if any.
    pub(crate) fn failure(&self) -> Option<LoadError> {
        self.lock().failure.clone()
    }

    /// Refuse further commands and hand back anything still queued.
    pub(crate) fn close(&self) -> Vec<Command> {
        let mut state = self.lock();
        state.closed = true;
        let leftovers = state.commands.drain(..).collect();
        drop(state);
        self.not_full.notify_all();
        leftovers
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().commands.len()
    }
}
