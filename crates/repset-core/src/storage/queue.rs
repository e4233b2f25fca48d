//! Write serialization for session data
//!
//! Saving a session is a multi-statement rewrite: soft-delete the old
//! set list, then insert the replacement. Two saves racing would
//! interleave those steps, so every session write goes through a single
//! FIFO queue and runs to completion before the next one starts.
//!
//! The queue hands out numbered tickets; a condvar wakes waiters as
//! `now_serving` advances. Completion is signalled from a drop guard, so
//! a panicking job still releases its turn instead of stranding every
//! writer behind it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// FIFO queue that runs submitted jobs one at a time, in submission order
pub struct WriteQueue {
    state: Mutex<QueueState>,
    turn: Condvar,
}

#[derive(Default)]
struct QueueState {
    /// Next ticket to hand out
    next_ticket: u64,
    /// Ticket currently allowed to run
    now_serving: u64,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            turn: Condvar::new(),
        }
    }

    /// Run `job` once every earlier submission has finished
    ///
    /// Blocks the calling thread until its turn comes up, then executes
    /// the job on that thread and returns its output.
    pub fn run<T>(&self, job: impl FnOnce() -> T) -> T {
        let ticket = {
            let mut state = self.lock();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            ticket
        };

        let mut state = self.lock();
        while state.now_serving != ticket {
            state = self
                .turn
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(state);

        // The guard advances now_serving even if the job panics
        let _turn = TurnGuard { queue: self };
        job()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the current turn on drop and wakes the waiters
struct TurnGuard<'a> {
    queue: &'a WriteQueue,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.lock();
        state.now_serving += 1;
        drop(state);
        self.queue.turn.notify_all();
    }
}
