//! `AbortableBarrier`: a reusable barrier that a failing participant can break.
//!
//! `std::sync::Barrier` blocks forever if one party never arrives. Worker
//! tasks fail independently, so every rendezvous has to be abortable: once
//! any party calls [`AbortableBarrier::abort`], current and future waiters
//! return [`CommError::Aborted`].

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::CommError;

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// A generation-counting barrier for a fixed number of parties.
#[derive(Debug)]
pub struct AbortableBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl AbortableBarrier {
    /// Creates a barrier for `parties` participants.
    ///
    /// # Panics
    /// Panics if `parties == 0`.
    pub fn new(parties: usize) -> Self {
        assert!(parties != 0, "parties must be > 0");
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Number of participants.
    pub fn parties(&self) -> usize {
        self.parties
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until all parties have arrived.
    ///
    /// Returns `Ok(true)` on exactly one party per generation (the last to arrive).
    ///
    /// # Errors
    /// Returns [`CommError::Aborted`] if the barrier is or becomes aborted.
    pub fn wait(&self) -> Result<bool, CommError> {
        let mut state = self.lock();
        if state.aborted {
            return Err(CommError::Aborted);
        }
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            drop(state);
            self.cvar.notify_all();
            return Ok(true);
        }

        let generation = state.generation;
        while state.generation == generation && !state.aborted {
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.generation == generation {
            return Err(CommError::Aborted);
        }
        Ok(false)
    }

    /// Breaks the barrier for every current and future waiter.
    pub fn abort(&self) {
        let mut state = self.lock();
        state.aborted = true;
        drop(state);
        self.cvar.notify_all();
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }
}
