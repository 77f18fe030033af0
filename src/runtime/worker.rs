//! Per-worker execution context.
//!
//! While a session task runs on worker `i`, a thread-local context records the
//! session it belongs to together with the worker's [`DeviceHandle`]. Tasks read
//! it once through [`worker_state`].

use std::cell::RefCell;
use std::sync::Arc;

use crate::concurrency::Communicator;
use crate::device::Device;
use crate::error::{BetweennessError, Result};
use crate::runtime::SessionId;

/// Everything a kernel needs to run on one worker: its device and its place
/// in the session's communicator.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    device: Device,
    comm: Arc<Communicator>,
    rank: usize,
}

impl DeviceHandle {
    /// Binds `device` to rank `rank` of `comm`.
    ///
    /// # Panics
    /// Panics if `rank >= comm.size()`.
    pub fn new(device: Device, comm: Arc<Communicator>, rank: usize) -> Self {
        assert!(rank < comm.size(), "rank {rank} out of range for {} ranks", comm.size());
        Self { device, comm, rank }
    }

    /// A single-rank handle for in-process execution.
    pub fn solo(device: Device) -> Self {
        Self::new(device, Arc::new(Communicator::new(1)), 0)
    }

    /// The worker's device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The session communicator.
    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    /// This worker's rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the communicator.
    pub fn size(&self) -> usize {
        self.comm.size()
    }
}

/// What a coordination task learns about the worker it runs on.
#[derive(Debug, Clone)]
pub struct WorkerState {
    /// Number of workers in the session.
    pub worker_count: usize,
    /// Position of this worker in session order.
    pub worker_index: usize,
    /// Device and communicator of this worker.
    pub handle: DeviceHandle,
}

#[derive(Debug, Clone)]
pub(crate) struct WorkerContext {
    pub(crate) session_id: SessionId,
    pub(crate) state: WorkerState,
}

thread_local! {
    static CURRENT_WORKER: RefCell<Option<WorkerContext>> = const { RefCell::new(None) };
}

/// Installs a worker context on the current thread for the guard's lifetime.
pub(crate) struct ContextGuard {
    _private: (),
}

impl ContextGuard {
    pub(crate) fn install(context: WorkerContext) -> Self {
        CURRENT_WORKER.with(|cell| *cell.borrow_mut() = Some(context));
        Self { _private: () }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_WORKER.with(|cell| cell.borrow_mut().take());
    }
}

/// Reads the state of the worker executing the current task.
///
/// # Errors
/// Returns [`BetweennessError::Session`] when called outside a worker task,
/// or from a task of a different session.
pub fn worker_state(session_id: SessionId) -> Result<WorkerState> {
    CURRENT_WORKER.with(|cell| match &*cell.borrow() {
        Some(ctx) if ctx.session_id == session_id => Ok(ctx.state.clone()),
        Some(ctx) => Err(BetweennessError::Session(format!(
            "worker belongs to {} but the task was submitted to {session_id}",
            ctx.session_id
        ))),
        None => Err(BetweennessError::Session(
            "worker state requested outside of a worker task".to_owned(),
        )),
    })
}
