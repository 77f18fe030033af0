//! `LocalCluster`: a fixed-size pool of in-process workers.
//!
//! Each worker owns one [`Device`] for the lifetime of the cluster. A
//! [`Session`] leases the whole pool; [`Session::submit_all`] runs one task per
//! worker on scoped threads and joins them all before returning.

use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::concurrency::{AbortOnPanic, Communicator};
use crate::device::Device;
use crate::runtime::worker::{ContextGuard, DeviceHandle, WorkerContext, WorkerState};

/// Identifier of one session lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    /// Raw identifier value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Address of a worker within the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerAddress(String);

impl WorkerAddress {
    /// The address as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct ClusterInner {
    addresses: Vec<WorkerAddress>,
    devices: Vec<Device>,
    next_session: AtomicU64,
    active_sessions: AtomicUsize,
}

/// A fixed set of workers, one device each.
///
/// Cloning yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct LocalCluster {
    inner: Arc<ClusterInner>,
}

impl LocalCluster {
    /// Creates a pool of `workers` workers with unbounded devices.
    ///
    /// # Panics
    /// Panics if `workers == 0`.
    pub fn new(workers: usize) -> Self {
        Self::with_devices((0..workers).map(Device::new).collect())
    }

    /// Creates a pool whose devices each hold at most `capacity_bytes`.
    ///
    /// # Panics
    /// Panics if `workers == 0`.
    pub fn with_device_capacity(workers: usize, capacity_bytes: usize) -> Self {
        Self::with_devices((0..workers).map(|i| Device::with_capacity(i, capacity_bytes)).collect())
    }

    fn with_devices(devices: Vec<Device>) -> Self {
        assert!(!devices.is_empty(), "a cluster needs at least one worker");
        let addresses = (0..devices.len())
            .map(|i| WorkerAddress(format!("inproc://worker-{i}")))
            .collect();
        Self {
            inner: Arc::new(ClusterInner {
                addresses,
                devices,
                next_session: AtomicU64::new(0),
                active_sessions: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.inner.devices.len()
    }

    /// Device of worker `index`.
    ///
    /// # Panics
    /// Panics if `index >= worker_count()`.
    pub fn device(&self, index: usize) -> &Device {
        &self.inner.devices[index]
    }

    /// Number of session leases currently held.
    pub fn active_sessions(&self) -> usize {
        self.inner.active_sessions.load(Ordering::Acquire)
    }

    pub(crate) fn open_session(&self) -> Session {
        let id = SessionId(self.inner.next_session.fetch_add(1, Ordering::Relaxed));
        self.inner.active_sessions.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(session = %id, workers = self.worker_count(), "session acquired");
        Session {
            id,
            cluster: Arc::clone(&self.inner),
        }
    }
}

/// A lease on every worker of a [`LocalCluster`].
///
/// Released when dropped, on success and failure alike.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    cluster: Arc<ClusterInner>,
}

impl Session {
    /// Identifier of this lease.
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Worker addresses in session order.
    pub fn worker_addresses(&self) -> &[WorkerAddress] {
        &self.cluster.addresses
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.cluster.addresses.len()
    }

    /// Runs `tasks[i]` on worker `i`, all concurrently, and waits for every one.
    ///
    /// Each task sees its worker through [`worker_state`](crate::runtime::worker_state).
    /// A fresh communicator spans the submission; it is aborted if any task
    /// panics. Results are returned in worker order; a panicking task yields `Err`.
    ///
    /// # Panics
    /// Panics if `tasks.len() != self.worker_count()`.
    pub fn submit_all<T, R, F>(&self, tasks: Vec<T>, f: F) -> Vec<std::thread::Result<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let n = self.worker_count();
        assert_eq!(tasks.len(), n, "one task per worker");

        let comm = Arc::new(Communicator::new(n));
        let f = &f;

        std::thread::scope(|scope| {
            let handles: Vec<_> = tasks
                .into_iter()
                .enumerate()
                .map(|(index, task)| {
                    let context = WorkerContext {
                        session_id: self.id,
                        state: WorkerState {
                            worker_count: n,
                            worker_index: index,
                            handle: DeviceHandle::new(self.cluster.devices[index].clone(), Arc::clone(&comm), index),
                        },
                    };
                    let comm = Arc::clone(&comm);
                    scope.spawn(move || {
                        let _abort = AbortOnPanic::new(&comm);
                        let _context = ContextGuard::install(context);
                        f(task)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cluster.active_sessions.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(session = %self.id, "session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::worker_state;

    #[test]
    fn sessions_are_leased_and_released() {
        let cluster = LocalCluster::new(3);
        let a = cluster.open_session();
        let b = cluster.open_session();
        assert_ne!(a.session_id(), b.session_id());
        assert_eq!(cluster.active_sessions(), 2);
        assert_eq!(a.worker_addresses()[2].as_str(), "inproc://worker-2");
        drop(a);
        drop(b);
        assert_eq!(cluster.active_sessions(), 0);
    }

    #[test]
    fn tasks_run_on_their_worker() {
        let cluster = LocalCluster::new(4);
        let session = cluster.open_session();
        let id = session.session_id();
        let results = session.submit_all((0..4).collect(), |task: usize| {
            let state = worker_state(id).unwrap();
            assert_eq!(state.worker_count, 4);
            (task, state.worker_index, state.handle.device().ordinal())
        });
        for (i, r) in results.into_iter().enumerate() {
            assert_eq!(r.unwrap(), (i, i, i));
        }
    }

    #[test]
    fn panicking_task_unblocks_peers() {
        let cluster = LocalCluster::new(2);
        let session = cluster.open_session();
        let id = session.session_id();
        let results = session.submit_all(vec![0usize, 1], |task| {
            let state = worker_state(id).unwrap();
            if task == 1 {
                panic!("worker failed");
            }
            state.handle.comm().barrier()
        });
        assert!(results[1].is_err());
        assert!(matches!(results[0], Ok(Err(crate::error::CommError::Aborted))));
    }

    #[test]
    #[should_panic(expected = "one task per worker")]
    fn task_count_must_match_workers() {
        let cluster = LocalCluster::new(2);
        let session = cluster.open_session();
        let _ = session.submit_all(vec![()], |()| ());
    }
}
