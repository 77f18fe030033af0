//! Per-worker coordination: role resolution and the two role paths.
//!
//! ```text
//! Start ──index 0──▶ Organizer-Run: batch, view, output, invoke, read back ──▶ Some(frame)
//!   │
//!   └──index > 0──▶ Regular-Run: batch, invoke without view ──────────────────▶ None
//! ```
//!
//! A worker whose path fails aborts the session communicator before
//! returning, so peers blocked in a collective are released with
//! [`CommError::Aborted`](crate::error::CommError::Aborted).

use crate::betweenness::kernel::{invoke, CentralityKernel};
use crate::betweenness::partition::partition;
use crate::betweenness::reconcile::ResultFrame;
use crate::error::{BetweennessError, Result};
use crate::graph::{Graph, GraphView, VertexId};
use crate::precision::CentralityScalar;
use crate::runtime::{DeviceHandle, WorkerState};

/// Role of a worker, fixed by its position in the session's worker order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// Builds the view, invokes the kernel with it, returns the frame.
    Organizer,
    /// Contributes its batch; returns no frame.
    Regular,
}

impl WorkerRole {
    /// Session position of the organizer.
    pub const ORGANIZER_INDEX: usize = 0;

    /// Role of the worker at `worker_index`.
    #[inline]
    pub const fn for_worker(worker_index: usize) -> Self {
        if worker_index == Self::ORGANIZER_INDEX {
            Self::Organizer
        } else {
            Self::Regular
        }
    }
}

/// Parameters shared by every worker of one computation.
#[derive(Debug, Clone, Copy)]
pub struct WorkRequest<'a> {
    /// Normalize by `1 / (n (n - 1))`.
    pub normalized: bool,
    /// Use the graph's edge weights.
    pub weighted: bool,
    /// Global source sequence, internal indices.
    pub sources: &'a [VertexId],
}

/// What a coordination task carries besides the shared request.
#[derive(Debug, Clone, Copy)]
pub enum TaskInput<'g> {
    /// Shared reference to the graph, given to the organizer only.
    Graph(&'g Graph),
    /// A regular worker's own session position.
    WorkerIndex(usize),
}

/// Organizer path: builds the view, allocates the output, runs the kernel and
/// reads the result back as a frame.
///
/// With a solo handle this is the whole single-process computation.
///
/// # Errors
/// - [`BetweennessError::ViewConstruction`] / [`BetweennessError::OutputAllocation`] on device exhaustion
/// - [`BetweennessError::MissingWeights`] if weights are requested but absent
/// - [`BetweennessError::Kernel`] for kernel failures, tagged with this worker's index
pub fn organizer_run<K, T>(
    kernel: &K,
    handle: &DeviceHandle,
    graph: &Graph,
    request: &WorkRequest<'_>,
) -> Result<ResultFrame>
where
    K: CentralityKernel,
    T: CentralityScalar,
{
    let batch = partition(request.sources, handle.size(), handle.rank());
    let view = GraphView::<T>::build(handle.device(), graph).map_err(BetweennessError::ViewConstruction)?;
    let weights = if request.weighted {
        Some(view.weights().ok_or(BetweennessError::MissingWeights)?)
    } else {
        None
    };
    let mut output = handle
        .device()
        .alloc_zeroed::<T>(view.directed_edge_count())
        .map_err(BetweennessError::OutputAllocation)?;

    tracing::debug!(
        rank = handle.rank(),
        batch = batch.len(),
        edges = view.directed_edge_count(),
        "organizer run"
    );
    invoke(
        kernel,
        handle,
        Some(&view),
        Some(&mut output),
        request.normalized,
        weights,
        batch,
        request.sources.len(),
    )
    .map_err(|source| BetweennessError::Kernel {
        worker: handle.rank(),
        source,
    })?;

    Ok(ResultFrame {
        src: view.edge_sources(),
        dst: view.indices().to_vec(),
        betweenness: output.as_slice().iter().map(|&x| x.widen()).collect(),
    })
}

/// Regular path: runs the kernel for this worker's batch without a view.
///
/// # Errors
/// [`BetweennessError::Kernel`] for kernel failures, tagged with this worker's index.
pub fn regular_run<K, T>(kernel: &K, handle: &DeviceHandle, request: &WorkRequest<'_>) -> Result<()>
where
    K: CentralityKernel,
    T: CentralityScalar,
{
    let batch = partition(request.sources, handle.size(), handle.rank());
    tracing::debug!(rank = handle.rank(), batch = batch.len(), "regular run");
    invoke::<K, T>(
        kernel,
        handle,
        None,
        None,
        request.normalized,
        None,
        batch,
        request.sources.len(),
    )
    .map_err(|source| BetweennessError::Kernel {
        worker: handle.rank(),
        source,
    })
}

/// Resolves this worker's role and runs the matching path.
///
/// Returns `Some(frame)` on the organizer and `None` on regular workers. On
/// failure the session communicator is aborted before the error is returned.
///
/// # Errors
/// [`BetweennessError::Coordination`] if `input` does not match the worker's
/// role, otherwise whatever the role path reports.
pub fn run_worker<K, T>(
    kernel: &K,
    state: &WorkerState,
    input: TaskInput<'_>,
    request: &WorkRequest<'_>,
) -> Result<Option<ResultFrame>>
where
    K: CentralityKernel,
    T: CentralityScalar,
{
    let role = WorkerRole::for_worker(state.worker_index);
    let outcome = match (role, input) {
        (WorkerRole::Organizer, TaskInput::Graph(graph)) => {
            organizer_run::<K, T>(kernel, &state.handle, graph, request).map(Some)
        }
        (WorkerRole::Regular, TaskInput::WorkerIndex(index)) if index == state.worker_index => {
            regular_run::<K, T>(kernel, &state.handle, request).map(|()| None)
        }
        (role, input) => Err(BetweennessError::Coordination(format!(
            "worker {} resolved as {role:?} but received {}",
            state.worker_index,
            match input {
                TaskInput::Graph(_) => "the graph".to_owned(),
                TaskInput::WorkerIndex(i) => format!("worker index {i}"),
            }
        ))),
    };

    if let Err(err) = &outcome {
        if !err.is_abort_cascade() {
            tracing::warn!(worker = state.worker_index, error = %err, "worker failed, aborting session");
        }
        state.handle.comm().abort();
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::betweenness::brandes::BrandesKernel;
    use crate::concurrency::Communicator;
    use crate::device::Device;
    use crate::error::{CommError, KernelError};
    use crate::graph::GraphKind;

    fn path() -> Graph {
        Graph::from_indices(4, vec![0, 1, 2], vec![1, 2, 3], None, GraphKind::Undirected).unwrap()
    }

    #[test]
    fn roles_follow_position() {
        assert_eq!(WorkerRole::for_worker(0), WorkerRole::Organizer);
        assert_eq!(WorkerRole::for_worker(1), WorkerRole::Regular);
        assert_eq!(WorkerRole::for_worker(usize::MAX), WorkerRole::Regular);
    }

    #[test]
    fn solo_organizer_returns_full_frame() {
        let handle = DeviceHandle::solo(Device::new(0));
        let sources = [0, 1, 2, 3];
        let request = WorkRequest {
            normalized: false,
            weighted: false,
            sources: &sources,
        };
        let frame = organizer_run::<_, f64>(&BrandesKernel, &handle, &path(), &request).unwrap();
        assert_eq!(frame.len(), 6);
        assert_eq!(frame.betweenness.iter().sum::<f64>(), 10.0);
        // view, output and staging buffers are gone
        assert_eq!(handle.device().live_allocations(), 0);
    }

    #[test]
    fn weighted_request_needs_weights() {
        let handle = DeviceHandle::solo(Device::new(0));
        let request = WorkRequest {
            normalized: true,
            weighted: true,
            sources: &[0],
        };
        let err = organizer_run::<_, f32>(&BrandesKernel, &handle, &path(), &request).unwrap_err();
        assert!(matches!(err, BetweennessError::MissingWeights));
    }

    #[test]
    fn exhausted_device_fails_view_construction() {
        let handle = DeviceHandle::solo(Device::with_capacity(0, 8));
        let request = WorkRequest {
            normalized: true,
            weighted: false,
            sources: &[0],
        };
        let err = organizer_run::<_, f64>(&BrandesKernel, &handle, &path(), &request).unwrap_err();
        assert!(matches!(err, BetweennessError::ViewConstruction(_)));
        assert_eq!(handle.device().bytes_in_use(), 0);
    }

    #[test]
    fn mismatched_input_aborts_the_communicator() {
        let comm = Arc::new(Communicator::new(2));
        let state = WorkerState {
            worker_count: 2,
            worker_index: 1,
            handle: DeviceHandle::new(Device::new(1), Arc::clone(&comm), 1),
        };
        let request = WorkRequest {
            normalized: true,
            weighted: false,
            sources: &[0, 1],
        };
        let err = run_worker::<_, f64>(&BrandesKernel, &state, TaskInput::Graph(&path()), &request)
            .unwrap_err();
        assert!(matches!(err, BetweennessError::Coordination(_)));
        assert!(comm.is_aborted());
    }

    #[test]
    fn regular_worker_on_aborted_session_reports_cascade() {
        let comm = Arc::new(Communicator::new(2));
        comm.abort();
        let state = WorkerState {
            worker_count: 2,
            worker_index: 1,
            handle: DeviceHandle::new(Device::new(1), Arc::clone(&comm), 1),
        };
        let request = WorkRequest {
            normalized: true,
            weighted: false,
            sources: &[0, 1],
        };
        let err = run_worker::<_, f64>(&BrandesKernel, &state, TaskInput::WorkerIndex(1), &request).unwrap_err();
        assert!(err.is_abort_cascade());
        assert!(matches!(
            err,
            BetweennessError::Kernel {
                worker: 1,
                source: KernelError::Comm(CommError::Aborted)
            }
        ));
    }
}
