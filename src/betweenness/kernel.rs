//! Kernel invocation: the seam between coordination and the centrality kernel.
//!
//! A [`CentralityKernel`] is opaque to the coordination layer. Its contract:
//! - every rank of the handle's communicator calls it once per session
//! - the organizer (rank 0) passes a graph view and an output buffer sized to
//!   the view's directed edge count; regular ranks pass neither
//! - contributions of all ranks for their local batches are folded into the
//!   organizer's output before the organizer's call returns
//! - scaling uses the global source count, not the local batch size
//!
//! [`invoke`] marshals host arguments into that shape.

use crate::betweenness::coordinator::WorkerRole;
use crate::device::DeviceBuffer;
use crate::error::KernelError;
use crate::graph::{GraphView, VertexId};
use crate::precision::CentralityScalar;
use crate::runtime::DeviceHandle;

/// What one rank brings to a kernel call.
pub enum KernelTarget<'a, T: CentralityScalar> {
    /// The organizer owns the view and receives the folded result.
    Organizer {
        /// Graph view built by the organizer.
        view: &'a GraphView<T>,
        /// Per-instance weights, `None` for an unweighted computation.
        weights: Option<&'a DeviceBuffer<T>>,
        /// Zero-filled output, one slot per directed edge instance.
        output: &'a mut DeviceBuffer<T>,
    },
    /// A regular rank contributes work for its batch only.
    Regular,
}

/// Arguments of one kernel call on one rank.
pub struct KernelCall<'a, T: CentralityScalar> {
    /// Role-specific buffers.
    pub target: KernelTarget<'a, T>,
    /// Whether to normalize by `1 / (n (n - 1))`.
    pub normalized: bool,
    /// This rank's source vertices, on its device.
    pub local_batch: &'a DeviceBuffer<VertexId>,
    /// Number of sources across all ranks.
    pub total_source_count: usize,
}

/// An edge betweenness kernel, instantiated per precision.
pub trait CentralityKernel: Sync {
    /// Runs this rank's part of the computation.
    ///
    /// # Errors
    /// Any [`KernelError`]; a failing rank must not be expected to reach later
    /// collectives, so callers abort the communicator on error.
    fn edge_betweenness<T: CentralityScalar>(
        &self,
        handle: &DeviceHandle,
        call: KernelCall<'_, T>,
    ) -> Result<(), KernelError>;
}

/// Marshals a kernel call for `handle`'s rank and runs it in place.
///
/// The organizer passes `Some(view)` and `Some(output)`; regular ranks pass
/// `None` for both. The local batch is staged on the rank's device for the
/// duration of the call.
///
/// # Errors
/// - [`KernelError::MissingView`] if the organizer rank has no view
/// - [`KernelError::OutputSizeMismatch`] / [`KernelError::WeightSizeMismatch`] on mis-sized buffers
/// - anything the kernel itself reports, unchanged
#[allow(clippy::too_many_arguments)]
pub fn invoke<K, T>(
    kernel: &K,
    handle: &DeviceHandle,
    view: Option<&GraphView<T>>,
    output: Option<&mut DeviceBuffer<T>>,
    normalized: bool,
    weights: Option<&DeviceBuffer<T>>,
    local_batch: &[VertexId],
    total_source_count: usize,
) -> Result<(), KernelError>
where
    K: CentralityKernel,
    T: CentralityScalar,
{
    let target = match (view, output) {
        (Some(view), Some(output)) => {
            let expected = view.directed_edge_count();
            if output.len() != expected {
                return Err(KernelError::OutputSizeMismatch {
                    expected,
                    actual: output.len(),
                });
            }
            if let Some(w) = weights.filter(|w| w.len() != expected) {
                return Err(KernelError::WeightSizeMismatch {
                    expected,
                    actual: w.len(),
                });
            }
            KernelTarget::Organizer { view, weights, output }
        }
        (None, _) if WorkerRole::for_worker(handle.rank()) == WorkerRole::Organizer => {
            return Err(KernelError::MissingView);
        }
        (None, None) => KernelTarget::Regular,
        (None, Some(_)) | (Some(_), None) => {
            return Err(KernelError::Internal(
                "graph view and output buffer must be supplied together".to_owned(),
            ));
        }
    };

    let batch = handle.device().upload(local_batch)?;
    tracing::debug!(
        rank = handle.rank(),
        precision = %T::PRECISION,
        batch = batch.len(),
        total_source_count,
        "invoking centrality kernel"
    );
    kernel.edge_betweenness(
        handle,
        KernelCall {
            target,
            normalized,
            local_batch: &batch,
            total_source_count,
        },
    )
}
