//! Error taxonomy.
//!
//! Every variant of [`BetweennessError`] names the stage that failed: input
//! validation, view construction, kernel invocation, coordination or
//! reconciliation. Nothing is retried; the first failure aborts the call.

use thiserror::Error;

use crate::device::DeviceError;

/// Crate-wide result alias.
pub type Result<T, E = BetweennessError> = core::result::Result<T, E>;

/// Failure of an edge betweenness computation.
#[derive(Debug, Error)]
pub enum BetweennessError {
    /// The requested precision is neither `float32` nor `float64`.
    #[error("unsupported precision `{requested}`: expected float32 or float64")]
    UnsupportedPrecision {
        /// The rejected input, verbatim.
        requested: String,
    },

    /// Edge list columns are inconsistent or reference invalid vertices.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A requested source vertex label does not exist in the graph.
    #[error("source vertex {vertex} is not present in the graph")]
    UnknownSource {
        /// The original (pre-renumbering) label.
        vertex: i64,
    },

    /// A weighted computation was requested on an unweighted graph.
    #[error("weighted computation requested but the graph has no edge weights")]
    MissingWeights,

    /// The organizer could not materialize the graph view on its device.
    #[error("graph view construction failed: {0}")]
    ViewConstruction(#[source] DeviceError),

    /// The organizer could not allocate the centrality output buffer.
    #[error("output buffer allocation failed: {0}")]
    OutputAllocation(#[source] DeviceError),

    /// The centrality kernel reported an error on one worker.
    #[error("kernel invocation failed on worker {worker}: {source}")]
    Kernel {
        /// Position of the failing worker in session order.
        worker: usize,
        /// Error reported by the kernel.
        #[source]
        source: KernelError,
    },

    /// Task submission, role resolution or result collection failed.
    #[error("worker coordination failed: {0}")]
    Coordination(String),

    /// The distributed-session runtime rejected a request.
    #[error("session error: {0}")]
    Session(String),

    /// The result frame could not be mapped back to the caller's labels.
    #[error("result reconciliation failed: {0}")]
    Reconciliation(String),

    /// Reading an edge list failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An edge list file is malformed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number (0 when the whole file is rejected).
        line: usize,
        /// What was wrong.
        message: String,
    },
}

impl BetweennessError {
    /// Returns `true` if this error only reports that a peer aborted the session.
    ///
    /// Used to surface the root cause instead of the cascade it triggered.
    pub fn is_abort_cascade(&self) -> bool {
        matches!(
            self,
            Self::Kernel {
                source: KernelError::Comm(CommError::Aborted),
                ..
            }
        )
    }
}

/// Failure reported by a centrality kernel (the `KernelFailure` class).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// The organizer invoked the kernel without a graph view.
    #[error("organizer invoked the kernel without a graph view")]
    MissingView,

    /// The output buffer does not match the view's directed edge count.
    #[error("output buffer holds {actual} entries but the view has {expected} directed edges")]
    OutputSizeMismatch {
        /// Directed edge count of the view.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// The weight buffer does not match the view's directed edge count.
    #[error("weight buffer holds {actual} entries but the view has {expected} directed edges")]
    WeightSizeMismatch {
        /// Directed edge count of the view.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// A batch entry is not a vertex of the view.
    #[error("source vertex {vertex} out of range for {vertex_count} vertices")]
    SourceOutOfRange {
        /// Offending internal vertex index.
        vertex: usize,
        /// Number of vertices in the view.
        vertex_count: usize,
    },

    /// A scratch or staging allocation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A collective operation failed.
    #[error(transparent)]
    Comm(#[from] CommError),

    /// Any other kernel-internal failure.
    #[error("{0}")]
    Internal(String),
}

/// Failure of a collective operation on a [`Communicator`](crate::concurrency::Communicator).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommError {
    /// A peer aborted the communicator while this rank was blocked.
    #[error("communicator aborted by a failing peer")]
    Aborted,

    /// The rank does not belong to the communicator.
    #[error("rank {rank} out of range for communicator of size {size}")]
    InvalidRank {
        /// Offending rank.
        rank: usize,
        /// Communicator size.
        size: usize,
    },

    /// The root called `broadcast` without a payload.
    #[error("broadcast root supplied no payload")]
    MissingPayload,

    /// A rank received a payload of an unexpected type or shape.
    #[error("collective payload mismatch on rank {rank}")]
    PayloadMismatch {
        /// Rank that detected the mismatch.
        rank: usize,
    },
}
