//! # `edgebc` - Distributed Edge Betweenness Centrality
//!
//! Computes edge betweenness centrality by splitting the source-vertex set
//! across a pool of workers, running a centrality kernel per worker against
//! its own device, and merging the partial results into one table in the
//! caller's vertex labels.
//!
//! ## Architecture
//!
//! 1. **Batch partitioning** ([`betweenness::partition`]): contiguous,
//!    near-equal source batches; the last worker absorbs the remainder.
//! 2. **Graph views** ([`graph::view`]): read-only CSR projection of a
//!    [`Graph`] at 32- or 64-bit precision, built by the organizer only.
//! 3. **Kernel invocation** ([`betweenness::kernel`]): marshals view, batch,
//!    weights and output buffers into one [`CentralityKernel`] call.
//! 4. **Worker coordination** ([`betweenness::coordinator`]): worker 0 is the
//!    [`WorkerRole::Organizer`], every other worker is
//!    [`WorkerRole::Regular`].
//! 5. **Session driving** ([`betweenness::driver`]): single-process fallback
//!    or one task per worker of a leased [`Session`].
//! 6. **Reconciliation** ([`betweenness::reconcile`]): unrenumbering, then
//!    canonical orientation and duplicate merging for undirected graphs.
//!
//! ### Cross-worker contract
//!
//! Every worker calls the kernel exactly once per session. The organizer's
//! call returns only after the contributions of all workers are folded into
//! its output buffer; regular workers return no frame. Scaling always uses
//! the global source count.
//!
//! ### Failure model
//!
//! Fail-fast. A failing worker aborts the session communicator, peers
//! blocked in a collective return [`CommError::Aborted`], and the driver
//! reports the root cause. Device buffers and session leases are released
//! on every path.
//!
//! ## Usage
//!
//! ```
//! use edgebc::{BetweennessConfig, Client, EdgeBetweenness, Graph, GraphKind, LocalCluster};
//!
//! let graph = Graph::from_edge_list(&[0, 1, 2], &[1, 2, 3], None, GraphKind::Undirected)?;
//! let client = Client::with_cluster(LocalCluster::new(2));
//! let table = EdgeBetweenness::new(BetweennessConfig::default()).run(&client, &graph, None)?;
//!
//! assert_eq!(table.len(), 3);
//! assert!(table.rows().all(|(src, dst, _)| src < dst));
//! # Ok::<(), edgebc::BetweennessError>(())
//! ```
//!
//! ## Features
//!
//! - `parallel`: processes the sources of a local batch on the rayon pool, in
//!   fixed-size chunks whose partial sums are folded in batch order.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod betweenness;
pub mod concurrency;
pub mod device;
pub mod error;
pub mod graph;
pub mod precision;
pub mod runtime;

pub use betweenness::{
    edge_betweenness_centrality, BetweennessConfig, BrandesKernel, CentralityKernel, EdgeBetweenness,
    ExecutionStrategy, ResultFrame, ResultTable, WorkerRole,
};
pub use device::{Device, DeviceBuffer, DeviceError};
pub use error::{BetweennessError, CommError, KernelError, Result};
pub use graph::{Graph, GraphKind, GraphView, RenumberMap, VertexId, VertexLabel};
pub use precision::{CentralityScalar, Precision};
pub use runtime::{get_active_session, worker_state, Client, LocalCluster, Session, SessionId};
