//! Edge betweenness centrality: partitioning, kernel dispatch, worker
//! coordination, session driving and result reconciliation.
//!
//! ```text
//! driver ──▶ coordinator × N ──▶ partition ─┐
//!                 │                          ├─▶ kernel::invoke ──▶ CentralityKernel
//!                 └── organizer: GraphView ──┘
//! driver ◀── organizer frame ──▶ reconcile ──▶ ResultTable
//! ```

pub mod brandes;
pub mod coordinator;
pub mod driver;
pub mod kernel;
pub mod partition;
pub mod reconcile;
pub mod sampling;

pub use brandes::BrandesKernel;
pub use coordinator::{organizer_run, regular_run, run_worker, TaskInput, WorkRequest, WorkerRole};
pub use driver::{edge_betweenness_centrality, BetweennessConfig, EdgeBetweenness, ExecutionStrategy};
pub use kernel::{invoke, CentralityKernel, KernelCall, KernelTarget};
pub use partition::{batch_bounds, partition};
pub use reconcile::{reconcile, symmetrize, unrenumber, ResultFrame, ResultTable};
pub use sampling::sample_sources;
