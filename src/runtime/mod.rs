//! The distributed-compute runtime the coordination layer is built on.
//!
//! - [`Client`]: what a caller holds; optionally attached to a [`LocalCluster`]
//! - [`get_active_session`]: leases the attached cluster, if any
//! - [`Session`]: RAII lease; submits one task per worker and joins them
//! - [`worker_state`]: the calling worker's index, worker count and device handle

pub mod cluster;
pub mod worker;

pub use cluster::{LocalCluster, Session, SessionId, WorkerAddress};
pub use worker::{worker_state, DeviceHandle, WorkerState};

/// Entry point held by callers of the centrality API.
#[derive(Debug, Clone, Default)]
pub struct Client {
    cluster: Option<LocalCluster>,
}

impl Client {
    /// A client with no distributed runtime; computations run in-process.
    pub fn local() -> Self {
        Self { cluster: None }
    }

    /// A client attached to `cluster`.
    pub fn with_cluster(cluster: LocalCluster) -> Self {
        Self { cluster: Some(cluster) }
    }

    /// The attached cluster, if any.
    pub fn cluster(&self) -> Option<&LocalCluster> {
        self.cluster.as_ref()
    }
}

/// Leases the client's cluster.
///
/// Returns `None` when the client has no distributed runtime attached.
pub fn get_active_session(client: &Client) -> Option<Session> {
    client.cluster.as_ref().map(LocalCluster::open_session)
}
