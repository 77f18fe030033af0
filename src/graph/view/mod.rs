//! Read-only CSR (compressed sparse row) projection of a [`Graph`] on a device.
//!
//! Memory layout:
//! - `offsets`: `n + 1` row offsets
//! - `indices`: destination of each directed edge instance, row-major
//! - `weights`: per-instance weight at the view's precision, if the graph is weighted
//!
//! The position of an edge instance in `indices` is its identity: kernels write
//! the contribution of instance `i` into slot `i` of the output buffer.
//! Undirected graphs contribute both orientations of every non-loop edge.

use crate::device::{Device, DeviceBuffer, DeviceError};
use crate::graph::{Graph, GraphKind, VertexId};
use crate::precision::CentralityScalar;

/// A device-resident, immutable CSR view at precision `T`.
///
/// ### Performance Characteristics
/// | Operation | Complexity | Notes |
/// |-----------|------------|-------|
/// | `build` | \(O(n + m)\) | Counting sort of edge instances by source |
/// | `out_edges` | \(O(1)\) | Iterator over `(position, target)` |
/// | `snapshot` / `upload` | \(O(n + m)\) | Host copy for broadcast |
pub struct GraphView<T: CentralityScalar> {
    kind: GraphKind,
    offsets: DeviceBuffer<usize>,
    indices: DeviceBuffer<VertexId>,
    weights: Option<DeviceBuffer<T>>,
}

/// Host copy of a view, used to ship it to peer workers.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot<T> {
    /// Directedness of the source graph.
    pub kind: GraphKind,
    /// Row offsets (`n + 1` entries).
    pub offsets: Vec<usize>,
    /// Edge instance targets.
    pub indices: Vec<VertexId>,
    /// Edge instance weights.
    pub weights: Option<Vec<T>>,
}

impl<T: CentralityScalar> GraphView<T> {
    /// Builds the view of `graph` on `device`.
    ///
    /// # Errors
    /// Returns [`DeviceError`] if the device cannot hold the adjacency arrays.
    pub fn build(device: &Device, graph: &Graph) -> Result<Self, DeviceError> {
        let n = graph.vertex_count();
        let undirected = !graph.is_directed();

        let mut offsets = vec![0usize; n + 1];
        for (&u, &v) in graph.sources().iter().zip(graph.destinations()) {
            offsets[u + 1] += 1;
            if undirected && u != v {
                offsets[v + 1] += 1;
            }
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }

        let m = offsets[n];
        let mut cursor = offsets.clone();
        let mut indices = vec![0usize; m];
        let mut weights = graph.weights().map(|_| vec![T::zero(); m]);

        let mut place = |from: VertexId, to: VertexId, edge: usize| {
            let slot = cursor[from];
            cursor[from] += 1;
            indices[slot] = to;
            if let (Some(out), Some(w)) = (weights.as_mut(), graph.weights()) {
                out[slot] = T::narrow(w[edge]);
            }
        };
        for (edge, (&u, &v)) in graph.sources().iter().zip(graph.destinations()).enumerate() {
            place(u, v, edge);
            if undirected && u != v {
                place(v, u, edge);
            }
        }

        Self::upload(
            device,
            ViewSnapshot {
                kind: graph.kind(),
                offsets,
                indices,
                weights,
            },
        )
    }

    /// Materializes a snapshot on `device`.
    ///
    /// # Errors
    /// Returns [`DeviceError`] if the device cannot hold the adjacency arrays.
    pub fn upload(device: &Device, snapshot: ViewSnapshot<T>) -> Result<Self, DeviceError> {
        debug_assert!(!snapshot.offsets.is_empty(), "offsets must have length n+1");
        Ok(Self {
            kind: snapshot.kind,
            offsets: device.adopt(snapshot.offsets)?,
            indices: device.adopt(snapshot.indices)?,
            weights: snapshot.weights.map(|w| device.adopt(w)).transpose()?,
        })
    }

    /// Copies the view back to the host.
    pub fn snapshot(&self) -> ViewSnapshot<T> {
        ViewSnapshot {
            kind: self.kind,
            offsets: self.offsets.to_host(),
            indices: self.indices.to_host(),
            weights: self.weights.as_ref().map(DeviceBuffer::to_host),
        }
    }

    /// Directedness of the source graph.
    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    /// Returns `true` if the source graph is directed.
    pub fn is_directed(&self) -> bool {
        self.kind.is_directed()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        // `offsets` is length `n + 1` by construction.
        self.offsets.len().saturating_sub(1)
    }

    /// Number of directed edge instances (length of a matching output buffer).
    pub fn directed_edge_count(&self) -> usize {
        self.indices.len()
    }

    /// Row offsets.
    pub fn offsets(&self) -> &[usize] {
        self.offsets.as_slice()
    }

    /// Edge instance targets.
    pub fn indices(&self) -> &[VertexId] {
        self.indices.as_slice()
    }

    /// Edge instance weights, if the graph is weighted.
    pub fn weights(&self) -> Option<&DeviceBuffer<T>> {
        self.weights.as_ref()
    }

    /// Outgoing edge instances of `node` as `(position, target)`.
    #[inline]
    pub fn out_edges(&self, node: VertexId) -> impl Iterator<Item = (usize, VertexId)> + '_ {
        let offsets = self.offsets.as_slice();
        let indices = self.indices.as_slice();
        (offsets[node]..offsets[node + 1]).map(move |pos| (pos, indices[pos]))
    }

    /// Source vertex of every edge instance, in position order.
    pub fn edge_sources(&self) -> Vec<VertexId> {
        let offsets = self.offsets.as_slice();
        let mut out = Vec::with_capacity(self.directed_edge_count());
        for (u, w) in offsets.windows(2).enumerate() {
            out.extend(core::iter::repeat(u).take(w[1] - w[0]));
        }
        out
    }
}
