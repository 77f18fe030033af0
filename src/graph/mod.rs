//! Logical graphs, their renumbering, and the read-only views kernels consume.
//!
//! - [`Graph`]: edge list in compact internal indices plus optional weights
//! - [`RenumberMap`]: original labels ↔ internal indices
//! - [`view::GraphView`]: CSR projection at a chosen precision, built by the organizer
//! - [`io`]: Matrix Market / delimited edge list loading

pub mod io;
pub mod renumber;
pub mod view;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BetweennessError, Result};

pub use renumber::RenumberMap;
pub use view::{GraphView, ViewSnapshot};

/// Compact internal vertex index (`0..vertex_count`).
pub type VertexId = usize;

/// Vertex label as supplied by the caller.
pub type VertexLabel = i64;

/// Directedness of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    /// Every edge is traversed in its stored direction only.
    Directed,
    /// Every edge is traversed in both directions.
    Undirected,
}

impl GraphKind {
    /// Returns `true` for [`GraphKind::Directed`].
    pub const fn is_directed(self) -> bool {
        matches!(self, Self::Directed)
    }
}

/// An edge list over compact vertex indices.
///
/// Invariants established at construction:
/// - every endpoint is `< vertex_count`
/// - no duplicate edges (first occurrence and its weight win)
/// - undirected edges are stored once, smaller endpoint first
/// - weights, if present, are finite and strictly positive
#[derive(Debug, Clone)]
pub struct Graph {
    kind: GraphKind,
    vertex_count: usize,
    src: Vec<VertexId>,
    dst: Vec<VertexId>,
    weights: Option<Vec<f64>>,
    renumber_map: Option<RenumberMap>,
}

impl Graph {
    /// Builds a graph from arbitrary integer labels, renumbering them to `0..n`.
    ///
    /// # Errors
    /// Returns [`BetweennessError::InvalidGraph`] on mismatched column lengths
    /// or invalid weights.
    pub fn from_edge_list(
        src: &[VertexLabel],
        dst: &[VertexLabel],
        weights: Option<&[f64]>,
        kind: GraphKind,
    ) -> Result<Self> {
        check_columns(src.len(), dst.len(), weights.map(<[f64]>::len))?;
        let map = RenumberMap::from_columns(src, dst);
        let src = map.renumber_column(src)?;
        let dst = map.renumber_column(dst)?;
        let mut graph = Self::from_indices(map.len(), src, dst, weights.map(<[f64]>::to_vec), kind)?;
        graph.renumber_map = Some(map);
        Ok(graph)
    }

    /// Builds a graph whose labels already are compact indices `0..vertex_count`.
    ///
    /// # Errors
    /// Returns [`BetweennessError::InvalidGraph`] on mismatched column lengths,
    /// out-of-range endpoints or invalid weights.
    pub fn from_indices(
        vertex_count: usize,
        src: Vec<VertexId>,
        dst: Vec<VertexId>,
        weights: Option<Vec<f64>>,
        kind: GraphKind,
    ) -> Result<Self> {
        check_columns(src.len(), dst.len(), weights.as_ref().map(Vec::len))?;
        if let Some(w) = &weights {
            if let Some((i, bad)) = w.iter().enumerate().find(|(_, x)| !x.is_finite() || **x <= 0.0) {
                return Err(BetweennessError::InvalidGraph(format!(
                    "edge {i} has weight {bad}; weights must be finite and positive"
                )));
            }
        }

        let mut seen = HashSet::with_capacity(src.len());
        let mut out_src = Vec::with_capacity(src.len());
        let mut out_dst = Vec::with_capacity(dst.len());
        let mut out_w = weights.as_ref().map(|w| Vec::with_capacity(w.len()));

        for (i, (&u, &v)) in src.iter().zip(&dst).enumerate() {
            if u >= vertex_count || v >= vertex_count {
                return Err(BetweennessError::InvalidGraph(format!(
                    "edge {u}->{v} is out of bounds for {vertex_count} vertices"
                )));
            }
            let (u, v) = match kind {
                GraphKind::Undirected if u > v => (v, u),
                _ => (u, v),
            };
            if !seen.insert((u, v)) {
                continue;
            }
            out_src.push(u);
            out_dst.push(v);
            if let (Some(out), Some(w)) = (out_w.as_mut(), weights.as_ref()) {
                out.push(w[i]);
            }
        }

        Ok(Self {
            kind,
            vertex_count,
            src: out_src,
            dst: out_dst,
            weights: out_w,
            renumber_map: None,
        })
    }

    /// Directedness.
    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    /// Returns `true` if the graph is directed.
    pub fn is_directed(&self) -> bool {
        self.kind.is_directed()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of stored (logical) edges.
    pub fn edge_count(&self) -> usize {
        self.src.len()
    }

    /// Number of directed edge instances a traversal sees.
    ///
    /// Undirected non-loop edges count twice.
    pub fn directed_edge_count(&self) -> usize {
        match self.kind {
            GraphKind::Directed => self.src.len(),
            GraphKind::Undirected => self
                .src
                .iter()
                .zip(&self.dst)
                .map(|(u, v)| if u == v { 1 } else { 2 })
                .sum(),
        }
    }

    /// Source column.
    pub fn sources(&self) -> &[VertexId] {
        &self.src
    }

    /// Destination column.
    pub fn destinations(&self) -> &[VertexId] {
        &self.dst
    }

    /// Per-edge weights, if any.
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Returns `true` if the graph carries edge weights.
    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// Renumbering applied at construction, if any.
    pub fn renumber_map(&self) -> Option<&RenumberMap> {
        self.renumber_map.as_ref()
    }

    /// Internal index of a caller label.
    pub fn index_of(&self, label: VertexLabel) -> Option<VertexId> {
        match &self.renumber_map {
            Some(map) => map.index_of(label),
            None => usize::try_from(label).ok().filter(|&v| v < self.vertex_count),
        }
    }
}

fn check_columns(src: usize, dst: usize, weights: Option<usize>) -> Result<()> {
    if src != dst {
        return Err(BetweennessError::InvalidGraph(format!(
            "source column has {src} entries but destination column has {dst}"
        )));
    }
    if let Some(w) = weights.filter(|&w| w != src) {
        return Err(BetweennessError::InvalidGraph(format!(
            "weight column has {w} entries for {src} edges"
        )));
    }
    Ok(())
}
