//! Result reconciliation: unrenumbering and undirected symmetrization.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{BetweennessError, Result};
use crate::graph::{GraphKind, RenumberMap, VertexId, VertexLabel};

/// Raw organizer output: one row per directed edge instance, internal indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFrame {
    /// Source endpoint of each edge instance.
    pub src: Vec<VertexId>,
    /// Destination endpoint of each edge instance.
    pub dst: Vec<VertexId>,
    /// Centrality of each edge instance, widened to `f64`.
    pub betweenness: Vec<f64>,
}

impl ResultFrame {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.src.len()
    }

    /// Returns `true` if the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

/// Final edge betweenness table in caller labels.
///
/// Three parallel columns. Undirected tables hold each edge once with
/// `src <= dst`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    /// Source endpoint label.
    pub src: Vec<VertexLabel>,
    /// Destination endpoint label.
    pub dst: Vec<VertexLabel>,
    /// Edge betweenness.
    pub betweenness: Vec<f64>,
}

impl ResultTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.src.len()
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Centrality of the row `(src, dst)`, if present.
    pub fn get(&self, src: VertexLabel, dst: VertexLabel) -> Option<f64> {
        self.rows().find(|&(s, d, _)| s == src && d == dst).map(|(_, _, b)| b)
    }

    /// Iterates rows as `(src, dst, betweenness)`.
    pub fn rows(&self) -> impl Iterator<Item = (VertexLabel, VertexLabel, f64)> + '_ {
        self.src
            .iter()
            .zip(&self.dst)
            .zip(&self.betweenness)
            .map(|((&s, &d), &b)| (s, d, b))
    }

    /// Sum of all centrality values.
    pub fn total(&self) -> f64 {
        self.betweenness.iter().sum()
    }

    /// Serializes the table as a JSON object of three arrays.
    ///
    /// # Errors
    /// Returns [`BetweennessError::Reconciliation`] if a value cannot be encoded.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BetweennessError::Reconciliation(e.to_string()))
    }

    /// Writes `src,dst,betweenness` CSV with a header line.
    ///
    /// # Errors
    /// Propagates I/O errors from `out`.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "src,dst,betweenness")?;
        for (s, d, b) in self.rows() {
            writeln!(out, "{s},{d},{b}")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Maps both endpoint columns back to caller labels, each independently.
///
/// Without a map, internal indices are the labels.
///
/// # Errors
/// Returns [`BetweennessError::Reconciliation`] if an index has no label.
pub fn unrenumber(frame: ResultFrame, map: Option<&RenumberMap>) -> Result<ResultTable> {
    let (src, dst) = match map {
        Some(map) => (map.unrenumber_column(&frame.src)?, map.unrenumber_column(&frame.dst)?),
        None => (to_labels(&frame.src)?, to_labels(&frame.dst)?),
    };
    Ok(ResultTable {
        src,
        dst,
        betweenness: frame.betweenness,
    })
}

fn to_labels(column: &[VertexId]) -> Result<Vec<VertexLabel>> {
    column
        .iter()
        .map(|&v| {
            VertexLabel::try_from(v)
                .map_err(|_| BetweennessError::Reconciliation(format!("vertex index {v} does not fit a label")))
        })
        .collect()
}

/// Orients every row smaller endpoint first and sums duplicate pairs.
///
/// Output rows are sorted by `(src, dst)`.
pub fn symmetrize(table: ResultTable) -> ResultTable {
    let mut merged: BTreeMap<(VertexLabel, VertexLabel), f64> = BTreeMap::new();
    for (s, d, b) in table.rows() {
        let key = if s >= d { (d, s) } else { (s, d) };
        *merged.entry(key).or_insert(0.0) += b;
    }

    let mut out = ResultTable {
        src: Vec::with_capacity(merged.len()),
        dst: Vec::with_capacity(merged.len()),
        betweenness: Vec::with_capacity(merged.len()),
    };
    for ((s, d), b) in merged {
        out.src.push(s);
        out.dst.push(d);
        out.betweenness.push(b);
    }
    out
}

/// Unrenumbers `frame` and, for undirected graphs, symmetrizes it.
///
/// Directed frames keep their row order.
///
/// # Errors
/// Returns [`BetweennessError::Reconciliation`] if the frame's columns differ
/// in length or an index cannot be mapped back.
pub fn reconcile(frame: ResultFrame, map: Option<&RenumberMap>, kind: GraphKind) -> Result<ResultTable> {
    if frame.dst.len() != frame.len() || frame.betweenness.len() != frame.len() {
        return Err(BetweennessError::Reconciliation(format!(
            "ragged result frame: {} sources, {} destinations, {} values",
            frame.len(),
            frame.dst.len(),
            frame.betweenness.len()
        )));
    }
    let rows = frame.len();
    let table = unrenumber(frame, map)?;
    let table = match kind {
        GraphKind::Directed => table,
        GraphKind::Undirected => symmetrize(table),
    };
    tracing::debug!(rows_in = rows, rows_out = table.len(), ?kind, "result reconciled");
    Ok(table)
}
