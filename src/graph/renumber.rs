//! Bijection between caller vertex labels and compact internal indices.

use std::collections::HashMap;

use crate::error::{BetweennessError, Result};
use crate::graph::{VertexId, VertexLabel};

/// Maps original vertex labels onto `0..n` and back.
///
/// Indices are assigned in ascending label order, so the mapping depends only
/// on the label set and not on edge order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenumberMap {
    labels: Vec<VertexLabel>,
    index: HashMap<VertexLabel, VertexId>,
}

impl RenumberMap {
    /// Builds the map from every label occurring in the given columns.
    pub fn from_columns(src: &[VertexLabel], dst: &[VertexLabel]) -> Self {
        let mut labels: Vec<VertexLabel> = src.iter().chain(dst).copied().collect();
        labels.sort_unstable();
        labels.dedup();
        let index = labels.iter().enumerate().map(|(i, &label)| (label, i)).collect();
        Self { labels, index }
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if no labels are mapped.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Internal index of `label`.
    pub fn index_of(&self, label: VertexLabel) -> Option<VertexId> {
        self.index.get(&label).copied()
    }

    /// Original label of internal index `v`.
    pub fn label_of(&self, v: VertexId) -> Option<VertexLabel> {
        self.labels.get(v).copied()
    }

    /// Maps a column of labels to internal indices.
    ///
    /// # Errors
    /// Returns [`BetweennessError::InvalidGraph`] if a label is not mapped.
    pub fn renumber_column(&self, column: &[VertexLabel]) -> Result<Vec<VertexId>> {
        column
            .iter()
            .map(|&label| {
                self.index_of(label)
                    .ok_or_else(|| BetweennessError::InvalidGraph(format!("vertex {label} is not renumbered")))
            })
            .collect()
    }

    /// Maps a column of internal indices back to original labels.
    ///
    /// # Errors
    /// Returns [`BetweennessError::Reconciliation`] if an index has no label.
    pub fn unrenumber_column(&self, column: &[VertexId]) -> Result<Vec<VertexLabel>> {
        column
            .iter()
            .map(|&v| {
                self.label_of(v).ok_or_else(|| {
                    BetweennessError::Reconciliation(format!(
                        "internal vertex {v} is outside the renumbering map of {} labels",
                        self.len()
                    ))
                })
            })
            .collect()
    }
}
