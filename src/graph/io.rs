//! Edge list loading.
//!
//! Two formats are understood, selected by file extension:
//! - `.mtx`: Matrix Market coordinate format (1-based indices)
//! - `.csv`: delimited `src dst [weight]` rows (space or tab)

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BetweennessError, Result};
use crate::graph::{Graph, GraphKind, VertexLabel};

/// Column delimiter of a `.csv` edge list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// A single space (runs of spaces are tolerated).
    #[default]
    Space,
    /// A tab character.
    Tab,
}

impl Delimiter {
    fn as_char(self) -> char {
        match self {
            Self::Space => ' ',
            Self::Tab => '\t',
        }
    }
}

/// Edge columns as read from a file, before graph construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList {
    /// Source labels.
    pub src: Vec<VertexLabel>,
    /// Destination labels.
    pub dst: Vec<VertexLabel>,
    /// Edge weights, when the file carries them.
    pub weights: Option<Vec<f64>>,
    /// `true` if the file declares a symmetric matrix.
    pub symmetric: bool,
}

impl EdgeList {
    /// Number of edges read.
    pub fn len(&self) -> usize {
        self.src.len()
    }

    /// Returns `true` if no edges were read.
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Builds a renumbered graph from these columns.
    ///
    /// # Errors
    /// Propagates [`Graph::from_edge_list`] validation errors.
    pub fn into_graph(self, kind: GraphKind) -> Result<Graph> {
        Graph::from_edge_list(&self.src, &self.dst, self.weights.as_deref(), kind)
    }
}

/// Loads an edge list, dispatching on the file extension.
///
/// # Errors
/// Returns [`BetweennessError::Io`] if the file cannot be read and
/// [`BetweennessError::Parse`] if it is malformed or has an unknown extension.
pub fn load_edge_list(path: impl AsRef<Path>, delimiter: Delimiter) -> Result<EdgeList> {
    let path = path.as_ref();
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match extension {
        "mtx" => read_matrix_market(BufReader::new(File::open(path)?)),
        "csv" => read_delimited(BufReader::new(File::open(path)?), delimiter),
        other => Err(BetweennessError::Parse {
            line: 0,
            message: format!(
                "bad file type `{other}` for {}: must have a .csv or .mtx extension",
                path.display()
            ),
        }),
    }
}

/// Reads a Matrix Market coordinate file.
///
/// # Errors
/// Returns [`BetweennessError::Parse`] on a missing banner, a non-coordinate
/// matrix, or malformed entries.
pub fn read_matrix_market(reader: impl BufRead) -> Result<EdgeList> {
    let mut lines = reader.lines().enumerate();

    let (_, banner) = lines.next().ok_or_else(|| parse_error(1, "empty file"))?;
    let banner = banner?.to_ascii_lowercase();
    let fields: Vec<&str> = banner.split_whitespace().collect();
    if fields.len() < 5 || fields[0] != "%%matrixmarket" || fields[1] != "matrix" {
        return Err(parse_error(1, "missing %%MatrixMarket matrix banner"));
    }
    if fields[2] != "coordinate" {
        return Err(parse_error(1, "only coordinate matrices describe graphs"));
    }
    let pattern = fields[3] == "pattern";
    let symmetric = fields[4] == "symmetric";

    let mut declared = None;
    let mut out = EdgeList {
        weights: (!pattern).then(Vec::new),
        symmetric,
        ..EdgeList::default()
    };

    for (i, line) in lines {
        let line_no = i + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let cols: Vec<&str> = trimmed.split_whitespace().collect();
        if declared.is_none() {
            if cols.len() != 3 {
                return Err(parse_error(line_no, "size line must be `rows cols entries`"));
            }
            declared = Some(parse_field::<usize>(cols[2], line_no)?);
            continue;
        }
        if cols.len() < 2 {
            return Err(parse_error(line_no, "entry needs a row and a column"));
        }
        out.src.push(parse_field::<VertexLabel>(cols[0], line_no)? - 1);
        out.dst.push(parse_field::<VertexLabel>(cols[1], line_no)? - 1);
        if let Some(weights) = out.weights.as_mut() {
            let value = cols.get(2).ok_or_else(|| parse_error(line_no, "missing entry value"))?;
            weights.push(parse_field::<f64>(value, line_no)?);
        }
    }

    match declared {
        Some(n) if n == out.len() => Ok(out),
        Some(n) => Err(parse_error(0, &format!("size line declares {n} entries, found {}", out.len()))),
        None => Err(parse_error(0, "missing size line")),
    }
}

/// Reads delimited `src dst [weight]` rows.
///
/// Rows carrying a third column make the whole list weighted; mixing two-
/// and three-column rows is rejected.
///
/// # Errors
/// Returns [`BetweennessError::Parse`] on malformed rows.
pub fn read_delimited(reader: impl BufRead, delimiter: Delimiter) -> Result<EdgeList> {
    let sep = delimiter.as_char();
    let mut out = EdgeList::default();
    let mut width = None;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split(sep).map(str::trim).filter(|c| !c.is_empty()).collect();
        if !(2..=3).contains(&cols.len()) {
            return Err(parse_error(line_no, "expected `src dst [weight]`"));
        }
        match width {
            None => {
                width = Some(cols.len());
                if cols.len() == 3 {
                    out.weights = Some(Vec::new());
                }
            }
            Some(w) if w != cols.len() => return Err(parse_error(line_no, "inconsistent column count")),
            Some(_) => {}
        }
        out.src.push(parse_field(cols[0], line_no)?);
        out.dst.push(parse_field(cols[1], line_no)?);
        if let Some(weights) = out.weights.as_mut() {
            weights.push(parse_field(cols[2], line_no)?);
        }
    }
    Ok(out)
}

fn parse_field<T: core::str::FromStr>(raw: &str, line: usize) -> Result<T> {
    raw.parse()
        .map_err(|_| parse_error(line, &format!("cannot parse `{raw}`")))
}

fn parse_error(line: usize, message: &str) -> BetweennessError {
    BetweennessError::Parse {
        line,
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_weighted_matrix_market() {
        let text = "%%MatrixMarket matrix coordinate real symmetric\n\
                    % comment\n\
                    4 4 3\n\
                    1 2 1.5\n\
                    2 3 2.0\n\
                    3 4 0.5\n";
        let edges = read_matrix_market(text.as_bytes()).unwrap();
        assert!(edges.symmetric);
        assert_eq!(edges.src, vec![0, 1, 2]);
        assert_eq!(edges.dst, vec![1, 2, 3]);
        assert_eq!(edges.weights, Some(vec![1.5, 2.0, 0.5]));
    }

    #[test]
    fn pattern_matrix_is_unweighted() {
        let text = "%%MatrixMarket matrix coordinate pattern general\n2 2 1\n1 2\n";
        let edges = read_matrix_market(text.as_bytes()).unwrap();
        assert!(!edges.symmetric);
        assert_eq!(edges.weights, None);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn matrix_market_entry_count_is_checked() {
        let text = "%%MatrixMarket matrix coordinate pattern general\n2 2 2\n1 2\n";
        assert!(matches!(
            read_matrix_market(text.as_bytes()),
            Err(BetweennessError::Parse { .. })
        ));
        assert!(read_matrix_market("not a banner\n".as_bytes()).is_err());
    }

    #[test]
    fn reads_space_and_tab_rows() {
        let spaced = read_delimited("0 1\n1  2\n\n".as_bytes(), Delimiter::Space).unwrap();
        assert_eq!(spaced.src, vec![0, 1]);
        assert_eq!(spaced.dst, vec![1, 2]);
        assert!(spaced.weights.is_none());

        let tabbed = read_delimited("5\t6\t0.25\n".as_bytes(), Delimiter::Tab).unwrap();
        assert_eq!(tabbed.weights, Some(vec![0.25]));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = read_delimited("0 1\n1 2 3.0\n".as_bytes(), Delimiter::Space).unwrap_err();
        assert!(matches!(err, BetweennessError::Parse { line: 2, .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_edge_list("graph.txt", Delimiter::Space).unwrap_err();
        assert!(matches!(err, BetweennessError::Parse { line: 0, .. }));
    }
}
