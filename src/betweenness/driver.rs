//! Session driver: strategy selection, task fan-out, organizer result pick-up.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::betweenness::brandes::BrandesKernel;
use crate::betweenness::coordinator::{organizer_run, run_worker, TaskInput, WorkRequest, WorkerRole};
use crate::betweenness::kernel::CentralityKernel;
use crate::betweenness::reconcile::{reconcile, ResultFrame, ResultTable};
use crate::betweenness::sampling::{all_sources, sample_sources};
use crate::device::Device;
use crate::error::{BetweennessError, Result};
use crate::graph::{Graph, VertexId, VertexLabel};
use crate::precision::{CentralityScalar, Precision};
use crate::runtime::{get_active_session, worker_state, Client, DeviceHandle, Session, SessionId};
use crate::with_precision;

/// Options of one edge betweenness computation.
///
/// Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetweennessConfig {
    /// Normalize by `1 / (n (n - 1))`. Default `true`.
    pub normalized: bool,
    /// Use edge weights as path lengths. Default `false`.
    pub weighted: bool,
    /// Precision of the view and output buffers. Default `float64`.
    pub precision: Precision,
    /// Number of randomly sampled sources; all vertices when `None`.
    pub k: Option<usize>,
    /// Seed for source sampling.
    pub seed: Option<u64>,
}

impl Default for BetweennessConfig {
    fn default() -> Self {
        Self {
            normalized: true,
            weighted: false,
            precision: Precision::F64,
            k: None,
            seed: None,
        }
    }
}

impl BetweennessConfig {
    /// Parses a JSON configuration.
    ///
    /// # Errors
    /// - [`BetweennessError::UnsupportedPrecision`] if `precision` names neither supported width
    /// - [`BetweennessError::Parse`] for malformed JSON or mistyped fields
    pub fn from_json(text: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(text).map_err(json_error)?;
        // precision goes through `FromStr` so a bad value keeps its own error kind
        let precision = match value.as_object_mut().and_then(|o| o.remove("precision")) {
            Some(serde_json::Value::String(name)) => Some(name.parse::<Precision>()?),
            Some(other) => {
                return Err(BetweennessError::UnsupportedPrecision {
                    requested: other.to_string(),
                })
            }
            None => None,
        };
        let mut config: Self = serde_json::from_value(value).map_err(json_error)?;
        if let Some(precision) = precision {
            config.precision = precision;
        }
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    /// I/O errors, plus everything [`BetweennessConfig::from_json`] reports.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

fn json_error(err: serde_json::Error) -> BetweennessError {
    BetweennessError::Parse {
        line: err.line(),
        message: err.to_string(),
    }
}

/// How a computation is executed, chosen once per call.
#[derive(Debug)]
pub enum ExecutionStrategy {
    /// The organizer path runs in-process with every source in one batch.
    SingleProcess,
    /// One coordination task per worker of the leased session.
    Distributed(Session),
}

impl ExecutionStrategy {
    /// Distributed when the client has a session with at least two workers.
    ///
    /// A single-worker lease is released immediately.
    pub fn select(client: &Client) -> Self {
        match get_active_session(client) {
            Some(session) if session.worker_count() >= 2 => Self::Distributed(session),
            _ => Self::SingleProcess,
        }
    }

    /// Returns `true` for [`ExecutionStrategy::Distributed`].
    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Distributed(_))
    }
}

/// One worker's task: its session and its role input.
#[derive(Debug, Clone, Copy)]
struct CoordinationTask<'g> {
    session_id: SessionId,
    input: TaskInput<'g>,
}

/// Edge betweenness centrality over a [`Client`]'s runtime.
///
/// ```
/// use edgebc::{BetweennessConfig, Client, EdgeBetweenness, Graph, GraphKind};
///
/// let graph = Graph::from_edge_list(&[0, 1, 2], &[1, 2, 3], None, GraphKind::Undirected)?;
/// let config = BetweennessConfig { normalized: false, ..Default::default() };
/// let table = EdgeBetweenness::new(config).run(&Client::local(), &graph, None)?;
/// assert_eq!(table.get(1, 2), Some(4.0));
/// # Ok::<(), edgebc::BetweennessError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct EdgeBetweenness<K = BrandesKernel> {
    kernel: K,
    config: BetweennessConfig,
}

impl EdgeBetweenness<BrandesKernel> {
    /// Uses the built-in kernel.
    pub fn new(config: BetweennessConfig) -> Self {
        Self::with_kernel(BrandesKernel, config)
    }
}

impl<K: CentralityKernel> EdgeBetweenness<K> {
    /// Uses `kernel` for the per-rank computation.
    pub fn with_kernel(kernel: K, config: BetweennessConfig) -> Self {
        Self { kernel, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &BetweennessConfig {
        &self.config
    }

    /// Computes the reconciled edge betweenness table of `graph`.
    ///
    /// `sources` are caller labels; when `None`, `config.k` sampled vertices
    /// or every vertex are used.
    ///
    /// # Errors
    /// - [`BetweennessError::UnknownSource`] / [`BetweennessError::MissingWeights`] before any device work
    /// - the first root-cause failure of any worker; the session is released either way
    pub fn run(&self, client: &Client, graph: &Graph, sources: Option<&[VertexLabel]>) -> Result<ResultTable> {
        let started = Instant::now();
        if self.config.weighted && !graph.is_weighted() {
            return Err(BetweennessError::MissingWeights);
        }
        let sources = self.resolve_sources(graph, sources)?;
        let request = WorkRequest {
            normalized: self.config.normalized,
            weighted: self.config.weighted,
            sources: &sources,
        };

        let strategy = ExecutionStrategy::select(client);
        tracing::info!(
            distributed = strategy.is_distributed(),
            precision = %self.config.precision,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            sources = sources.len(),
            "edge betweenness started"
        );

        let frame = with_precision!(self.config.precision, T => self.execute::<T>(strategy, client, graph, &request))?;
        let table = reconcile(frame, graph.renumber_map(), graph.kind())?;

        tracing::info!(rows = table.len(), elapsed = ?started.elapsed(), "edge betweenness finished");
        Ok(table)
    }

    fn resolve_sources(&self, graph: &Graph, sources: Option<&[VertexLabel]>) -> Result<Vec<VertexId>> {
        match (sources, self.config.k) {
            (Some(labels), _) => labels
                .iter()
                .map(|&label| graph.index_of(label).ok_or(BetweennessError::UnknownSource { vertex: label }))
                .collect(),
            (None, Some(k)) => Ok(sample_sources(graph.vertex_count(), k, self.config.seed)),
            (None, None) => Ok(all_sources(graph.vertex_count())),
        }
    }

    fn execute<T: CentralityScalar>(
        &self,
        strategy: ExecutionStrategy,
        client: &Client,
        graph: &Graph,
        request: &WorkRequest<'_>,
    ) -> Result<ResultFrame> {
        match strategy {
            ExecutionStrategy::SingleProcess => {
                let device = client
                    .cluster()
                    .map_or_else(|| Device::new(0), |cluster| cluster.device(0).clone());
                organizer_run::<K, T>(&self.kernel, &DeviceHandle::solo(device), graph, request)
            }
            ExecutionStrategy::Distributed(session) => self.distributed::<T>(&session, graph, request),
        }
    }

    fn distributed<T: CentralityScalar>(
        &self,
        session: &Session,
        graph: &Graph,
        request: &WorkRequest<'_>,
    ) -> Result<ResultFrame> {
        let session_id = session.session_id();
        let tasks: Vec<CoordinationTask<'_>> = (0..session.worker_count())
            .map(|index| CoordinationTask {
                session_id,
                input: match WorkerRole::for_worker(index) {
                    WorkerRole::Organizer => TaskInput::Graph(graph),
                    WorkerRole::Regular => TaskInput::WorkerIndex(index),
                },
            })
            .collect();
        tracing::debug!(session = %session_id, workers = session.worker_count(), "submitting coordination tasks");

        let outcomes = session.submit_all(tasks, |task| {
            let state = worker_state(task.session_id)?;
            run_worker::<K, T>(&self.kernel, &state, task.input, request)
        });

        let mut organizer = None;
        let mut failures = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(Ok(frame)) if index == WorkerRole::ORGANIZER_INDEX => organizer = frame,
                Ok(Ok(_)) => {}
                Ok(Err(err)) => failures.push(err),
                Err(_) => failures.push(BetweennessError::Coordination(format!("worker {index} panicked"))),
            }
        }
        if let Some(err) = root_cause(failures) {
            return Err(err);
        }
        organizer.ok_or_else(|| BetweennessError::Coordination("organizer returned no result frame".to_owned()))
    }
}

/// The first failure that is not merely a reaction to a peer's abort.
fn root_cause(failures: Vec<BetweennessError>) -> Option<BetweennessError> {
    let position = failures.iter().position(|err| !err.is_abort_cascade()).unwrap_or(0);
    failures.into_iter().nth(position)
}

/// Computes edge betweenness of `graph` with the built-in kernel.
///
/// # Errors
/// See [`EdgeBetweenness::run`].
pub fn edge_betweenness_centrality(
    client: &Client,
    graph: &Graph,
    config: &BetweennessConfig,
    sources: Option<&[VertexLabel]>,
) -> Result<ResultTable> {
    EdgeBetweenness::new(config.clone()).run(client, graph, sources)
}
