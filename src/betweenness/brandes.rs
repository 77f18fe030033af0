//! Edge betweenness via Brandes' dependency accumulation.
//!
//! Per source: BFS (unweighted) or Dijkstra (weighted) counts shortest paths,
//! then dependencies are pushed back along predecessor edges. The contribution
//! of edge instance `v -> w` for source `s` is `sigma(s,v) / sigma(s,w) * (1 + delta(w))`.
//!
//! Across ranks: the organizer broadcasts a host snapshot of its view, each rank
//! accumulates its own batch into a private scratch buffer, and `reduce_sum`
//! folds every scratch buffer onto the organizer, which scales once and writes
//! its output.

use core::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::betweenness::coordinator::WorkerRole;
use crate::betweenness::kernel::{CentralityKernel, KernelCall, KernelTarget};
use crate::device::DeviceBuffer;
use crate::error::KernelError;
use crate::graph::{GraphKind, GraphView, VertexId, ViewSnapshot};
use crate::precision::CentralityScalar;
use crate::runtime::DeviceHandle;

const ROOT: usize = WorkerRole::ORGANIZER_INDEX;
const UNSEEN: usize = usize::MAX;
/// Sources per rayon task; fixed so that the summation tree is reproducible.
#[cfg(feature = "parallel")]
const SOURCE_CHUNK: usize = 32;

/// The in-process reference kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrandesKernel;

impl CentralityKernel for BrandesKernel {
    fn edge_betweenness<T: CentralityScalar>(
        &self,
        handle: &DeviceHandle,
        call: KernelCall<'_, T>,
    ) -> Result<(), KernelError> {
        let comm = handle.comm();
        let rank = handle.rank();
        let batch = call.local_batch.as_slice();

        match call.target {
            KernelTarget::Organizer { view, weights, output } => {
                if comm.size() > 1 {
                    // peers see exactly the weights this call runs with
                    let mut shared = view.snapshot();
                    shared.weights = weights.map(DeviceBuffer::to_host);
                    comm.broadcast(rank, ROOT, Some(shared))?;
                }
                let local = accumulate(handle, view, weights.map(DeviceBuffer::as_slice), batch)?;
                let mut folded = comm
                    .reduce_sum(rank, ROOT, local)?
                    .ok_or_else(|| KernelError::Internal("organizer received no reduction".to_owned()))?;
                rescale(
                    &mut folded,
                    view.vertex_count(),
                    view.kind(),
                    call.normalized,
                    call.total_source_count,
                );
                output.as_mut_slice().copy_from_slice(&folded);
                Ok(())
            }
            KernelTarget::Regular => {
                let shared: ViewSnapshot<T> = comm.broadcast(rank, ROOT, None)?;
                let view = GraphView::upload(handle.device(), shared)?;
                let weights = view.weights().map(DeviceBuffer::as_slice);
                let local = accumulate(handle, &view, weights, batch)?;
                comm.reduce_sum(rank, ROOT, local)?;
                Ok(())
            }
        }
    }
}

/// Sums the unscaled contributions of every source in `batch`.
fn accumulate<T: CentralityScalar>(
    handle: &DeviceHandle,
    view: &GraphView<T>,
    weights: Option<&[T]>,
    batch: &[VertexId],
) -> Result<Vec<T>, KernelError> {
    let n = view.vertex_count();
    if let Some(&vertex) = batch.iter().find(|&&s| s >= n) {
        return Err(KernelError::SourceOutOfRange { vertex, vertex_count: n });
    }

    let m = view.directed_edge_count();
    let mut scratch = handle.device().alloc_zeroed::<T>(m)?;

    #[cfg(not(feature = "parallel"))]
    {
        let mut ws = Workspace::new(n);
        for &s in batch {
            ws.single_source(view, weights, s, scratch.as_mut_slice());
        }
    }

    #[cfg(feature = "parallel")]
    {
        // Chunk partials are folded in batch order, so the sum does not depend on scheduling.
        let acc = scratch.as_mut_slice();
        for wave in batch.chunks(SOURCE_CHUNK * rayon::current_num_threads()) {
            let partials: Vec<Vec<T>> = wave
                .par_chunks(SOURCE_CHUNK)
                .map(|chunk| {
                    let mut ws = Workspace::new(n);
                    let mut part = vec![T::zero(); m];
                    for &s in chunk {
                        ws.single_source(view, weights, s, &mut part);
                    }
                    part
                })
                .collect();
            for part in &partials {
                for (x, y) in acc.iter_mut().zip(part) {
                    *x = *x + *y;
                }
            }
        }
    }

    Ok(scratch.to_host())
}

/// Applies the global scale factor in place.
///
/// Normalized: `1 / (n (n - 1))`. Unnormalized undirected: `1/2` (each pair is
/// seen from both endpoints). When only `k < n` sources were used, the scale is
/// extrapolated by `n / k`.
pub(crate) fn rescale<T: CentralityScalar>(
    values: &mut [T],
    vertex_count: usize,
    kind: GraphKind,
    normalized: bool,
    total_source_count: usize,
) {
    let n = T::from_count(vertex_count);
    let scale = if normalized {
        (vertex_count > 1).then(|| T::one() / (n * (n - T::one())))
    } else if kind.is_directed() {
        None
    } else {
        Some(T::from_count(1) / T::from_count(2))
    };
    let Some(mut scale) = scale else { return };
    if total_source_count > 0 && total_source_count < vertex_count {
        scale = scale * n / T::from_count(total_source_count);
    }
    for v in values {
        *v = *v * scale;
    }
}

/// Per-source scratch state, reused across sources.
struct Workspace<T> {
    sigma: Vec<T>,
    delta: Vec<T>,
    hops: Vec<usize>,
    dist: Vec<T>,
    settled: Vec<bool>,
    preds: Vec<Vec<(VertexId, usize)>>,
    order: Vec<VertexId>,
    queue: VecDeque<VertexId>,
    heap: BinaryHeap<HeapEntry<T>>,
}

impl<T: CentralityScalar> Workspace<T> {
    fn new(n: usize) -> Self {
        Self {
            sigma: vec![T::zero(); n],
            delta: vec![T::zero(); n],
            hops: vec![UNSEEN; n],
            dist: vec![T::infinity(); n],
            settled: vec![false; n],
            preds: vec![Vec::new(); n],
            order: Vec::with_capacity(n),
            queue: VecDeque::new(),
            heap: BinaryHeap::new(),
        }
    }

    fn reset(&mut self) {
        // Only vertices reached by the previous source carry state.
        for &v in &self.order {
            self.sigma[v] = T::zero();
            self.delta[v] = T::zero();
            self.hops[v] = UNSEEN;
            self.dist[v] = T::infinity();
            self.settled[v] = false;
            self.preds[v].clear();
        }
        self.order.clear();
        self.queue.clear();
        self.heap.clear();
    }

    fn single_source(&mut self, view: &GraphView<T>, weights: Option<&[T]>, s: VertexId, acc: &mut [T]) {
        match weights {
            Some(w) => self.dijkstra(view, w, s),
            None => self.bfs(view, s),
        }

        // non-increasing distance from `s`
        for idx in (0..self.order.len()).rev() {
            let w = self.order[idx];
            let coeff = (T::one() + self.delta[w]) / self.sigma[w];
            for i in 0..self.preds[w].len() {
                let (v, pos) = self.preds[w][i];
                let c = self.sigma[v] * coeff;
                acc[pos] = acc[pos] + c;
                self.delta[v] = self.delta[v] + c;
            }
        }
        self.reset();
    }

    fn bfs(&mut self, view: &GraphView<T>, s: VertexId) {
        self.sigma[s] = T::one();
        self.hops[s] = 0;
        self.queue.push_back(s);

        while let Some(v) = self.queue.pop_front() {
            self.order.push(v);
            let next = self.hops[v] + 1;
            for (pos, w) in view.out_edges(v) {
                if self.hops[w] == UNSEEN {
                    self.hops[w] = next;
                    self.queue.push_back(w);
                }
                if self.hops[w] == next {
                    self.sigma[w] = self.sigma[w] + self.sigma[v];
                    self.preds[w].push((v, pos));
                }
            }
        }
    }

    fn dijkstra(&mut self, view: &GraphView<T>, weights: &[T], s: VertexId) {
        let mut seq = 0usize;
        self.sigma[s] = T::one();
        self.dist[s] = T::zero();
        self.heap.push(HeapEntry {
            dist: T::zero(),
            seq,
            vertex: s,
            pred: None,
        });

        while let Some(entry) = self.heap.pop() {
            let v = entry.vertex;
            if self.settled[v] {
                continue;
            }
            self.settled[v] = true;
            if let Some(p) = entry.pred {
                self.sigma[v] = self.sigma[v] + self.sigma[p];
            }
            self.order.push(v);

            for (pos, w) in view.out_edges(v) {
                if self.settled[w] {
                    continue;
                }
                let alt = entry.dist + weights[pos];
                if alt < self.dist[w] {
                    self.dist[w] = alt;
                    self.sigma[w] = T::zero();
                    self.preds[w].clear();
                    self.preds[w].push((v, pos));
                    seq += 1;
                    self.heap.push(HeapEntry {
                        dist: alt,
                        seq,
                        vertex: w,
                        pred: Some(v),
                    });
                } else if alt == self.dist[w] {
                    self.sigma[w] = self.sigma[w] + self.sigma[v];
                    self.preds[w].push((v, pos));
                }
            }
        }
    }
}

/// Min-heap entry keyed by tentative distance, ties broken by insertion order.
struct HeapEntry<T> {
    dist: T,
    seq: usize,
    vertex: VertexId,
    pred: Option<VertexId>,
}

impl<T: CentralityScalar> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T: CentralityScalar> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: CentralityScalar> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: CentralityScalar> Eq for HeapEntry<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betweenness::kernel::invoke;
    use crate::device::Device;
    use crate::graph::Graph;

    fn run<T: CentralityScalar>(graph: &Graph, weighted: bool, normalized: bool, sources: &[VertexId]) -> Vec<(usize, usize, f64)> {
        let handle = DeviceHandle::solo(Device::new(0));
        let view = GraphView::<T>::build(handle.device(), graph).unwrap();
        let mut out = handle.device().alloc_zeroed::<T>(view.directed_edge_count()).unwrap();
        let weights = if weighted { view.weights() } else { None };
        invoke(&BrandesKernel, &handle, Some(&view), Some(&mut out), normalized, weights, sources, sources.len()).unwrap();
        view.edge_sources()
            .into_iter()
            .zip(view.indices().iter().copied())
            .zip(out.as_slice().iter().map(|x| x.widen()))
            .map(|((u, v), b)| (u, v, b))
            .collect()
    }

    fn value(rows: &[(usize, usize, f64)], u: usize, v: usize) -> f64 {
        rows.iter().find(|r| r.0 == u && r.1 == v).map(|r| r.2).unwrap()
    }

    #[test]
    fn directed_path_counts_pairs_through_each_edge() {
        // 0 -> 1 -> 2 -> 3
        let g = Graph::from_indices(4, vec![0, 1, 2], vec![1, 2, 3], None, GraphKind::Directed).unwrap();
        let rows = run::<f64>(&g, false, false, &[0, 1, 2, 3]);
        assert_eq!(value(&rows, 0, 1), 3.0);
        assert_eq!(value(&rows, 1, 2), 4.0);
        assert_eq!(value(&rows, 2, 3), 3.0);
    }

    #[test]
    fn undirected_orientations_sum_to_pair_counts() {
        let g = Graph::from_indices(4, vec![0, 1, 2], vec![1, 2, 3], None, GraphKind::Undirected).unwrap();
        let rows = run::<f64>(&g, false, false, &[0, 1, 2, 3]);
        assert_eq!(rows.len(), 6);
        assert_eq!(value(&rows, 0, 1) + value(&rows, 1, 0), 3.0);
        assert_eq!(value(&rows, 1, 2) + value(&rows, 2, 1), 4.0);
        assert_eq!(value(&rows, 2, 3) + value(&rows, 3, 2), 3.0);
    }

    #[test]
    fn diamond_splits_flow_between_equal_paths() {
        // 0 -> {1, 2} -> 3
        let g = Graph::from_indices(4, vec![0, 0, 1, 2], vec![1, 2, 3, 3], None, GraphKind::Directed).unwrap();
        let rows = run::<f32>(&g, false, false, &[0, 1, 2, 3]);
        // pair (0,1) and half of (0,3)
        assert!((value(&rows, 0, 1) - 1.5).abs() < 1e-6);
        assert!((value(&rows, 1, 3) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn weights_reroute_shortest_paths() {
        // 0 -> 1 -> 2 is cheaper than the direct 0 -> 2
        let g = Graph::from_indices(
            3,
            vec![0, 1, 0],
            vec![1, 2, 2],
            Some(vec![1.0, 1.0, 5.0]),
            GraphKind::Directed,
        )
        .unwrap();
        let unweighted = run::<f64>(&g, false, false, &[0, 1, 2]);
        assert_eq!(value(&unweighted, 0, 2), 1.0);
        assert_eq!(value(&unweighted, 0, 1), 1.0);

        let weighted = run::<f64>(&g, true, false, &[0, 1, 2]);
        assert_eq!(value(&weighted, 0, 2), 0.0);
        assert_eq!(value(&weighted, 0, 1), 2.0);
        assert_eq!(value(&weighted, 1, 2), 2.0);
    }

    #[test]
    fn weighted_ties_count_every_path() {
        // two routes of cost 2 from 0 to 3
        let g = Graph::from_indices(
            4,
            vec![0, 0, 1, 2],
            vec![1, 2, 3, 3],
            Some(vec![1.0, 1.5, 1.0, 0.5]),
            GraphKind::Directed,
        )
        .unwrap();
        let rows = run::<f64>(&g, true, false, &[0]);
        assert_eq!(value(&rows, 0, 1), 1.5);
        assert_eq!(value(&rows, 0, 2), 1.5);
        assert_eq!(value(&rows, 1, 3), 0.5);
        assert_eq!(value(&rows, 2, 3), 0.5);
    }

    #[test]
    fn accumulation_is_bitwise_repeatable() {
        let n = 60;
        let src: Vec<usize> = (0..n).flat_map(|v| [v, v]).collect();
        let dst: Vec<usize> = (0..n).flat_map(|v| [(v * 7 + 3) % n, (v * 13 + 5) % n]).collect();
        let weights: Vec<f64> = (0..src.len()).map(|i| 0.1 + (i % 9) as f64 * 0.37).collect();
        let g = Graph::from_indices(n, src, dst, Some(weights), GraphKind::Undirected).unwrap();

        let handle = DeviceHandle::solo(Device::new(0));
        let view = GraphView::<f64>::build(handle.device(), &g).unwrap();
        let sources: Vec<usize> = (0..n).collect();
        let first = accumulate(&handle, &view, view.weights().map(DeviceBuffer::as_slice), &sources).unwrap();
        for _ in 0..8 {
            let again = accumulate(&handle, &view, view.weights().map(DeviceBuffer::as_slice), &sources).unwrap();
            assert!(first.iter().zip(&again).all(|(a, b)| a.to_bits() == b.to_bits()));
        }
    }

    #[test]
    fn rescale_conventions() {
        let mut v = vec![12.0f64];
        rescale(&mut v, 4, GraphKind::Directed, true, 4);
        assert_eq!(v, vec![1.0]);

        let mut v = vec![3.0f64];
        rescale(&mut v, 4, GraphKind::Undirected, false, 4);
        assert_eq!(v, vec![1.5]);

        let mut v = vec![3.0f64];
        rescale(&mut v, 4, GraphKind::Directed, false, 2);
        assert_eq!(v, vec![3.0]);

        // sampled sources extrapolate by n / k
        let mut v = vec![6.0f64];
        rescale(&mut v, 4, GraphKind::Directed, true, 2);
        assert_eq!(v, vec![1.0]);

        let mut v = vec![5.0f64];
        rescale(&mut v, 1, GraphKind::Directed, true, 1);
        assert_eq!(v, vec![5.0]);
    }

    #[test]
    fn out_of_range_source_fails_and_releases_scratch() {
        let g = Graph::from_indices(2, vec![0], vec![1], None, GraphKind::Directed).unwrap();
        let handle = DeviceHandle::solo(Device::new(0));
        let view = GraphView::<f64>::build(handle.device(), &g).unwrap();
        let mut out = handle.device().alloc_zeroed::<f64>(1).unwrap();
        let live_before = handle.device().live_allocations();
        let err = invoke(&BrandesKernel, &handle, Some(&view), Some(&mut out), false, None, &[5], 1).unwrap_err();
        assert_eq!(err, KernelError::SourceOutOfRange { vertex: 5, vertex_count: 2 });
        assert_eq!(handle.device().live_allocations(), live_before);
    }

    #[test]
    fn invoke_checks_buffer_shapes() {
        let g = Graph::from_indices(2, vec![0], vec![1], None, GraphKind::Undirected).unwrap();
        let handle = DeviceHandle::solo(Device::new(0));
        let view = GraphView::<f64>::build(handle.device(), &g).unwrap();
        let mut short = handle.device().alloc_zeroed::<f64>(1).unwrap();
        assert_eq!(
            invoke(&BrandesKernel, &handle, Some(&view), Some(&mut short), false, None, &[0], 1),
            Err(KernelError::OutputSizeMismatch { expected: 2, actual: 1 })
        );
        assert_eq!(
            invoke::<_, f64>(&BrandesKernel, &handle, None, None, false, None, &[0], 1),
            Err(KernelError::MissingView)
        );
    }
}
