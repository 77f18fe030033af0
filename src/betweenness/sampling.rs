//! Source-vertex selection.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::graph::VertexId;

/// Picks `min(k, vertex_count)` distinct vertices uniformly at random, sorted.
///
/// A given `seed` makes the choice reproducible; without one the generator is
/// seeded from OS entropy.
pub fn sample_sources(vertex_count: usize, k: usize, seed: Option<u64>) -> Vec<VertexId> {
    let amount = k.min(vertex_count);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut picked = index::sample(&mut rng, vertex_count, amount).into_vec();
    picked.sort_unstable();
    picked
}

/// Every vertex, in index order.
pub fn all_sources(vertex_count: usize) -> Vec<VertexId> {
    (0..vertex_count).collect()
}
