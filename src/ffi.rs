//! Python FFI bindings via PyO3.
//!
//! Exposes cluster generation, partitioning, partition analysis and habitat
//! painting to the Python population simulator. Networks cross the boundary as
//! plain nested lists: a 0/1 adjacency matrix, optional per-patch population
//! rows and optional `(x, y)` positions. Every entry point takes an explicit
//! `seed`, so a call is reproducible on its own.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! import patchnet
//!
//! adjacency = [[1, 1, 0, 0], [1, 1, 1, 0], [0, 1, 1, 1], [0, 0, 1, 1]]
//! population = [[1.0], [2.0], [5.0], [6.0]]
//! clusters, lookup, success, complexity = patchnet.draw_partition(
//!     adjacency, population, cluster_size=2, seed=3)
//! stats = patchnet.partition_analysis(adjacency, population, clusters, lookup)
//! print(stats.mean_difference)
//! ```

use std::collections::BTreeMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::analysis::{analyze_clusters, PartitionStats};
use crate::builder::{ClusterBuildConfig, GreedyClusterBuilder, ScoringConfig};
use crate::error::ClusterError;
use crate::habitat::{
    ChessboardOptions, ClusterSizes, HabitatClusterAssigner, HabitatClusterConfig, HabitatPattern,
};
use crate::network::{AdjacencyMatrix, PopulationArray, Position, SpatialNetwork};
use crate::partition::{NetworkPartitioner, PartitionConfig};

fn to_py_err(e: ClusterError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn network_from(
    adjacency: &[Vec<u8>],
    populations: Option<&[Vec<f64>]>,
    positions: Option<&[(f64, f64)]>,
) -> PyResult<SpatialNetwork> {
    let mut network = SpatialNetwork::new(AdjacencyMatrix::from_rows(adjacency).map_err(to_py_err)?);
    if let Some(rows) = populations {
        let array = PopulationArray::from_rows(rows).map_err(to_py_err)?;
        network = network.with_populations(array).map_err(to_py_err)?;
    }
    if let Some(points) = positions {
        let points = points.iter().map(|&(x, y)| Position::new(x, y)).collect();
        network = network.with_positions(points).map_err(to_py_err)?;
    }
    Ok(network)
}

// ── PartitionStats ────────────────────────────────────────────────────────────

/// Differences between adjacent clusters of a partition.
#[pyclass(name = "PartitionStats", frozen)]
#[derive(Clone)]
pub struct PyPartitionStats {
    inner: PartitionStats,
}

#[pymethods]
impl PyPartitionStats {
    /// Smallest species-averaged difference over adjacent cluster pairs.
    #[getter]
    pub fn min_difference(&self) -> f64 {
        self.inner.min_difference
    }
    /// Mean species-averaged difference over adjacent cluster pairs.
    #[getter]
    pub fn mean_difference(&self) -> f64 {
        self.inner.mean_difference
    }
    /// Largest species-averaged difference over adjacent cluster pairs.
    #[getter]
    pub fn max_difference(&self) -> f64 {
        self.inner.max_difference
    }
    /// Number of adjacent cluster pairs.
    #[getter]
    pub fn adjacent_pairs(&self) -> usize {
        self.inner.adjacent_pairs
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "PartitionStats(min={:.4}, mean={:.4}, max={:.4}, pairs={})",
            self.inner.min_difference,
            self.inner.mean_difference,
            self.inner.max_difference,
            self.inner.adjacent_pairs,
        )
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Grow one cluster with the greedy builder.
///
/// Returns `(cluster, success, internal_complexity)`. `admissible` defaults to
/// every patch. `mode` is one of `none`, `balance`, `ensure_box`,
/// `ensure_uniform`.
#[pyfunction]
#[pyo3(signature = (
    adjacency, size, populations=None, admissible=None, initial_patch=None, num_species=1,
    max_attempts=10, is_box=false, is_uniform=false, mode="none", allow_undersized=false,
    normalised=false, seed=0
))]
#[allow(clippy::too_many_arguments)]
pub fn generate_fast_cluster(
    adjacency: Vec<Vec<u8>>,
    size: usize,
    populations: Option<Vec<Vec<f64>>>,
    admissible: Option<Vec<usize>>,
    initial_patch: Option<usize>,
    num_species: usize,
    max_attempts: usize,
    is_box: bool,
    is_uniform: bool,
    mode: &str,
    allow_undersized: bool,
    normalised: bool,
    seed: u64,
) -> PyResult<(Vec<usize>, bool, f64)> {
    let network = network_from(&adjacency, populations.as_deref(), None)?;
    let config = ClusterBuildConfig {
        size,
        max_attempts,
        num_species,
        scoring: ScoringConfig { is_box, is_uniform, mode: mode.parse().map_err(to_py_err)? },
        allow_undersized,
        normalised,
    };
    let builder = GreedyClusterBuilder::new(&network, config).map_err(to_py_err)?;
    let pool = admissible.unwrap_or_else(|| (0..network.num_patches()).collect());
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let outcome = builder.build(&pool, initial_patch, &mut rng).map_err(to_py_err)?;
    Ok((outcome.cluster, outcome.success, outcome.internal_complexity))
}

/// Partition the network into uniform box clusters.
///
/// Returns `(clusters, lookup, success, internal_complexity)` where `clusters`
/// maps cluster id to members and `lookup[patch]` is the patch's cluster id.
#[pyfunction]
#[pyo3(signature = (
    adjacency, populations, cluster_size, num_species=1, success_threshold=0.9,
    evolutionary=false, normalised=false, initial_patch=None, seed=0
))]
#[allow(clippy::too_many_arguments)]
pub fn draw_partition(
    adjacency: Vec<Vec<u8>>,
    populations: Vec<Vec<f64>>,
    cluster_size: usize,
    num_species: usize,
    success_threshold: f64,
    evolutionary: bool,
    normalised: bool,
    initial_patch: Option<usize>,
    seed: u64,
) -> PyResult<(BTreeMap<usize, Vec<usize>>, Vec<usize>, bool, Vec<f64>)> {
    let network = network_from(&adjacency, Some(populations.as_slice()), None)?;
    let config = PartitionConfig { cluster_size, num_species, success_threshold, evolutionary, normalised };
    let partitioner = NetworkPartitioner::new(&network, config).map_err(to_py_err)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let outcome = partitioner.partition(initial_patch, &mut rng).map_err(to_py_err)?;
    Ok((
        outcome.partition.clusters,
        outcome.partition.lookup,
        outcome.success,
        outcome.internal_complexity,
    ))
}

/// Summarise population differences between adjacent clusters.
#[pyfunction]
#[pyo3(signature = (adjacency, populations, clusters, lookup, num_species=1, normalised=false))]
pub fn partition_analysis(
    adjacency: Vec<Vec<u8>>,
    populations: Vec<Vec<f64>>,
    clusters: BTreeMap<usize, Vec<usize>>,
    lookup: Vec<usize>,
    num_species: usize,
    normalised: bool,
) -> PyResult<PyPartitionStats> {
    let network = network_from(&adjacency, Some(populations.as_slice()), None)?;
    let inner = analyze_clusters(&network, &clusters, &lookup, num_species, normalised)
        .map_err(to_py_err)?;
    Ok(PyPartitionStats { inner })
}

/// Paint habitat types onto clusters and return one type per patch.
///
/// `pattern` is a topology policy name or `chessboard`. `cluster_sizes` is
/// cycled through; a single-element list gives every cluster the same size.
#[pyfunction]
#[pyo3(signature = (
    adjacency, habitat_types, cluster_sizes, pattern="box", positions=None,
    bind_habitat_to_size=false, include_diagonals=false, wrap=false, seed=0
))]
#[allow(clippy::too_many_arguments)]
pub fn assign_habitat_clusters(
    adjacency: Vec<Vec<u8>>,
    habitat_types: Vec<usize>,
    cluster_sizes: Vec<usize>,
    pattern: &str,
    positions: Option<Vec<(f64, f64)>>,
    bind_habitat_to_size: bool,
    include_diagonals: bool,
    wrap: bool,
    seed: u64,
) -> PyResult<Vec<usize>> {
    let network = network_from(&adjacency, None, positions.as_deref())?;
    let pattern: HabitatPattern = pattern.parse().map_err(to_py_err)?;
    let cluster_sizes = match cluster_sizes.as_slice() {
        [single] => ClusterSizes::Single(*single),
        _ => ClusterSizes::Cycle(cluster_sizes),
    };
    let config = HabitatClusterConfig {
        pattern,
        habitat_types,
        cluster_sizes,
        bind_habitat_to_size,
        chessboard: ChessboardOptions { include_diagonals, wrap },
    };
    let assigner = HabitatClusterAssigner::new(&network, config).map_err(to_py_err)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(assigner.assign(&mut rng).map_err(to_py_err)?.habitats)
}

// ── Module ────────────────────────────────────────────────────────────────────

/// The `patchnet` Python module.
#[pymodule]
pub fn patchnet(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPartitionStats>()?;
    m.add_function(wrap_pyfunction!(generate_fast_cluster, m)?)?;
    m.add_function(wrap_pyfunction!(draw_partition, m)?)?;
    m.add_function(wrap_pyfunction!(partition_analysis, m)?)?;
    m.add_function(wrap_pyfunction!(assign_habitat_clusters, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
