//! Integration tests for single-cluster selection and greedy growth.

use patchnet::{
    AdjacencyMatrix, ClusterBuildConfig, ClusterError, GraphType, GreedyClusterBuilder,
    PopulationArray, ScoringConfig, ScoringMode, SpatialNetwork, TopologyPolicy,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ─── helpers ─────────────────────────────────────────────────────────────────

/// Fully connected lattice (diagonals included) on a near-square grid.
fn lattice(n: usize, seed: u64) -> SpatialNetwork {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    SpatialNetwork::generate(n, &GraphType::Lattice { connectivity: 1.0 }, &mut rng).unwrap()
}

/// Star around patch 0 with one species.
fn star_with_population(values: &[f64]) -> SpatialNetwork {
    let n = values.len();
    let adj = AdjacencyMatrix::from_edges(n, (1..n).map(|p| (0, p))).unwrap();
    let pop = PopulationArray::new(n, 1, values.to_vec()).unwrap();
    SpatialNetwork::new(adj).with_populations(pop).unwrap()
}

fn box_config(size: usize) -> ClusterBuildConfig {
    ClusterBuildConfig {
        size,
        scoring: ScoringConfig { is_box: true, is_uniform: false, mode: ScoringMode::EnsureBox },
        ..Default::default()
    }
}

// ─── builder ─────────────────────────────────────────────────────────────────

#[test]
fn test_box_cluster_on_lattice_is_connected() {
    let net = lattice(25, 1);
    let builder = GreedyClusterBuilder::new(&net, box_config(5)).unwrap();
    let pool: Vec<usize> = (0..25).collect();
    for seed in 0..10 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let out = builder.build(&pool, None, &mut rng).unwrap();
        assert!(out.success);
        assert_eq!(out.cluster.len(), 5);
        for (i, &m) in out.cluster.iter().enumerate().skip(1) {
            assert!(
                out.cluster[..i].iter().any(|&e| net.adjacency().is_adjacent(e, m)),
                "member {m} does not touch the cluster grown so far"
            );
        }
    }
}

#[test]
fn test_ensure_uniform_picks_closest_population() {
    let net = star_with_population(&[5.0, 5.1, 9.0, 1.0]);
    let config = ClusterBuildConfig {
        size: 2,
        num_species: 1,
        scoring: ScoringConfig { is_box: false, is_uniform: true, mode: ScoringMode::EnsureUniform },
        ..Default::default()
    };
    let builder = GreedyClusterBuilder::new(&net, config).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let out = builder.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
    assert_eq!(out.cluster, vec![0, 1]);
    assert!(out.success);
}

#[test]
fn test_builder_rejects_inadmissible_seed() {
    let net = lattice(9, 0);
    let builder = GreedyClusterBuilder::new(&net, box_config(2)).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    assert_eq!(
        builder.build(&[0, 1, 2], Some(7), &mut rng),
        Err(ClusterError::InadmissibleInitialPatch { patch: 7 })
    );
}

#[test]
fn test_builder_reports_oversized_target_as_failure() {
    let net = lattice(9, 0);
    let builder = GreedyClusterBuilder::new(&net, box_config(5)).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let out = builder.build(&[0, 1, 2, 3], None, &mut rng).unwrap();
    assert!(!out.success);
    assert!(out.cluster.is_empty());
}

#[test]
fn test_uniform_scoring_without_population_is_an_error() {
    let net = lattice(4, 0);
    let config = ClusterBuildConfig {
        size: 2,
        scoring: ScoringConfig::balance(),
        ..Default::default()
    };
    assert_eq!(
        GreedyClusterBuilder::new(&net, config).err(),
        Some(ClusterError::MissingPopulation)
    );
}

#[test]
fn test_same_seed_same_cluster() {
    let net = lattice(36, 3);
    let builder = GreedyClusterBuilder::new(&net, box_config(6)).unwrap();
    let pool: Vec<usize> = (0..36).collect();
    let a = builder.build(&pool, None, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
    let b = builder.build(&pool, None, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
    assert_eq!(a, b);
}

// ─── topology policies ───────────────────────────────────────────────────────

#[test]
fn test_chain_candidates_follow_the_last_member() {
    let net = lattice(9, 0);
    // 3x3 grid: patch 4 is the centre, 8 the bottom-right corner
    let pool: Vec<usize> = vec![0, 1, 2, 3, 5, 6, 7];
    let got = TopologyPolicy::Chain
        .candidates(net.adjacency(), net.positions(), &[4, 8], &pool)
        .unwrap();
    assert_eq!(got, vec![5, 7]);
}

#[test]
fn test_position_box_uses_grid_distances() {
    let net = lattice(9, 0);
    let got = TopologyPolicy::PositionBox
        .candidates(net.adjacency(), net.positions(), &[0, 1], &[2, 3, 4, 5, 6, 7, 8])
        .unwrap();
    // patches 3 (0,1) and 4 (1,1) both sum to 1 + sqrt(2)
    assert_eq!(got, vec![3, 4]);
}
