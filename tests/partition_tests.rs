//! Integration tests for whole-network partitioning and partition analysis.

use patchnet::{
    analyze_partition, ClusterError, GraphType, NetworkPartitioner, PartitionConfig, PopulationArray,
    SpatialNetwork,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ─── helpers ─────────────────────────────────────────────────────────────────

/// Fully connected lattice with two random species per patch.
fn populated_lattice(n: usize, seed: u64) -> SpatialNetwork {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let net = SpatialNetwork::generate(n, &GraphType::Lattice { connectivity: 1.0 }, &mut rng).unwrap();
    let values: Vec<f64> = (0..n * 2).map(|_| rng.gen_range(0.0..100.0)).collect();
    net.with_populations(PopulationArray::new(n, 2, values).unwrap()).unwrap()
}

/// Every patch belongs to exactly one cluster and the lookup agrees.
fn assert_covers_network(net: &SpatialNetwork, outcome: &patchnet::PartitionOutcome) {
    let partition = &outcome.partition;
    let mut seen = vec![0usize; net.num_patches()];
    for (&id, members) in &partition.clusters {
        for &m in members {
            seen[m] += 1;
            assert_eq!(partition.lookup[m], id);
        }
    }
    assert!(seen.iter().all(|&c| c == 1), "coverage counts: {seen:?}");
}

// ─── partitioner ─────────────────────────────────────────────────────────────

#[test]
fn test_sequential_partition_covers_lattice() {
    let net = populated_lattice(36, 2);
    let config = PartitionConfig { cluster_size: 4, num_species: 2, ..Default::default() };
    let partitioner = NetworkPartitioner::new(&net, config).unwrap();
    let out = partitioner.partition(Some(0), &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
    assert_covers_network(&net, &out);
    for (&id, members) in &out.partition.clusters {
        if Some(id) != out.partition.leftover {
            assert!(members.len() <= 4);
        }
    }
    assert_eq!(out.internal_complexity.len() * 4, out.partitioned_patches);
}

#[test]
fn test_evolutionary_partition_covers_lattice() {
    let net = populated_lattice(30, 4);
    let config = PartitionConfig {
        cluster_size: 3,
        num_species: 2,
        evolutionary: true,
        normalised: true,
        ..Default::default()
    };
    let partitioner = NetworkPartitioner::new(&net, config).unwrap();
    let out = partitioner.partition(None, &mut ChaCha8Rng::seed_from_u64(6)).unwrap();
    assert_covers_network(&net, &out);
    assert!(out.internal_complexity.iter().all(|c| c.is_finite() && *c >= 0.0));
}

#[test]
fn test_partition_is_reproducible() {
    let net = populated_lattice(25, 8);
    let config = PartitionConfig { cluster_size: 5, num_species: 1, ..Default::default() };
    let partitioner = NetworkPartitioner::new(&net, config).unwrap();
    let a = partitioner.partition(None, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
    let b = partitioner.partition(None, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_partition_rejects_oversized_clusters() {
    let net = populated_lattice(4, 0);
    let config = PartitionConfig { cluster_size: 5, ..Default::default() };
    assert_eq!(
        NetworkPartitioner::new(&net, config).err(),
        Some(ClusterError::InfeasibleSize { size: 5, available: 4 })
    );
}

#[test]
fn test_partition_needs_populations() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let net = SpatialNetwork::generate(9, &GraphType::Line, &mut rng).unwrap();
    assert_eq!(
        NetworkPartitioner::new(&net, PartitionConfig::default()).err(),
        Some(ClusterError::MissingPopulation)
    );
}

// ─── analysis ────────────────────────────────────────────────────────────────

#[test]
fn test_analysis_of_real_partition_is_ordered() {
    let net = populated_lattice(36, 12);
    let config = PartitionConfig { cluster_size: 4, num_species: 2, ..Default::default() };
    let partitioner = NetworkPartitioner::new(&net, config).unwrap();
    let out = partitioner.partition(None, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
    let stats = analyze_partition(&net, &out.partition, 2, false).unwrap();
    assert!(stats.adjacent_pairs > 0);
    assert!(stats.min_difference <= stats.mean_difference);
    assert!(stats.mean_difference <= stats.max_difference);
}
