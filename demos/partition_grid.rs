//! Partition a populated lattice and paint a chessboard of habitats over it.
//!
//! ```bash
//! cargo run --example partition_grid
//! ```

use patchnet::{
    analyze_partition, ClusterSizes, GeneratorConfig, HabitatClusterAssigner, HabitatPattern,
    NetworkPartitioner, PopulationArray,
};
use rand::Rng;

fn main() -> patchnet::Result<()> {
    let mut config = GeneratorConfig { seed: 2024, num_patches: 36, ..Default::default() };
    config.partition.cluster_size = 4;
    config.habitat.pattern = HabitatPattern::Chessboard;
    config.habitat.cluster_sizes = ClusterSizes::Single(4);

    let mut rng = config.rng();
    let network = config.build_network(&mut rng)?;
    let n = network.num_patches();
    let values: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..50.0)).collect();
    let network = network.with_populations(PopulationArray::new(n, 1, values)?)?;

    let partitioner = NetworkPartitioner::new(&network, config.partition.clone())?;
    let outcome = partitioner.partition(Some(0), &mut rng)?;
    println!(
        "partition: {} clusters, success = {}, {} patches in full clusters",
        outcome.partition.len(),
        outcome.success,
        outcome.partitioned_patches
    );
    let stats = analyze_partition(&network, &outcome.partition, 1, false)?;
    println!(
        "adjacent cluster differences: min {:.2}, mean {:.2}, max {:.2} over {} pairs",
        stats.min_difference, stats.mean_difference, stats.max_difference, stats.adjacent_pairs
    );

    let assignment = HabitatClusterAssigner::new(&network, config.habitat.clone())?.assign(&mut rng)?;
    let columns = 6;
    for row in assignment.habitats.chunks(columns) {
        let line: Vec<String> = row.iter().map(|h| h.to_string()).collect();
        println!("{}", line.join(" "));
    }
    Ok(())
}
