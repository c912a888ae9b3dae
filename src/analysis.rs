//! Cross-cluster population difference statistics for a finished partition.
//!
//! Each cluster is summarised by its per-species mean population. Two
//! clusters are adjacent when any member of one neighbours any member of the
//! other. For every adjacent pair the species-averaged absolute difference of
//! the cluster means is computed, and the minimum, mean and maximum over all
//! pairs are reported. A partition without adjacent pairs reports zeros.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ClusterError, Result};
use crate::network::SpatialNetwork;
use crate::partition::Partition;

/// Summary of differences between adjacent clusters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionStats {
    /// Smallest species-averaged difference over adjacent pairs.
    pub min_difference: f64,
    /// Mean species-averaged difference over adjacent pairs.
    pub mean_difference: f64,
    /// Largest species-averaged difference over adjacent pairs.
    pub max_difference: f64,
    /// Number of adjacent cluster pairs.
    pub adjacent_pairs: usize,
}

/// Analyse a [`Partition`] produced by the partitioner.
pub fn analyze_partition(
    network: &SpatialNetwork,
    partition: &Partition,
    num_species: usize,
    normalised: bool,
) -> Result<PartitionStats> {
    analyze_clusters(network, &partition.clusters, &partition.lookup, num_species, normalised)
}

/// Analyse an arbitrary cluster map with its patch → cluster lookup.
pub fn analyze_clusters(
    network: &SpatialNetwork,
    clusters: &BTreeMap<usize, Vec<usize>>,
    lookup: &[usize],
    num_species: usize,
    normalised: bool,
) -> Result<PartitionStats> {
    let population = network.require_populations(normalised)?;
    if num_species == 0 || num_species > population.num_species() {
        return Err(ClusterError::invalid(format!(
            "num_species must lie in 1..={}, got {num_species}",
            population.num_species()
        )));
    }
    if lookup.len() != network.num_patches() {
        return Err(ClusterError::invalid(format!(
            "lookup has {} entries for {} patches",
            lookup.len(),
            network.num_patches()
        )));
    }
    if let Some(id) = lookup.iter().find(|&&id| !clusters.contains_key(&id)) {
        return Err(ClusterError::invalid(format!("lookup references unknown cluster {id}")));
    }
    let n = network.num_patches();
    if let Some(bad) = clusters.values().flatten().find(|&&m| m >= n) {
        return Err(ClusterError::invalid(format!(
            "cluster member {bad} is outside the {n}-patch network"
        )));
    }

    let mut means: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut adjacent: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (&id, members) in clusters {
        if members.is_empty() {
            continue;
        }
        let mut mean = vec![0.0; num_species];
        for &m in members {
            for (acc, value) in mean.iter_mut().zip(population.row(m)) {
                *acc += value;
            }
        }
        for acc in &mut mean {
            *acc /= members.len() as f64;
        }
        means.insert(id, mean);

        for &m in members {
            for &neighbour in network.adjacency().neighbours(m) {
                let other = lookup[neighbour];
                if other != id {
                    adjacent.insert((id.min(other), id.max(other)));
                }
            }
        }
    }

    let differences: Vec<f64> = adjacent
        .iter()
        .filter_map(|(a, b)| {
            let (ma, mb) = (means.get(a)?, means.get(b)?);
            let total: f64 = ma.iter().zip(mb).map(|(x, y)| (x - y).abs()).sum();
            Some(total / num_species as f64)
        })
        .collect();

    if differences.is_empty() {
        return Ok(PartitionStats::default());
    }
    let min = differences.iter().copied().fold(f64::INFINITY, f64::min);
    let max = differences.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = differences.iter().sum::<f64>() / differences.len() as f64;
    Ok(PartitionStats {
        min_difference: min,
        mean_difference: mean,
        max_difference: max,
        adjacent_pairs: differences.len(),
    })
}
