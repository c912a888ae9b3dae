/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Tiling a whole network into near-uniform box clusters.
//!
//! The partitioner repeatedly asks the [`GreedyClusterBuilder`] for a
//! `balance`-scored cluster over the patches that are still unassigned. Each
//! returned cluster, successful or not, is given the next id and removed from
//! the pool. Whatever cannot be clustered at the end (or once the run is
//! aborted) is collected into one leftover pseudo-cluster, so every patch
//! always ends up with exactly one id.
//!
//! # Seed selection
//!
//! - **Sequential**: the next cluster starts at the smallest unassigned patch
//!   greater than the smallest member of the cluster just built, falling back
//!   to the smallest unassigned patch.
//! - **Evolutionary**: up to five candidate clusters are drawn from random
//!   seeds and the successful one with the lowest internal complexity is kept.
//!
//! # Success
//!
//! With `N` patches and cluster size `k`, at most `k · floor(N / k)` patches can
//! be tiled exactly. The target is `success_threshold` times that. The run is
//! abandoned as soon as the failed patches make the target unreachable.

use std::collections::BTreeMap;

use hashbrown::HashSet;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::builder::{BuildOutcome, ClusterBuildConfig, GreedyClusterBuilder, ScoringConfig};
use crate::error::{ClusterError, Result};
use crate::network::SpatialNetwork;

/// Candidate clusters drawn per step in evolutionary mode.
const EVOLUTIONARY_DRAWS: usize = 5;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Parameters for [`NetworkPartitioner`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PartitionConfig {
    /// Target size of every cluster.
    pub cluster_size: usize,
    /// Number of leading species columns compared.
    pub num_species: usize,
    /// Fraction of the exactly-tileable patches that must be clustered. Default: 0.9.
    pub success_threshold: f64,
    /// Keep the best of several randomly seeded candidates per step.
    pub evolutionary: bool,
    /// Compare normalised rather than raw populations.
    pub normalised: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            cluster_size: 4,
            num_species: 1,
            success_threshold: 0.9,
            evolutionary: false,
            normalised: false,
        }
    }
}

impl PartitionConfig {
    /// Reject zero cluster sizes and thresholds outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        if self.cluster_size == 0 {
            return Err(ClusterError::invalid("partition cluster_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.success_threshold) {
            return Err(ClusterError::invalid(format!(
                "success_threshold must lie in [0, 1], got {}",
                self.success_threshold
            )));
        }
        Ok(())
    }

    /// Number of patches that must be clustered for the partition to succeed.
    pub fn target(&self, num_patches: usize) -> f64 {
        let tileable = self.cluster_size * (num_patches / self.cluster_size);
        self.success_threshold * tileable as f64
    }
}

// ─── Partition ───────────────────────────────────────────────────────────────

/// Disjoint clusters covering every patch of a network.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Partition {
    /// Cluster id → members, ids assigned in creation order from 0.
    pub clusters: BTreeMap<usize, Vec<usize>>,
    /// Patch index → cluster id.
    pub lookup: Vec<usize>,
    /// Ids of clusters that fell short of the target size.
    pub failed: Vec<usize>,
    /// Id of the pseudo-cluster holding unassignable remainder, if any.
    pub leftover: Option<usize>,
}

impl Partition {
    /// Number of clusters, leftover included.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True when there are no clusters (empty network).
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Members of cluster `id`.
    pub fn cluster(&self, id: usize) -> Option<&[usize]> {
        self.clusters.get(&id).map(Vec::as_slice)
    }

    /// Cluster id of `patch`.
    pub fn cluster_of(&self, patch: usize) -> Option<usize> {
        self.lookup.get(patch).copied()
    }
}

/// Result of [`NetworkPartitioner::partition`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionOutcome {
    /// The clusters and lookup.
    pub partition: Partition,
    /// True if enough patches were tiled into full-size clusters.
    pub success: bool,
    /// Internal complexity of each successful cluster, in creation order.
    pub internal_complexity: Vec<f64>,
    /// Patches placed in full-size clusters.
    pub partitioned_patches: usize,
}

// ─── NetworkPartitioner ──────────────────────────────────────────────────────

/// Tiles a [`SpatialNetwork`] into box clusters of uniform population.
#[derive(Clone, Debug)]
pub struct NetworkPartitioner<'a> {
    network: &'a SpatialNetwork,
    config: PartitionConfig,
    builder: GreedyClusterBuilder<'a>,
}

impl<'a> NetworkPartitioner<'a> {
    /// Validate `config` and prepare the underlying cluster builder.
    ///
    /// Fails with [`ClusterError::InfeasibleSize`] if the cluster size exceeds
    /// the network, and [`ClusterError::MissingPopulation`] if the network has
    /// no population data.
    pub fn new(network: &'a SpatialNetwork, config: PartitionConfig) -> Result<Self> {
        config.validate()?;
        if config.cluster_size > network.num_patches() {
            return Err(ClusterError::InfeasibleSize {
                size: config.cluster_size,
                available: network.num_patches(),
            });
        }
        let builder = GreedyClusterBuilder::new(
            network,
            ClusterBuildConfig {
                size: config.cluster_size,
                max_attempts: 1,
                num_species: config.num_species,
                scoring: ScoringConfig::balance(),
                allow_undersized: true,
                normalised: config.normalised,
            },
        )?;
        Ok(Self { network, config, builder })
    }

    /// Partition the whole network.
    ///
    /// `initial_patch` seeds the first cluster in sequential mode; `None`
    /// draws it at random. Ignored in evolutionary mode.
    pub fn partition<R: Rng + ?Sized>(
        &self,
        initial_patch: Option<usize>,
        rng: &mut R,
    ) -> Result<PartitionOutcome> {
        let total = self.network.num_patches();
        let size = self.config.cluster_size;
        let target = self.config.target(total);

        let mut remaining: Vec<usize> = (0..total).collect();
        let mut clusters = BTreeMap::new();
        let mut lookup = vec![0usize; total];
        let mut failed_ids = Vec::new();
        let mut complexities = Vec::new();
        let mut partitioned = 0usize;
        let mut failed = 0usize;
        let mut seed = initial_patch;
        let mut next_id = 0usize;

        while remaining.len() >= size {
            let best = if self.config.evolutionary {
                self.evolve(&remaining, rng)?
            } else {
                self.builder.build(&remaining, seed, rng)?
            };
            if best.cluster.is_empty() {
                break;
            }

            if best.success {
                partitioned += size;
                complexities.push(best.internal_complexity);
            } else {
                failed += best.cluster.len();
                failed_ids.push(next_id);
            }

            let members: HashSet<usize> = best.cluster.iter().copied().collect();
            remaining.retain(|p| !members.contains(p));
            for &p in &best.cluster {
                lookup[p] = next_id;
            }
            let smallest = best.cluster.iter().copied().min();
            clusters.insert(next_id, best.cluster);
            next_id += 1;

            if failed as f64 > total as f64 - target {
                warn!(failed, target, "partition target unreachable; stopping early");
                break;
            }

            seed = smallest.and_then(|low| {
                remaining
                    .iter()
                    .copied()
                    .find(|&p| p > low)
                    .or_else(|| remaining.first().copied())
            });
        }

        let leftover = if remaining.is_empty() {
            None
        } else {
            for &p in &remaining {
                lookup[p] = next_id;
            }
            clusters.insert(next_id, remaining);
            Some(next_id)
        };

        let success = partitioned > 0 && partitioned as f64 >= target;
        debug!(
            clusters = clusters.len(),
            partitioned,
            failed,
            target,
            success,
            "partition finished"
        );
        Ok(PartitionOutcome {
            partition: Partition { clusters, lookup, failed: failed_ids, leftover },
            success,
            internal_complexity: complexities,
            partitioned_patches: partitioned,
        })
    }

    /// Best of several randomly seeded candidates over `remaining`.
    fn evolve<R: Rng + ?Sized>(&self, remaining: &[usize], rng: &mut R) -> Result<BuildOutcome> {
        let draws = if remaining.len() > self.config.cluster_size {
            EVOLUTIONARY_DRAWS
        } else {
            1
        };
        let mut first: Option<BuildOutcome> = None;
        let mut best: Option<BuildOutcome> = None;
        for _ in 0..draws {
            let Some(&seed) = remaining.choose(rng) else { break };
            let candidate = self.builder.build(remaining, Some(seed), rng)?;
            let improves = candidate.success
                && best
                    .as_ref()
                    .map_or(true, |b| candidate.internal_complexity < b.internal_complexity);
            if improves {
                best = Some(candidate.clone());
            }
            if first.is_none() {
                first = Some(candidate);
            }
        }
        Ok(best.or(first).unwrap_or_else(|| BuildOutcome {
            cluster: Vec::new(),
            success: false,
            internal_complexity: 0.0,
            attempts: 0,
        }))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
