/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Greedy randomised growth of a single cluster to a target size.
//!
//! Starting from a seed patch, the builder keeps a *frontier* of admissible
//! neighbours of the cluster. Each frontier entry tracks how many cluster
//! members it touches (box scoring) and its summed per-species population
//! difference to the members (uniformity scoring). At every step the frontier
//! is scored according to the [`ScoringMode`] and one of the best-scoring
//! candidates is drawn uniformly at random.
//!
//! # Scoring modes
//!
//! | Mode | Flags | Score |
//! |------|-------|-------|
//! | `balance` | box + uniform | adjacency scaled into [1, 2] × inverted difference scaled into [1, 2] |
//! | `ensure_box` | box (+ uniform) | max-adjacency only; ties prefer smaller difference |
//! | `ensure_uniform` | uniform (+ box) | min-difference only; ties scaled by adjacency |
//! | `none` | neither | flat |
//!
//! # Internal complexity
//!
//! With uniformity scoring the builder sums every pairwise difference realised
//! inside the cluster and reports it normalised by
//! `4 / (num_species · (size² − size mod 2))`.
//!
//! # Invariants
//!
//! - Frontier entries are never cluster members and are always admissible.
//! - A returned cluster has no repeated patches and at most `size` members.
//! - A failed build returns either an empty cluster or, when undersized
//!   clusters are allowed, the partial cluster flagged as failed.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use hashbrown::HashSet;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use crate::error::{ClusterError, Result};
use crate::network::{PopulationArray, SpatialNetwork};

// ─── Configuration ───────────────────────────────────────────────────────────

/// How box and uniformity preferences are combined when scoring the frontier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScoringMode {
    /// Flat scoring; legal only with neither flag set.
    #[default]
    None,
    /// Soft product of both preferences; requires both flags.
    Balance,
    /// Hard filter on adjacency, then uniformity as tie-break; requires box.
    EnsureBox,
    /// Hard filter on uniformity, then adjacency as tie-break; requires uniform.
    EnsureUniform,
}

impl ScoringMode {
    /// Canonical lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ScoringMode::None => "none",
            ScoringMode::Balance => "balance",
            ScoringMode::EnsureBox => "ensure_box",
            ScoringMode::EnsureUniform => "ensure_uniform",
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringMode {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        [
            ScoringMode::None,
            ScoringMode::Balance,
            ScoringMode::EnsureBox,
            ScoringMode::EnsureUniform,
        ]
        .into_iter()
        .find(|m| m.as_str() == s)
        .ok_or_else(|| ClusterError::invalid(format!("unknown scoring mode {s:?}")))
    }
}

/// Box / uniformity flags together with their combination mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScoringConfig {
    /// Prefer candidates adjacent to many members.
    pub is_box: bool,
    /// Prefer candidates with small population difference to the members.
    pub is_uniform: bool,
    /// How the two preferences are combined.
    pub mode: ScoringMode,
}

impl ScoringConfig {
    /// Both preferences combined softly. Used by the partitioner.
    pub const fn balance() -> Self {
        Self { is_box: true, is_uniform: true, mode: ScoringMode::Balance }
    }

    /// Check that the flags match the mode.
    pub fn validate(&self) -> Result<()> {
        let consistent = match self.mode {
            ScoringMode::None => !self.is_box && !self.is_uniform,
            ScoringMode::Balance => self.is_box && self.is_uniform,
            ScoringMode::EnsureBox => self.is_box,
            ScoringMode::EnsureUniform => self.is_uniform,
        };
        if consistent {
            Ok(())
        } else {
            Err(ClusterError::InconsistentScoringConfig {
                mode: self.mode,
                is_box: self.is_box,
                is_uniform: self.is_uniform,
            })
        }
    }
}

/// Parameters for [`GreedyClusterBuilder`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterBuildConfig {
    /// Target number of patches.
    pub size: usize,
    /// Maximum number of independent growth attempts. Default: 10.
    pub max_attempts: usize,
    /// Number of leading species columns compared by uniformity scoring.
    pub num_species: usize,
    /// Box / uniformity preferences.
    pub scoring: ScoringConfig,
    /// Return a partial cluster, flagged as failed, instead of an empty one.
    pub allow_undersized: bool,
    /// Score against the normalised population array.
    pub normalised: bool,
}

impl Default for ClusterBuildConfig {
    fn default() -> Self {
        Self {
            size: 4,
            max_attempts: 10,
            num_species: 0,
            scoring: ScoringConfig::default(),
            allow_undersized: false,
            normalised: false,
        }
    }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Result of one [`GreedyClusterBuilder::build`] call.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildOutcome {
    /// Members in the order they were drawn.
    pub cluster: Vec<usize>,
    /// True if the target size was reached.
    pub success: bool,
    /// Normalised internal complexity; 0 unless uniformity scoring is active.
    pub internal_complexity: f64,
    /// Growth attempts used.
    pub attempts: usize,
}

impl BuildOutcome {
    fn failed() -> Self {
        Self { cluster: Vec::new(), success: false, internal_complexity: 0.0, attempts: 0 }
    }
}

/// Per-candidate scoring state, kept in a single map keyed by patch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct CandidateStats {
    adjacency_count: usize,
    difference_sum: f64,
}

// ─── GreedyClusterBuilder ────────────────────────────────────────────────────

/// Grows box- and/or uniformity-scored clusters over a [`SpatialNetwork`].
///
/// ```rust
/// use patchnet::builder::{ClusterBuildConfig, GreedyClusterBuilder};
/// use patchnet::network::{AdjacencyMatrix, SpatialNetwork};
/// use rand::SeedableRng;
///
/// let adjacency = AdjacencyMatrix::from_edges(4, [(0, 1), (1, 2), (2, 3)]).unwrap();
/// let network = SpatialNetwork::new(adjacency);
/// let config = ClusterBuildConfig { size: 3, ..Default::default() };
/// let builder = GreedyClusterBuilder::new(&network, config).unwrap();
///
/// let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
/// let outcome = builder.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
/// assert_eq!(outcome.cluster, vec![0, 1, 2]);
/// ```
#[derive(Clone, Debug)]
pub struct GreedyClusterBuilder<'a> {
    network: &'a SpatialNetwork,
    config: ClusterBuildConfig,
    population: Option<&'a PopulationArray>,
}

impl<'a> GreedyClusterBuilder<'a> {
    /// Validate `config` against `network` and create a builder.
    ///
    /// Fails with [`ClusterError::InconsistentScoringConfig`] on mismatched
    /// flags and [`ClusterError::MissingPopulation`] when uniformity scoring
    /// is requested on a network without populations.
    pub fn new(network: &'a SpatialNetwork, config: ClusterBuildConfig) -> Result<Self> {
        config.scoring.validate()?;
        let population = if config.scoring.is_uniform {
            let population = network.require_populations(config.normalised)?;
            if config.num_species > population.num_species() {
                return Err(ClusterError::invalid(format!(
                    "num_species {} exceeds the {} species in the population array",
                    config.num_species,
                    population.num_species()
                )));
            }
            Some(population)
        } else {
            None
        };
        Ok(Self { network, config, population })
    }

    /// The configuration this builder was created with.
    pub fn config(&self) -> &ClusterBuildConfig {
        &self.config
    }

    /// Grow one cluster from the patches in `admissible`.
    ///
    /// `initial_patch`, if given, seeds every attempt and must be admissible.
    /// Otherwise each attempt draws its seed uniformly from `admissible`.
    /// A target size larger than the pool is reported as an immediate
    /// failure without drawing anything.
    pub fn build<R: Rng + ?Sized>(
        &self,
        admissible: &[usize],
        initial_patch: Option<usize>,
        rng: &mut R,
    ) -> Result<BuildOutcome> {
        let size = self.config.size;
        if size == 0 {
            return Ok(BuildOutcome { success: true, ..BuildOutcome::failed() });
        }

        let n = self.network.num_patches();
        if let Some(&bad) = admissible.iter().find(|&&p| p >= n) {
            return Err(ClusterError::invalid(format!(
                "admissible patch {bad} is outside the {n}-patch network"
            )));
        }
        let pool: HashSet<usize> = admissible.iter().copied().collect();
        if size > pool.len() {
            debug!(size, available = pool.len(), "cluster size infeasible for admissible pool");
            return Ok(BuildOutcome::failed());
        }
        if let Some(patch) = initial_patch {
            if !pool.contains(&patch) {
                return Err(ClusterError::InadmissibleInitialPatch { patch });
            }
        }

        let mut outcome = BuildOutcome::failed();
        for attempt in 1..=self.config.max_attempts {
            let seed = match initial_patch {
                Some(patch) => patch,
                None => match admissible.choose(rng) {
                    Some(&patch) => patch,
                    None => break,
                },
            };
            let (cluster, success, raw_complexity) = self.grow(&pool, seed, rng);
            outcome = BuildOutcome {
                cluster,
                success,
                internal_complexity: self.normalise(raw_complexity),
                attempts: attempt,
            };
            if success {
                break;
            }
            trace!(attempt, reached = outcome.cluster.len(), size, "cluster attempt fell short");
        }

        debug!(
            size,
            success = outcome.success,
            attempts = outcome.attempts,
            complexity = outcome.internal_complexity,
            "cluster build finished"
        );
        Ok(outcome)
    }

    /// One growth attempt from `seed`. Returns (cluster, success, raw complexity).
    fn grow<R: Rng + ?Sized>(
        &self,
        pool: &HashSet<usize>,
        seed: usize,
        rng: &mut R,
    ) -> (Vec<usize>, bool, f64) {
        let size = self.config.size;
        let mut cluster = Vec::with_capacity(size);
        let mut members = HashSet::with_capacity(size);
        let mut frontier: BTreeMap<usize, CandidateStats> = BTreeMap::new();
        let mut complexity = 0.0;

        self.admit(seed, pool, &mut cluster, &mut members, &mut frontier);
        while cluster.len() < size {
            let Some(next) = self.draw(&frontier, rng) else {
                if !self.config.allow_undersized {
                    cluster.clear();
                }
                return (cluster, false, complexity);
            };
            if let Some(stats) = frontier.remove(&next) {
                if self.config.scoring.is_uniform {
                    complexity += stats.difference_sum;
                }
            }
            trace!(patch = next, member = cluster.len(), "drew cluster member");
            self.admit(next, pool, &mut cluster, &mut members, &mut frontier);
        }
        (cluster, true, complexity)
    }

    /// Append `patch` and refresh the frontier around it.
    fn admit(
        &self,
        patch: usize,
        pool: &HashSet<usize>,
        cluster: &mut Vec<usize>,
        members: &mut HashSet<usize>,
        frontier: &mut BTreeMap<usize, CandidateStats>,
    ) {
        cluster.push(patch);
        members.insert(patch);
        let scoring = self.config.scoring;
        let num_species = self.config.num_species;

        for &neighbour in self.network.adjacency().neighbours(patch) {
            if members.contains(&neighbour) || !pool.contains(&neighbour) {
                continue;
            }
            let stats = frontier.entry(neighbour).or_insert_with(|| {
                // newly discovered: catch up on every member except `patch`,
                // which the sweep below adds for all candidates alike
                let mut fresh = CandidateStats::default();
                if let Some(population) = self.population {
                    fresh.difference_sum = cluster[..cluster.len() - 1]
                        .iter()
                        .map(|&m| population.difference(m, neighbour, num_species))
                        .sum();
                }
                fresh
            });
            if scoring.is_box {
                stats.adjacency_count += 1;
            }
        }

        if let Some(population) = self.population {
            for (&candidate, stats) in frontier.iter_mut() {
                stats.difference_sum += population.difference(patch, candidate, num_species);
            }
        }
    }

    /// Score the frontier and draw uniformly among the best. `None` when empty.
    fn draw<R: Rng + ?Sized>(
        &self,
        frontier: &BTreeMap<usize, CandidateStats>,
        rng: &mut R,
    ) -> Option<usize> {
        if frontier.is_empty() {
            return None;
        }
        let scores = score_frontier(frontier, self.config.scoring);
        let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let shortlist: Vec<usize> = frontier
            .keys()
            .zip(&scores)
            .filter(|&(_, &s)| s == best)
            .map(|(&p, _)| p)
            .collect();
        shortlist.choose(rng).copied()
    }

    fn normalise(&self, raw: f64) -> f64 {
        if !self.config.scoring.is_uniform {
            return 0.0;
        }
        normalise_complexity(raw, self.config.size, self.config.num_species)
    }
}

/// Scale a raw pairwise-difference sum into the internal complexity measure.
///
/// Returns 0 when the normaliser vanishes (single-patch clusters, no species).
pub fn normalise_complexity(raw: f64, size: usize, num_species: usize) -> f64 {
    let pairs = (size * size - size % 2) as f64;
    let denominator = num_species as f64 * pairs;
    if denominator == 0.0 {
        0.0
    } else {
        raw * 4.0 / denominator
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Frontier scores, index-aligned with the map's key order.
fn score_frontier(frontier: &BTreeMap<usize, CandidateStats>, scoring: ScoringConfig) -> Vec<f64> {
    let adjacency: Vec<f64> = frontier.values().map(|s| s.adjacency_count as f64).collect();
    let difference: Vec<f64> = frontier.values().map(|s| s.difference_sum).collect();
    let (adj_min, adj_max) = min_max(adjacency.iter().copied());
    let (diff_min, diff_max) = min_max(difference.iter().copied());

    let mut scores = vec![1.0; frontier.len()];
    match scoring.mode {
        ScoringMode::Balance => {
            if adj_max - adj_min != 0.0 {
                for (s, a) in scores.iter_mut().zip(&adjacency) {
                    *s *= 1.0 + (a - adj_min) / (adj_max - adj_min);
                }
            }
            if diff_max - diff_min != 0.0 {
                for (s, d) in scores.iter_mut().zip(&difference) {
                    *s *= 2.0 - (d - diff_min) / (diff_max - diff_min);
                }
            }
        }
        ScoringMode::EnsureBox => {
            for ((s, &a), &d) in scores.iter_mut().zip(&adjacency).zip(&difference) {
                if a != adj_max {
                    *s = 0.0;
                } else if scoring.is_uniform {
                    *s *= 1.0 + diff_max - d;
                }
            }
        }
        ScoringMode::EnsureUniform => {
            for ((s, &a), &d) in scores.iter_mut().zip(&adjacency).zip(&difference) {
                if d != diff_min {
                    *s = 0.0;
                } else if scoring.is_box {
                    *s *= a;
                }
            }
        }
        ScoringMode::None => {}
    }
    scores
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{AdjacencyMatrix, PopulationArray};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn line4() -> SpatialNetwork {
        SpatialNetwork::new(AdjacencyMatrix::from_edges(4, [(0, 1), (1, 2), (2, 3)]).unwrap())
    }

    fn config(size: usize, scoring: ScoringConfig) -> ClusterBuildConfig {
        ClusterBuildConfig { size, num_species: 1, scoring, ..Default::default() }
    }

    #[test]
    fn test_scoring_flags_must_match_mode() {
        let bad = [
            ScoringConfig { is_box: true, is_uniform: false, mode: ScoringMode::None },
            ScoringConfig { is_box: true, is_uniform: false, mode: ScoringMode::Balance },
            ScoringConfig { is_box: false, is_uniform: true, mode: ScoringMode::EnsureBox },
            ScoringConfig { is_box: true, is_uniform: false, mode: ScoringMode::EnsureUniform },
        ];
        for scoring in bad {
            assert!(matches!(
                scoring.validate(),
                Err(ClusterError::InconsistentScoringConfig { .. })
            ));
        }
        assert!(ScoringConfig::balance().validate().is_ok());
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn test_box_growth_from_middle_of_line() {
        let net = line4();
        let scoring = ScoringConfig { is_box: true, is_uniform: false, mode: ScoringMode::EnsureBox };
        let builder = GreedyClusterBuilder::new(&net, config(2, scoring)).unwrap();
        let mut seen = HashSet::new();
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = builder.build(&[0, 1, 2, 3], Some(1), &mut rng).unwrap();
            assert!(out.success);
            assert_eq!(out.cluster[0], 1);
            assert_ne!(out.cluster[1], 3);
            seen.insert(out.cluster[1]);
        }
        // both tied neighbours get drawn at some point
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_oversized_request_fails_without_drawing() {
        let net = line4();
        let builder = GreedyClusterBuilder::new(&net, config(3, ScoringConfig::default())).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let before = rng.clone();
        let out = builder.build(&[0, 1], None, &mut rng).unwrap();
        assert!(out.cluster.is_empty());
        assert!(!out.success);
        assert_eq!(out.attempts, 0);
        assert_eq!(rng, before, "no random draws were made");
    }

    #[test]
    fn test_size_zero_trivially_succeeds() {
        let net = line4();
        let builder = GreedyClusterBuilder::new(&net, config(0, ScoringConfig::default())).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let out = builder.build(&[], None, &mut rng).unwrap();
        assert!(out.success);
        assert!(out.cluster.is_empty());
    }

    #[test]
    fn test_inadmissible_seed_is_an_error() {
        let net = line4();
        let builder = GreedyClusterBuilder::new(&net, config(2, ScoringConfig::default())).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            builder.build(&[0, 1, 2], Some(3), &mut rng),
            Err(ClusterError::InadmissibleInitialPatch { patch: 3 })
        );
    }

    #[test]
    fn test_undersized_cluster_is_flagged_or_discarded() {
        // 0-1 joined, 2 and 3 isolated
        let net = SpatialNetwork::new(AdjacencyMatrix::from_edges(4, [(0, 1)]).unwrap());
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let strict = GreedyClusterBuilder::new(&net, config(3, ScoringConfig::default())).unwrap();
        let out = strict.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
        assert!(!out.success);
        assert!(out.cluster.is_empty());
        assert_eq!(out.attempts, 10);

        let lenient = GreedyClusterBuilder::new(
            &net,
            ClusterBuildConfig { allow_undersized: true, ..config(3, ScoringConfig::default()) },
        )
        .unwrap();
        let out = lenient.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
        assert!(!out.success);
        assert_eq!(out.cluster, vec![0, 1]);
    }

    #[test]
    fn test_uniform_scoring_picks_most_similar_neighbour() {
        // star around patch 0
        let adj = AdjacencyMatrix::from_edges(4, [(0, 1), (0, 2), (0, 3)]).unwrap();
        let pop = PopulationArray::from_rows(&[vec![0.0], vec![10.0], vec![1.0], vec![3.0]]).unwrap();
        let net = SpatialNetwork::new(adj).with_populations(pop).unwrap();
        let scoring = ScoringConfig { is_box: false, is_uniform: true, mode: ScoringMode::EnsureUniform };
        let builder = GreedyClusterBuilder::new(&net, config(2, scoring)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let out = builder.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
        assert_eq!(out.cluster, vec![0, 2]);
        // raw 1.0 * 4 / (1 * (4 - 0))
        assert!((out.internal_complexity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_complexity_counts_every_realised_pair() {
        // triangle 0-1-2 fully connected, size 3 picks all of them
        let adj = AdjacencyMatrix::from_edges(3, [(0, 1), (1, 2), (0, 2)]).unwrap();
        let pop = PopulationArray::from_rows(&[vec![0.0], vec![1.0], vec![3.0]]).unwrap();
        let net = SpatialNetwork::new(adj).with_populations(pop).unwrap();
        let builder = GreedyClusterBuilder::new(&net, config(3, ScoringConfig::balance())).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let out = builder.build(&[0, 1, 2], None, &mut rng).unwrap();
        assert!(out.success);
        // pairs: 1 + 3 + 2 = 6; normaliser 4 / (1 * (9 - 1)) = 0.5
        assert!((out.internal_complexity - 3.0).abs() < 1e-12);
    }

    fn populated(n: usize, edges: &[(usize, usize)], values: &[f64]) -> SpatialNetwork {
        let adj = AdjacencyMatrix::from_edges(n, edges.iter().copied()).unwrap();
        let pop = PopulationArray::new(n, 1, values.to_vec()).unwrap();
        SpatialNetwork::new(adj).with_populations(pop).unwrap()
    }

    /// Fan around 0 with an extra 1-2 edge, so 2 ends up touching two members.
    const FAN: [(usize, usize); 4] = [(0, 1), (0, 2), (0, 3), (1, 2)];

    #[test]
    fn test_ensure_box_breaks_adjacency_ties_by_difference() {
        // every leaf touches the seed once; 2 is the closest in population
        let net = populated(4, &[(0, 1), (0, 2), (0, 3)], &[5.0, 9.0, 5.2, 1.0]);
        let scoring = ScoringConfig { is_box: true, is_uniform: true, mode: ScoringMode::EnsureBox };
        let builder = GreedyClusterBuilder::new(&net, config(2, scoring)).unwrap();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = builder.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
            assert_eq!(out.cluster, vec![0, 2]);
        }
    }

    #[test]
    fn test_ensure_uniform_breaks_difference_ties_by_adjacency() {
        // after {0, 1}, patches 2 and 3 both carry difference 2; 2 touches both members
        let net = populated(4, &FAN, &[0.0, 0.0, 1.0, 1.0]);
        let scoring = ScoringConfig { is_box: true, is_uniform: true, mode: ScoringMode::EnsureUniform };
        let builder = GreedyClusterBuilder::new(&net, config(3, scoring)).unwrap();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = builder.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
            assert_eq!(out.cluster, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_ensure_uniform_without_box_leaves_ties_random() {
        let net = populated(4, &FAN, &[0.0, 0.0, 1.0, 1.0]);
        let scoring = ScoringConfig { is_box: false, is_uniform: true, mode: ScoringMode::EnsureUniform };
        let builder = GreedyClusterBuilder::new(&net, config(3, scoring)).unwrap();
        let mut third = HashSet::new();
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = builder.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
            assert_eq!(&out.cluster[..2], &[0, 1]);
            third.insert(out.cluster[2]);
        }
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn test_balance_prefers_touching_and_similar() {
        // step 1: equal adjacency, 1 is most similar; step 2: 2 touches both and is closer than 3
        let net = populated(4, &FAN, &[0.0, 0.0, 0.5, 1.0]);
        let builder = GreedyClusterBuilder::new(&net, config(3, ScoringConfig::balance())).unwrap();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = builder.build(&[0, 1, 2, 3], Some(0), &mut rng).unwrap();
            assert_eq!(out.cluster, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_uniform_scoring_requires_population() {
        let net = line4();
        assert_eq!(
            GreedyClusterBuilder::new(&net, config(2, ScoringConfig::balance())).err(),
            Some(ClusterError::MissingPopulation)
        );
    }

    #[test]
    fn test_same_seed_same_cluster() {
        let adj = AdjacencyMatrix::from_fn(16, |i, j| {
            let (xi, yi, xj, yj) = (i % 4, i / 4, j % 4, j / 4);
            xi.abs_diff(xj) + yi.abs_diff(yj) == 1
        });
        let pop = PopulationArray::new(16, 1, (0..16).map(|v| (v * 7 % 5) as f64).collect()).unwrap();
        let net = SpatialNetwork::new(adj).with_populations(pop).unwrap();
        let builder = GreedyClusterBuilder::new(&net, config(5, ScoringConfig::balance())).unwrap();
        let pool: Vec<usize> = (0..16).collect();
        let a = builder.build(&pool, None, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        let b = builder.build(&pool, None, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalise_complexity_guards_zero_denominator() {
        assert_eq!(normalise_complexity(5.0, 1, 3), 0.0);
        assert_eq!(normalise_complexity(5.0, 4, 0), 0.0);
        assert_eq!(normalise_complexity(8.0, 4, 2), 1.0);
    }
}
