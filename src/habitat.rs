/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Habitat-type painting over a spatial network.
//!
//! Three ways of labelling every patch with a habitat type:
//!
//! - [`HabitatClusterAssigner`] grows clusters with a [`TopologyPolicy`]
//!   (`box`, `chain`, `star`, ...) or with the chessboard heuristic, painting
//!   each cluster with the next habitat type of the configured cycle.
//! - [`assign_habitats_autocorrelated`] draws each patch's type from a mix of
//!   its already-labelled neighbours and a base distribution.
//! - [`validate_manual_habitats`] checks an explicit labelling.
//!
//! # Chessboard heuristic
//!
//! Patches are filled in horizontal *ribbons* whose height is
//! `ceil(sqrt(size))` rows. Inside a ribbon each cluster starts at the
//! left-most, then top-most, free patch and grows one patch at a time. A
//! candidate must neighbour the cluster and lie within one grid step of its
//! bounding box, which discards the long links of wrapped lattices. Among the
//! remaining candidates the highest priority wins:
//!
//! 1. same column as the first element (inside the ribbon)
//! 2. back-fill: inside the bounding box, or left of it
//! 3. grows the bounding box height
//! 4. grows the bounding box width
//! 5. stays inside the ribbon
//! 6. uniform random choice among what is left
//!
//! The finished cluster takes the habitat type with the fewest contacts to
//! same-type neighbours. Repeating the previous cluster's type carries a large
//! penalty unless the cluster opened a new ribbon.
//!
//! A cluster that runs out of admissible candidates closes below its target
//! size and the next one begins regardless.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use crate::error::{ClusterError, Result};
use crate::network::{AdjacencyMatrix, Position, SpatialNetwork};
use crate::topology::TopologyPolicy;

/// Tolerance for comparing grid coordinates.
const EPS: f64 = 1e-9;

/// Penalty for repeating the previous cluster's habitat inside a ribbon.
const REPEAT_PENALTY: usize = 1_000;

const FIRST_ELEMENT_BONUS: u32 = 32;
const BACKFILL_BONUS: u32 = 16;
const HEIGHT_BONUS: u32 = 8;
const WIDTH_BONUS: u32 = 4;
const IN_RIBBON_BONUS: u32 = 2;

// ─── Configuration ───────────────────────────────────────────────────────────

/// One cluster size for every cluster, or a list cycled through in order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ClusterSizes {
    /// Every cluster has this target size.
    Single(usize),
    /// Cluster `i` has target size `sizes[i mod len]`.
    Cycle(Vec<usize>),
}

impl Default for ClusterSizes {
    fn default() -> Self {
        ClusterSizes::Single(4)
    }
}

impl ClusterSizes {
    /// Target size for position `index` of the cycle.
    pub fn get(&self, index: usize) -> usize {
        match self {
            ClusterSizes::Single(size) => *size,
            ClusterSizes::Cycle(sizes) if sizes.is_empty() => 0,
            ClusterSizes::Cycle(sizes) => sizes[index % sizes.len()],
        }
    }

    /// Reject empty lists and zero sizes.
    pub fn validate(&self) -> Result<()> {
        let ok = match self {
            ClusterSizes::Single(size) => *size > 0,
            ClusterSizes::Cycle(sizes) => !sizes.is_empty() && sizes.iter().all(|&s| s > 0),
        };
        if ok {
            Ok(())
        } else {
            Err(ClusterError::invalid("cluster sizes must be a non-empty list of positive sizes"))
        }
    }
}

/// How clusters are shaped while painting habitats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum HabitatPattern {
    /// Grow with a plain topology policy.
    Topology(TopologyPolicy),
    /// Ribbon-ordered boxes with alternating habitat types.
    Chessboard,
}

impl Default for HabitatPattern {
    fn default() -> Self {
        HabitatPattern::Topology(TopologyPolicy::Box)
    }
}

impl fmt::Display for HabitatPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HabitatPattern::Topology(policy) => policy.fmt(f),
            HabitatPattern::Chessboard => f.write_str("chessboard"),
        }
    }
}

impl FromStr for HabitatPattern {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "chessboard" {
            Ok(HabitatPattern::Chessboard)
        } else {
            s.parse().map(HabitatPattern::Topology)
        }
    }
}

impl TryFrom<String> for HabitatPattern {
    type Error = ClusterError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<HabitatPattern> for String {
    fn from(pattern: HabitatPattern) -> Self {
        pattern.to_string()
    }
}

/// Chessboard-only switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChessboardOptions {
    /// Count diagonal contacts when comparing habitat types across clusters.
    pub include_diagonals: bool,
    /// The lattice wraps around, so long adjacency links count as contacts.
    pub wrap: bool,
}

/// Parameters for [`HabitatClusterAssigner`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HabitatClusterConfig {
    /// Cluster shape.
    pub pattern: HabitatPattern,
    /// Habitat types cycled through, in order.
    pub habitat_types: Vec<usize>,
    /// Target cluster sizes.
    pub cluster_sizes: ClusterSizes,
    /// Pair habitat `i` of the cycle with size `i` of the size list.
    ///
    /// For the chessboard this also disables the contact-minimising choice of
    /// habitat: types are used strictly in cycle order.
    pub bind_habitat_to_size: bool,
    /// Chessboard switches; ignored by other patterns.
    pub chessboard: ChessboardOptions,
}

impl Default for HabitatClusterConfig {
    fn default() -> Self {
        Self {
            pattern: HabitatPattern::default(),
            habitat_types: vec![0, 1],
            cluster_sizes: ClusterSizes::default(),
            bind_habitat_to_size: false,
            chessboard: ChessboardOptions::default(),
        }
    }
}

impl HabitatClusterConfig {
    /// Reject empty habitat sets and bad sizes.
    pub fn validate(&self) -> Result<()> {
        if self.habitat_types.is_empty() {
            return Err(ClusterError::invalid("at least one habitat type is required"));
        }
        self.cluster_sizes.validate()
    }

    /// Habitat type and target size for cluster number `cycle`.
    fn entry(&self, cycle: usize) -> (usize, usize) {
        let habitat_index = cycle % self.habitat_types.len();
        let size = if self.bind_habitat_to_size {
            self.cluster_sizes.get(habitat_index)
        } else {
            self.cluster_sizes.get(cycle)
        };
        (self.habitat_types[habitat_index], size)
    }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// One painted cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HabitatCluster {
    /// Habitat type painted on every member.
    pub habitat: usize,
    /// Size the cluster was aiming for.
    pub target_size: usize,
    /// Members in the order they were added.
    pub members: Vec<usize>,
}

/// Habitat labels for every patch, plus the clusters that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HabitatAssignment {
    /// Patch index → habitat type.
    pub habitats: Vec<usize>,
    /// Painted clusters in creation order.
    pub clusters: Vec<HabitatCluster>,
}

// ─── HabitatClusterAssigner ──────────────────────────────────────────────────

/// Paints habitat types onto policy-shaped clusters until every patch is labelled.
#[derive(Clone, Debug)]
pub struct HabitatClusterAssigner<'a> {
    network: &'a SpatialNetwork,
    config: HabitatClusterConfig,
}

impl<'a> HabitatClusterAssigner<'a> {
    /// Validate `config` against `network`.
    ///
    /// The chessboard and `position_box` need patch positions.
    pub fn new(network: &'a SpatialNetwork, config: HabitatClusterConfig) -> Result<Self> {
        config.validate()?;
        let needs_positions = match config.pattern {
            HabitatPattern::Chessboard => true,
            HabitatPattern::Topology(policy) => policy.requires_positions(),
        };
        if needs_positions {
            network.require_positions()?;
        }
        let largest = match &config.cluster_sizes {
            ClusterSizes::Single(size) => *size,
            ClusterSizes::Cycle(sizes) => sizes.iter().copied().max().unwrap_or(0),
        };
        if network.num_patches() > 0 && largest > network.num_patches() {
            return Err(ClusterError::InfeasibleSize {
                size: largest,
                available: network.num_patches(),
            });
        }
        Ok(Self { network, config })
    }

    /// Label every patch.
    pub fn assign<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<HabitatAssignment> {
        let clusters = match self.config.pattern {
            HabitatPattern::Topology(policy) => self.paint_topology(policy, rng)?,
            HabitatPattern::Chessboard => self.paint_chessboard(rng)?,
        };
        let mut habitats = vec![0; self.network.num_patches()];
        for cluster in &clusters {
            for &m in &cluster.members {
                habitats[m] = cluster.habitat;
            }
        }
        debug!(clusters = clusters.len(), pattern = %self.config.pattern, "habitats painted");
        Ok(HabitatAssignment { habitats, clusters })
    }

    fn paint_topology<R: Rng + ?Sized>(
        &self,
        policy: TopologyPolicy,
        rng: &mut R,
    ) -> Result<Vec<HabitatCluster>> {
        let adjacency = self.network.adjacency();
        let positions = self.network.positions();
        let mut unassigned: Vec<usize> = (0..self.network.num_patches()).collect();
        let mut clusters = Vec::new();

        for cycle in 0.. {
            if unassigned.is_empty() {
                break;
            }
            let (habitat, target_size) = self.config.entry(cycle);
            let members = policy.grow(adjacency, positions, &unassigned, target_size, rng)?;
            if members.is_empty() {
                break;
            }
            unassigned.retain(|p| !members.contains(p));
            trace!(cycle, habitat, size = members.len(), target_size, "habitat cluster painted");
            clusters.push(HabitatCluster { habitat, target_size, members });
        }
        Ok(clusters)
    }

    fn paint_chessboard<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<HabitatCluster>> {
        let positions = self.network.require_positions()?;
        let adjacency = self.network.adjacency();
        let mut painted: Vec<Option<usize>> = vec![None; self.network.num_patches()];
        let mut unassigned: Vec<usize> = (0..self.network.num_patches()).collect();
        let mut ribbon: Option<Ribbon> = None;
        let mut previous: Option<usize> = None;
        let mut clusters = Vec::new();

        for cycle in 0.. {
            if unassigned.is_empty() {
                break;
            }
            let (cycle_habitat, target_size) = self.config.entry(cycle);

            let mut ribbon_reset = false;
            let current = match ribbon {
                Some(r) if unassigned.iter().any(|&p| r.contains(&positions[p])) => r,
                _ => {
                    ribbon_reset = true;
                    let top = unassigned
                        .iter()
                        .map(|&p| positions[p].y)
                        .fold(f64::INFINITY, f64::min);
                    let r = Ribbon::new(top, target_size);
                    ribbon = Some(r);
                    r
                }
            };

            let Some(seed) = unassigned
                .iter()
                .copied()
                .filter(|&p| current.contains(&positions[p]))
                .min_by(|&a, &b| column_major(&positions[a], &positions[b]))
            else {
                break;
            };

            let members = grow_chessboard_cluster(
                adjacency,
                positions,
                current,
                seed,
                target_size,
                &mut unassigned,
                rng,
            );

            let habitat = if self.config.bind_habitat_to_size {
                cycle_habitat
            } else {
                self.choose_habitat(&members, &painted, previous, ribbon_reset, cycle)
            };
            for &m in &members {
                painted[m] = Some(habitat);
            }
            trace!(cycle, habitat, size = members.len(), ribbon_reset, "chessboard cluster painted");
            previous = Some(habitat);
            clusters.push(HabitatCluster { habitat, target_size, members });
        }
        Ok(clusters)
    }

    /// Habitat with the fewest same-type contacts, starting the search at the cycle position.
    fn choose_habitat(
        &self,
        members: &[usize],
        painted: &[Option<usize>],
        previous: Option<usize>,
        ribbon_reset: bool,
        cycle: usize,
    ) -> usize {
        let types = &self.config.habitat_types;
        let start = cycle % types.len();
        let mut best = (usize::MAX, types[start]);
        for offset in 0..types.len() {
            let habitat = types[(start + offset) % types.len()];
            let mut cost = self.same_type_contacts(members, painted, habitat);
            if !ribbon_reset && previous == Some(habitat) {
                cost += REPEAT_PENALTY;
            }
            if cost < best.0 {
                best = (cost, habitat);
            }
        }
        best.1
    }

    fn same_type_contacts(&self, members: &[usize], painted: &[Option<usize>], habitat: usize) -> usize {
        let adjacency = self.network.adjacency();
        let Some(positions) = self.network.positions() else { return 0 };
        let options = self.config.chessboard;
        members
            .iter()
            .flat_map(move |&m| adjacency.neighbours(m).iter().map(move |&n| (m, n)))
            .filter(|&(_, n)| painted[n] == Some(habitat))
            .filter(|&(m, n)| {
                let dx = (positions[m].x - positions[n].x).abs();
                let dy = (positions[m].y - positions[n].y).abs();
                let diagonal = dx > EPS && dy > EPS;
                let local = dx <= 1.0 + EPS && dy <= 1.0 + EPS;
                (options.wrap || local) && (options.include_diagonals || !diagonal)
            })
            .count()
    }
}

/// Horizontal band of rows currently being filled.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Ribbon {
    top: f64,
    bottom: f64,
}

impl Ribbon {
    fn new(top: f64, target_size: usize) -> Self {
        let height = (target_size.max(1) as f64).sqrt().ceil();
        Self { top, bottom: top + height - 1.0 }
    }

    fn contains(&self, p: &Position) -> bool {
        p.y >= self.top - EPS && p.y <= self.bottom + EPS
    }
}

/// Left-most first, then top-most.
fn column_major(a: &Position, b: &Position) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

/// Axis-aligned bounding box of a cluster's positions.
#[derive(Clone, Copy, Debug)]
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    fn of(members: &[usize], positions: &[Position]) -> Self {
        members.iter().map(|&m| positions[m]).fold(
            Bounds {
                min_x: f64::INFINITY,
                max_x: f64::NEG_INFINITY,
                min_y: f64::INFINITY,
                max_y: f64::NEG_INFINITY,
            },
            |b, p| Bounds {
                min_x: b.min_x.min(p.x),
                max_x: b.max_x.max(p.x),
                min_y: b.min_y.min(p.y),
                max_y: b.max_y.max(p.y),
            },
        )
    }

    /// Within one grid step of the box in both axes.
    fn near(&self, p: &Position) -> bool {
        p.x >= self.min_x - 1.0 - EPS
            && p.x <= self.max_x + 1.0 + EPS
            && p.y >= self.min_y - 1.0 - EPS
            && p.y <= self.max_y + 1.0 + EPS
    }

    fn spans_column(&self, x: f64) -> bool {
        x >= self.min_x - EPS && x <= self.max_x + EPS
    }

    fn spans_row(&self, y: f64) -> bool {
        y >= self.min_y - EPS && y <= self.max_y + EPS
    }
}

/// Fill-order priority of `candidate`; higher is better.
fn chessboard_priority(first: &Position, bounds: &Bounds, ribbon: &Ribbon, candidate: &Position) -> u32 {
    let in_ribbon = ribbon.contains(candidate);
    let mut score = 0;
    if in_ribbon && (candidate.x - first.x).abs() <= EPS {
        score += FIRST_ELEMENT_BONUS;
    }
    let inside = bounds.spans_column(candidate.x) && bounds.spans_row(candidate.y);
    if in_ribbon && (inside || candidate.x < bounds.min_x - EPS) {
        score += BACKFILL_BONUS;
    }
    if in_ribbon && bounds.spans_column(candidate.x) && !bounds.spans_row(candidate.y) {
        score += HEIGHT_BONUS;
    }
    if (candidate.x - (bounds.max_x + 1.0)).abs() <= EPS {
        score += WIDTH_BONUS;
    }
    if in_ribbon {
        score += IN_RIBBON_BONUS;
    }
    score
}

fn grow_chessboard_cluster<R: Rng + ?Sized>(
    adjacency: &AdjacencyMatrix,
    positions: &[Position],
    ribbon: Ribbon,
    seed: usize,
    target_size: usize,
    unassigned: &mut Vec<usize>,
    rng: &mut R,
) -> Vec<usize> {
    let mut members = vec![seed];
    unassigned.retain(|&p| p != seed);
    let first = positions[seed];

    while members.len() < target_size {
        let bounds = Bounds::of(&members, positions);
        let scored: Vec<(usize, u32)> = unassigned
            .iter()
            .copied()
            .filter(|&p| adjacency.adjacent_count(p, &members) > 0)
            .filter(|&p| bounds.near(&positions[p]))
            .map(|p| (p, chessboard_priority(&first, &bounds, &ribbon, &positions[p])))
            .collect();
        let Some(best) = scored.iter().map(|&(_, s)| s).max() else { break };
        let shortlist: Vec<usize> = scored
            .iter()
            .filter(|&&(_, s)| s == best)
            .map(|&(p, _)| p)
            .collect();
        let Some(&next) = shortlist.choose(rng) else { break };
        members.push(next);
        unassigned.retain(|&p| p != next);
    }
    members
}

// ─── Probabilistic and manual assignment ─────────────────────────────────────

/// Spatially auto-correlated random habitat labels.
///
/// Patch 0 draws uniformly from `habitat_types`. Every later patch mixes the
/// normalised histogram of its lower-indexed neighbours' types (weight
/// `auto_correlation`) with the normalised `base_probabilities` (uniform when
/// `None`, weight `1 - auto_correlation`). Negative mixture weights are
/// clamped to zero; an all-zero mixture falls back to the base distribution.
pub fn assign_habitats_autocorrelated<R: Rng + ?Sized>(
    adjacency: &AdjacencyMatrix,
    habitat_types: &[usize],
    base_probabilities: Option<&[f64]>,
    auto_correlation: f64,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if habitat_types.is_empty() {
        return Err(ClusterError::invalid("at least one habitat type is required"));
    }
    if !(-1.0..=1.0).contains(&auto_correlation) {
        return Err(ClusterError::invalid(format!(
            "auto_correlation must lie in [-1, 1], got {auto_correlation}"
        )));
    }
    let k = habitat_types.len();
    let base: Vec<f64> = match base_probabilities {
        Some(p) if p.len() != k => {
            return Err(ClusterError::invalid(format!(
                "{} base probabilities for {k} habitat types",
                p.len()
            )))
        }
        Some(p) => p.to_vec(),
        None => vec![1.0; k],
    };
    let total: f64 = base.iter().sum();
    if base.iter().any(|&p| p < 0.0) || total <= 0.0 {
        return Err(ClusterError::invalid("base probabilities must be non-negative with a positive sum"));
    }
    let base: Vec<f64> = base.iter().map(|p| p / total).collect();

    let n = adjacency.len();
    let mut labels: Vec<usize> = Vec::with_capacity(n);
    if n == 0 {
        return Ok(labels);
    }
    let first = rng.gen_range(0..k);
    labels.push(first);

    for patch in 1..n {
        let mut histogram = vec![0.0; k];
        for &other in adjacency.neighbours(patch).iter().filter(|&&o| o < patch) {
            histogram[labels[other]] += 1.0;
        }
        let seen: f64 = histogram.iter().sum();
        let mut mix: Vec<f64> = histogram
            .iter()
            .zip(&base)
            .map(|(&h, &b)| {
                let local = if seen > 0.0 { h / seen } else { 0.0 };
                (auto_correlation * local + (1.0 - auto_correlation) * b).max(0.0)
            })
            .collect();
        if mix.iter().sum::<f64>() <= 0.0 {
            mix.clone_from(&base);
        }
        let dist = WeightedIndex::new(&mix)
            .map_err(|e| ClusterError::invalid(format!("habitat distribution: {e}")))?;
        labels.push(dist.sample(rng));
    }
    Ok(labels.into_iter().map(|i| habitat_types[i]).collect())
}

/// Check an explicit per-patch habitat labelling.
pub fn validate_manual_habitats(
    labels: &[usize],
    num_patches: usize,
    habitat_types: &[usize],
) -> Result<Vec<usize>> {
    if labels.len() != num_patches {
        return Err(ClusterError::invalid(format!(
            "{} habitat labels for {num_patches} patches",
            labels.len()
        )));
    }
    if let Some(bad) = labels.iter().find(|l| !habitat_types.contains(l)) {
        return Err(ClusterError::invalid(format!("habitat type {bad} is not in the habitat set")));
    }
    Ok(labels.to_vec())
}

// ─── Tests ────────────────────────────────────────────────────────────────
