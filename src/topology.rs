/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Admissible next-element selection for incrementally grown clusters.
//!
//! A [`TopologyPolicy`] decides which patches may join a partially built
//! cluster next. [`TopologyPolicy::candidates`] is a pure function of its
//! inputs; [`TopologyPolicy::grow`] layers the uniform random draws on top.
//!
//! | Policy | Admissible next elements |
//! |--------|--------------------------|
//! | `random` | the whole pool |
//! | `star` | neighbours of the first member |
//! | `chain` | neighbours of the last member |
//! | `disconnected` | patches adjacent to no member |
//! | `box` | patches with the most adjacent members |
//! | `position_box` | patches with the least summed distance to the members |
//!
//! # Invariants
//!
//! - The result is always a subset of the pool, in pool order, without repeats.
//! - `box` and `position_box` keep every tied candidate.

use core::fmt;
use core::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use crate::error::{ClusterError, Result};
use crate::network::{AdjacencyMatrix, Position};

/// Closed set of cluster shape policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TopologyPolicy {
    /// Any admissible patch.
    Random,
    /// Neighbours of the first member.
    Star,
    /// Neighbours of the most recently added member.
    Chain,
    /// Patches adjacent to none of the members.
    Disconnected,
    /// Patches adjacent to the greatest number of members.
    Box,
    /// Patches with minimum total Euclidean distance to the members.
    PositionBox,
}

impl TopologyPolicy {
    /// Every policy, in declaration order.
    pub const ALL: [TopologyPolicy; 6] = [
        TopologyPolicy::Random,
        TopologyPolicy::Star,
        TopologyPolicy::Chain,
        TopologyPolicy::Disconnected,
        TopologyPolicy::Box,
        TopologyPolicy::PositionBox,
    ];

    /// Canonical lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            TopologyPolicy::Random => "random",
            TopologyPolicy::Star => "star",
            TopologyPolicy::Chain => "chain",
            TopologyPolicy::Disconnected => "disconnected",
            TopologyPolicy::Box => "box",
            TopologyPolicy::PositionBox => "position_box",
        }
    }

    /// Whether [`Self::candidates`] needs patch positions.
    pub const fn requires_positions(self) -> bool {
        matches!(self, TopologyPolicy::PositionBox)
    }

    /// Admissible next elements for `current` drawn from `pool`.
    ///
    /// `pool` should not contain members of `current`. `star` and `chain`
    /// return nothing while `current` is empty, since there is no anchor.
    /// `position_box` fails with [`ClusterError::MissingPositions`] when
    /// `positions` is `None` and with [`ClusterError::InvalidParameter`] when
    /// there are fewer positions than patches.
    pub fn candidates(
        self,
        adjacency: &AdjacencyMatrix,
        positions: Option<&[Position]>,
        current: &[usize],
        pool: &[usize],
    ) -> Result<Vec<usize>> {
        let picked = match self {
            TopologyPolicy::Random => pool.to_vec(),
            TopologyPolicy::Star => match current.first() {
                Some(&anchor) => neighbours_of(adjacency, anchor, pool),
                None => Vec::new(),
            },
            TopologyPolicy::Chain => match current.last() {
                Some(&anchor) => neighbours_of(adjacency, anchor, pool),
                None => Vec::new(),
            },
            TopologyPolicy::Disconnected => pool
                .iter()
                .copied()
                .filter(|&p| current.iter().all(|&m| !adjacency.is_adjacent(m, p)))
                .collect(),
            TopologyPolicy::Box => {
                let counts: Vec<usize> = pool
                    .iter()
                    .map(|&p| adjacency.adjacent_count(p, current))
                    .collect();
                match counts.iter().max() {
                    Some(&best) => pool
                        .iter()
                        .zip(&counts)
                        .filter(|&(_, &c)| c == best)
                        .map(|(&p, _)| p)
                        .collect(),
                    None => Vec::new(),
                }
            }
            TopologyPolicy::PositionBox => {
                let positions = positions.ok_or(ClusterError::MissingPositions)?;
                if positions.len() < adjacency.len() {
                    return Err(ClusterError::invalid(format!(
                        "{} positions for a {}-patch network",
                        positions.len(),
                        adjacency.len()
                    )));
                }
                let totals: Vec<f64> = pool
                    .iter()
                    .map(|&p| {
                        current
                            .iter()
                            .map(|&m| positions[p].distance(&positions[m]))
                            .sum()
                    })
                    .collect();
                let best = totals.iter().copied().fold(f64::INFINITY, f64::min);
                pool.iter()
                    .zip(&totals)
                    .filter(|&(_, &d)| d == best)
                    .map(|(&p, _)| p)
                    .collect()
            }
        };
        Ok(picked)
    }

    /// Grow one cluster of up to `size` patches from `pool`.
    ///
    /// The seed is drawn uniformly from `pool`, then each further member
    /// uniformly from [`Self::candidates`]. Growth stops early when no
    /// candidate is left, so the result may be shorter than `size`; it is
    /// empty only for an empty pool or `size == 0`.
    pub fn grow<R: Rng + ?Sized>(
        self,
        adjacency: &AdjacencyMatrix,
        positions: Option<&[Position]>,
        pool: &[usize],
        size: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        let mut remaining = pool.to_vec();
        let mut members = Vec::with_capacity(size.min(pool.len()));
        if size == 0 {
            return Ok(members);
        }
        let Some(&seed) = remaining.choose(rng) else { return Ok(members) };
        members.push(seed);
        remaining.retain(|&p| p != seed);

        while members.len() < size {
            let candidates = self.candidates(adjacency, positions, &members, &remaining)?;
            let Some(&next) = candidates.choose(rng) else {
                trace!(policy = %self, reached = members.len(), size, "cluster closed early");
                break;
            };
            members.push(next);
            remaining.retain(|&p| p != next);
        }
        Ok(members)
    }
}

fn neighbours_of(adjacency: &AdjacencyMatrix, anchor: usize, pool: &[usize]) -> Vec<usize> {
    pool.iter()
        .copied()
        .filter(|&p| adjacency.is_adjacent(anchor, p))
        .collect()
}

impl fmt::Display for TopologyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopologyPolicy {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        TopologyPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ClusterError::UnknownTopology(s.to_owned()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// 0-1-2-3 path.
    fn line4() -> AdjacencyMatrix {
        AdjacencyMatrix::from_edges(4, [(0, 1), (1, 2), (2, 3)]).unwrap()
    }

    #[test]
    fn test_policy_names_round_trip() {
        for policy in TopologyPolicy::ALL {
            assert_eq!(policy.as_str().parse::<TopologyPolicy>(), Ok(policy));
        }
        assert_eq!(
            "hexagonal".parse::<TopologyPolicy>(),
            Err(ClusterError::UnknownTopology("hexagonal".into()))
        );
    }

    #[test]
    fn test_random_returns_pool_unchanged() {
        let adj = line4();
        let got = TopologyPolicy::Random.candidates(&adj, None, &[0], &[3, 1, 2]).unwrap();
        assert_eq!(got, vec![3, 1, 2]);
    }

    #[test]
    fn test_star_anchors_on_first_chain_on_last() {
        let adj = line4();
        let star = TopologyPolicy::Star.candidates(&adj, None, &[1, 2], &[0, 3]).unwrap();
        assert_eq!(star, vec![0]);
        let chain = TopologyPolicy::Chain.candidates(&adj, None, &[1, 2], &[0, 3]).unwrap();
        assert_eq!(chain, vec![3]);
        let empty = TopologyPolicy::Star.candidates(&adj, None, &[], &[0, 3]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_disconnected_excludes_every_neighbour() {
        let adj = line4();
        let got = TopologyPolicy::Disconnected
            .candidates(&adj, None, &[0], &[1, 2, 3])
            .unwrap();
        assert_eq!(got, vec![2, 3]);
        let got = TopologyPolicy::Disconnected
            .candidates(&adj, None, &[0, 3], &[1, 2])
            .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn test_box_keeps_all_maximal_ties() {
        let adj = line4();
        // starting at patch 1, both 0 and 2 touch it; 3 does not
        let got = TopologyPolicy::Box.candidates(&adj, None, &[1], &[0, 2, 3]).unwrap();
        assert_eq!(got, vec![0, 2]);
        assert!(TopologyPolicy::Box.candidates(&adj, None, &[1], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_position_box_prefers_nearest() {
        let adj = AdjacencyMatrix::isolated(3);
        let pos = [
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(5.0, 0.0),
        ];
        let got = TopologyPolicy::PositionBox
            .candidates(&adj, Some(&pos), &[0], &[1, 2])
            .unwrap();
        assert_eq!(got, vec![1]);
        assert_eq!(
            TopologyPolicy::PositionBox.candidates(&adj, None, &[0], &[1, 2]),
            Err(ClusterError::MissingPositions)
        );
    }

    #[test]
    fn test_position_box_rejects_short_positions() {
        let adj = AdjacencyMatrix::isolated(3);
        let pos = [Position::new(0.0, 0.0)];
        let got = TopologyPolicy::PositionBox.candidates(&adj, Some(&pos), &[0], &[1, 2]);
        assert!(matches!(got, Err(ClusterError::InvalidParameter(_))));
    }

    #[test]
    fn test_chain_grow_walks_a_path() {
        let adj = AdjacencyMatrix::from_edges(6, (1..6).map(|p| (p - 1, p))).unwrap();
        let pool: Vec<usize> = (0..6).collect();
        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let got = TopologyPolicy::Chain.grow(&adj, None, &pool, 3, &mut rng).unwrap();
            assert!(!got.is_empty() && got.len() <= 3);
            for pair in got.windows(2) {
                assert!(adj.is_adjacent(pair[0], pair[1]));
            }
        }
    }

    #[test]
    fn test_grow_stops_when_candidates_run_out() {
        let adj = AdjacencyMatrix::isolated(4);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let got = TopologyPolicy::Star.grow(&adj, None, &[0, 1, 2, 3], 3, &mut rng).unwrap();
        assert_eq!(got.len(), 1);
        // disconnected happily takes isolated patches
        let got = TopologyPolicy::Disconnected.grow(&adj, None, &[0, 1, 2, 3], 3, &mut rng).unwrap();
        assert_eq!(got.len(), 3);
        assert!(TopologyPolicy::Box.grow(&adj, None, &[], 3, &mut rng).unwrap().is_empty());
        assert!(TopologyPolicy::Box.grow(&adj, None, &[0], 0, &mut rng).unwrap().is_empty());
    }
}
