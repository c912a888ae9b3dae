//! Aggregated configuration for a full generation pass.
//!
//! [`GeneratorConfig`] bundles the network provider, the topology policy used
//! for single clusters, and the builder, partition and habitat sections under
//! one seed. With the `serde` feature every section deserialises with
//! defaults for missing fields, so a config file only needs to name what it
//! changes.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::builder::ClusterBuildConfig;
use crate::error::Result;
use crate::habitat::HabitatClusterConfig;
use crate::network::{GraphType, SpatialNetwork};
use crate::partition::PartitionConfig;
use crate::topology::TopologyPolicy;

/// Everything a generation pass needs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneratorConfig {
    /// Seed for the single random stream of the pass.
    pub seed: u64,
    /// Number of patches laid out on the grid.
    pub num_patches: usize,
    /// Adjacency provider.
    pub graph: GraphType,
    /// Policy for single-cluster selection, see [`GeneratorConfig::draw_cluster`].
    pub topology: TopologyPolicy,
    /// Greedy builder section.
    pub build: ClusterBuildConfig,
    /// Partitioner section.
    pub partition: PartitionConfig,
    /// Habitat painting section.
    pub habitat: HabitatClusterConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_patches: 16,
            graph: GraphType::Lattice { connectivity: 1.0 },
            topology: TopologyPolicy::Box,
            build: ClusterBuildConfig::default(),
            partition: PartitionConfig::default(),
            habitat: HabitatClusterConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Check every section that can be checked without a network.
    pub fn validate(&self) -> Result<()> {
        self.build.scoring.validate()?;
        self.partition.validate()?;
        self.habitat.validate()
    }

    /// Fresh random stream for this config's seed.
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }

    /// Lay out `num_patches` on a grid and connect them with `graph`.
    ///
    /// Any random source works; [`Self::rng`] gives the reproducible one.
    pub fn build_network<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SpatialNetwork> {
        self.validate()?;
        let network = SpatialNetwork::generate(self.num_patches, &self.graph, rng)?;
        debug!(patches = network.num_patches(), seed = self.seed, "network generated");
        Ok(network)
    }

    /// Draw one cluster of `build.size` patches shaped by `topology`.
    ///
    /// Every patch of `network` is admissible. The cluster is shorter than
    /// requested when the policy runs out of candidates.
    pub fn draw_cluster<R: Rng + ?Sized>(
        &self,
        network: &SpatialNetwork,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if self.topology.requires_positions() {
            network.require_positions()?;
        }
        let pool: Vec<usize> = (0..network.num_patches()).collect();
        let cluster = self
            .topology
            .grow(network.adjacency(), network.positions(), &pool, self.build.size, rng)?;
        debug!(policy = %self.topology, size = cluster.len(), target = self.build.size, "cluster drawn");
        Ok(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ScoringConfig, ScoringMode};
    use crate::error::ClusterError;
    use rand::RngCore;

    #[test]
    fn test_default_is_valid() {
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_same_seed_same_stream() {
        let config = GeneratorConfig { seed: 42, ..Default::default() };
        assert_eq!(config.rng().next_u64(), config.rng().next_u64());
    }

    #[test]
    fn test_validate_reports_scoring_mismatch() {
        let mut config = GeneratorConfig::default();
        config.build.scoring = ScoringConfig { is_box: false, is_uniform: false, mode: ScoringMode::EnsureBox };
        assert!(matches!(
            config.validate(),
            Err(ClusterError::InconsistentScoringConfig { .. })
        ));
    }

    #[test]
    fn test_build_network_is_deterministic() {
        let config = GeneratorConfig {
            seed: 9,
            num_patches: 12,
            graph: GraphType::Lattice { connectivity: 0.5 },
            ..Default::default()
        };
        let a = config.build_network(&mut config.rng()).unwrap();
        let b = config.build_network(&mut config.rng()).unwrap();
        assert_eq!(a.adjacency(), b.adjacency());
        assert_eq!(a.num_patches(), 12);
    }

    #[test]
    fn test_build_network_accepts_any_rng() {
        let config = GeneratorConfig { num_patches: 9, ..Default::default() };
        let mut rng: Box<dyn RngCore> = Box::new(config.rng());
        let net = config.build_network(&mut *rng).unwrap();
        assert_eq!(net.num_patches(), 9);
    }

    #[test]
    fn test_draw_cluster_follows_topology() {
        let mut config = GeneratorConfig { seed: 5, num_patches: 16, ..Default::default() };
        config.build.size = 4;
        let mut rng = config.rng();
        let net = config.build_network(&mut rng).unwrap();

        config.topology = TopologyPolicy::Chain;
        let chain = config.draw_cluster(&net, &mut rng).unwrap();
        assert_eq!(chain.len(), 4);
        for pair in chain.windows(2) {
            assert!(net.adjacency().is_adjacent(pair[0], pair[1]));
        }

        config.topology = TopologyPolicy::Disconnected;
        let apart = config.draw_cluster(&net, &mut rng).unwrap();
        for (i, &a) in apart.iter().enumerate() {
            assert!(apart[i + 1..].iter().all(|&b| !net.adjacency().is_adjacent(a, b)));
        }
    }

    #[test]
    fn test_draw_cluster_position_box_needs_positions() {
        let config = GeneratorConfig { topology: TopologyPolicy::PositionBox, ..Default::default() };
        let net = SpatialNetwork::new(crate::network::AdjacencyMatrix::isolated(4));
        assert_eq!(
            config.draw_cluster(&net, &mut config.rng()),
            Err(ClusterError::MissingPositions)
        );
    }
}
