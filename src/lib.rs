//! # patchnet
//!
//! Cluster construction over synthetic spatial patch networks.
//!
//! A network is a set of habitat patches with a symmetric adjacency relation,
//! optional grid positions and optional per-species population values. This
//! crate grows clusters of patches on such networks, tiles whole networks
//! into uniform clusters, measures how different adjacent clusters are, and
//! paints habitat types onto shaped clusters.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! GraphType ──► SpatialNetwork ──► TopologyPolicy ──► HabitatClusterAssigner
//!                     │                                     (habitat map)
//!                     ├──► GreedyClusterBuilder  (one cluster)
//!                     └──► NetworkPartitioner ──► analyze_partition
//!                               (whole network)      (cluster differences)
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`network`] | [`SpatialNetwork`], [`AdjacencyMatrix`], [`GraphType`] | Patches, adjacency, positions, populations |
//! | [`topology`] | [`TopologyPolicy`] | Admissible next elements for a growing cluster |
//! | [`builder`] | [`GreedyClusterBuilder`] | Box / uniformity scored greedy growth of one cluster |
//! | [`partition`] | [`NetworkPartitioner`], [`Partition`] | Tile the whole network into clusters |
//! | [`analysis`] | [`PartitionStats`] | Differences between adjacent clusters |
//! | [`habitat`] | [`HabitatClusterAssigner`] | Habitat painting, including the chessboard pattern |
//! | [`attributes`] | [`QualityScheme`] | Patch quality and size generation |
//! | [`config`] | [`GeneratorConfig`] | One seeded configuration for a whole pass |
//!
//! ## Randomness
//!
//! Every randomised operation takes `&mut R` where `R: rand::Rng + ?Sized`.
//! Seed a `rand_chacha::ChaCha8Rng` for reproducible output.
//!
//! ## Features
//!
//! - `serde`: `Serialize` / `Deserialize` on configuration and output types.
//! - `python-ffi`: PyO3 extension module `patchnet`.
//!
//! ## License
//!
//! Business Source License 1.1.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod analysis;
pub mod attributes;
pub mod builder;
pub mod config;
pub mod error;
pub mod habitat;
pub mod network;
pub mod partition;
pub mod topology;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use analysis::{analyze_clusters, analyze_partition, PartitionStats};
pub use attributes::{generate_patch_quality, generate_patch_sizes, QualityAxis, QualityBounds, QualityScheme};
pub use builder::{BuildOutcome, ClusterBuildConfig, GreedyClusterBuilder, ScoringConfig, ScoringMode};
pub use config::GeneratorConfig;
pub use error::{ClusterError, Result};
pub use habitat::{
    assign_habitats_autocorrelated, validate_manual_habitats, ChessboardOptions, ClusterSizes,
    HabitatAssignment, HabitatCluster, HabitatClusterAssigner, HabitatClusterConfig, HabitatPattern,
};
pub use network::{
    grid_positions, AdjacencyMatrix, AdjacencyProvider, GraphType, Patch, PopulationArray, Position,
    SpatialNetwork,
};
pub use partition::{NetworkPartitioner, Partition, PartitionConfig, PartitionOutcome};
pub use topology::TopologyPolicy;
