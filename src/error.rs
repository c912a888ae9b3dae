//! Error taxonomy for cluster construction, partitioning and habitat painting.
//!
//! Only genuine misconfiguration is an error. A cluster that could not reach
//! its target size, or a partition that fell short of its success threshold,
//! is an expected outcome and is reported through the returned flags instead.

use thiserror::Error;

use crate::builder::ScoringMode;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, ClusterError>;

/// Errors raised synchronously at the point of detection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    /// A topology policy name that is not one of the recognised policies.
    #[error("unknown cluster topology policy: {0:?}")]
    UnknownTopology(String),

    /// Box / uniform flags do not agree with the chosen combination mode.
    #[error(
        "inconsistent scoring configuration: mode {mode:?} with is_box={is_box}, is_uniform={is_uniform}"
    )]
    InconsistentScoringConfig {
        /// Combination mode that was requested.
        mode: ScoringMode,
        /// Whether box scoring was requested.
        is_box: bool,
        /// Whether uniformity scoring was requested.
        is_uniform: bool,
    },

    /// An explicit seed patch that is not part of the admissible pool.
    #[error("initial patch {patch} is not in the admissible pool")]
    InadmissibleInitialPatch {
        /// The rejected seed patch.
        patch: usize,
    },

    /// A cluster size that can never be met by the available patches.
    #[error("cluster size {size} exceeds the {available} available patches")]
    InfeasibleSize {
        /// Requested cluster size.
        size: usize,
        /// Number of patches that could have been used.
        available: usize,
    },

    /// Positional information was required but the network has none.
    #[error("patch positions are required for this operation")]
    MissingPositions,

    /// Population data was required but the network has none.
    #[error("a population array is required for uniformity scoring and analysis")]
    MissingPopulation,

    /// A manually specified adjacency matrix failed validation.
    #[error("invalid adjacency specification: {0}")]
    InvalidAdjacency(String),

    /// A configuration value outside its permitted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ClusterError {
    /// Create an [`ClusterError::InvalidParameter`] from any displayable message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}
