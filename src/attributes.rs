//! Per-patch quality and size generation.
//!
//! Quality values always lie in `[0, 1]`. The [`QualityScheme`] decides how
//! they are spread over the network:
//!
//! - `Manual`: taken verbatim, one per patch.
//! - `Random`: uniform in the configured bounds.
//! - `AutoCorrelation`: each patch pulls a uniform draw towards the mean of
//!   its already generated neighbours, then clamps into the bounds.
//! - `Gradient`: linear in the chosen position axis plus uniform noise.

use rand::Rng;

use crate::error::{ClusterError, Result};
use crate::network::{AdjacencyMatrix, Position};

/// Position axis a quality gradient runs along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum QualityAxis {
    /// Horizontal.
    #[default]
    X,
    /// Vertical.
    Y,
    /// Diagonal, `x + y`.
    XPlusY,
}

impl QualityAxis {
    fn project(self, p: &Position) -> f64 {
        match self {
            QualityAxis::X => p.x,
            QualityAxis::Y => p.y,
            QualityAxis::XPlusY => p.x + p.y,
        }
    }
}

/// How patch quality is generated.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum QualityScheme {
    /// One value per patch, each in `[0, 1]`.
    Manual(Vec<f64>),
    /// Uniform in the bounds.
    #[default]
    Random,
    /// Pull towards neighbouring quality; `1` copies the mean, `-1` mirrors away from it.
    AutoCorrelation {
        /// Strength of the pull, in `[-1, 1]`.
        auto_correlation: f64,
    },
    /// Linear ramp along `axis` plus uniform noise in `[0, fluctuation)`.
    Gradient {
        /// Axis of the ramp.
        axis: QualityAxis,
        /// Amplitude of the added noise.
        fluctuation: f64,
    },
}

/// Lower and upper quality bounds with `0 <= min <= max <= 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityBounds {
    /// Lowest generated quality.
    pub min: f64,
    /// Highest generated quality.
    pub max: f64,
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl QualityBounds {
    /// Reject bounds outside `[0, 1]` or with `min > max`.
    pub fn validate(&self) -> Result<()> {
        if (0.0..=1.0).contains(&self.min) && (0.0..=1.0).contains(&self.max) && self.min <= self.max {
            Ok(())
        } else {
            Err(ClusterError::invalid(format!(
                "quality bounds must satisfy 0 <= min <= max <= 1, got [{}, {}]",
                self.min, self.max
            )))
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Generate one quality value per patch.
///
/// `positions` is only needed by [`QualityScheme::Gradient`].
pub fn generate_patch_quality<R: Rng + ?Sized>(
    scheme: &QualityScheme,
    bounds: QualityBounds,
    adjacency: &AdjacencyMatrix,
    positions: Option<&[Position]>,
    rng: &mut R,
) -> Result<Vec<f64>> {
    bounds.validate()?;
    let n = adjacency.len();
    match scheme {
        QualityScheme::Manual(values) => {
            if values.len() != n {
                return Err(ClusterError::invalid(format!(
                    "{} manual quality values for {n} patches",
                    values.len()
                )));
            }
            if let Some(bad) = values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
                return Err(ClusterError::invalid(format!("patch quality {bad} outside [0, 1]")));
            }
            Ok(values.clone())
        }
        QualityScheme::Random => Ok((0..n).map(|_| rng.gen_range(bounds.min..=bounds.max)).collect()),
        QualityScheme::AutoCorrelation { auto_correlation } => {
            if !(-1.0..=1.0).contains(auto_correlation) {
                return Err(ClusterError::invalid(format!(
                    "auto_correlation must lie in [-1, 1], got {auto_correlation}"
                )));
            }
            let mut quality: Vec<f64> = Vec::with_capacity(n);
            for patch in 0..n {
                let draw: f64 = rng.gen();
                let earlier: Vec<f64> = adjacency
                    .neighbours(patch)
                    .iter()
                    .filter(|&&o| o < patch)
                    .map(|&o| quality[o])
                    .collect();
                let value = if earlier.is_empty() {
                    draw
                } else {
                    let mean = earlier.iter().sum::<f64>() / earlier.len() as f64;
                    draw + auto_correlation * (mean - draw)
                };
                quality.push(bounds.clamp(value));
            }
            Ok(quality)
        }
        QualityScheme::Gradient { axis, fluctuation } => {
            let positions = positions.ok_or(ClusterError::MissingPositions)?;
            if positions.len() != n {
                return Err(ClusterError::invalid(format!("{} positions for {n} patches", positions.len())));
            }
            let along: Vec<f64> = positions.iter().map(|p| axis.project(p)).collect();
            let lo = along.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = along.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if n > 0 && hi <= lo {
                return Err(ClusterError::invalid("no variation in positions along the gradient axis"));
            }
            let span = bounds.max - bounds.min;
            Ok(along
                .iter()
                .map(|&v| {
                    let ramp = bounds.min + (v - lo) * span / (hi - lo);
                    (ramp + fluctuation * rng.gen::<f64>()).clamp(0.0, 1.0)
                })
                .collect())
        }
    }
}

/// Patch sizes: `manual` verbatim (each in `[0, 1]`), otherwise uniform in `[min, max]`.
pub fn generate_patch_sizes<R: Rng + ?Sized>(
    num_patches: usize,
    min: f64,
    max: f64,
    manual: Option<&[f64]>,
    rng: &mut R,
) -> Result<Vec<f64>> {
    match manual {
        Some(sizes) if sizes.len() != num_patches => Err(ClusterError::invalid(format!(
            "{} manual patch sizes for {num_patches} patches",
            sizes.len()
        ))),
        Some(sizes) => match sizes.iter().find(|s| !(0.0..=1.0).contains(*s)) {
            Some(bad) => Err(ClusterError::invalid(format!("patch size {bad} outside [0, 1]"))),
            None => Ok(sizes.to_vec()),
        },
        None if min > max || min < 0.0 => Err(ClusterError::invalid(format!(
            "patch size range [{min}, {max}] is empty or negative"
        ))),
        None => Ok((0..num_patches).map(|_| rng.gen_range(min..=max)).collect()),
    }
}
