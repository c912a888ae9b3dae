//! Spatial network model: patches, positions, adjacency and population data.
//!
//! The baseline adjacency is produced by an [`AdjacencyProvider`]. Whatever the
//! provider returns is post-processed into a symmetric relation in which every
//! patch is adjacent to itself, so the cluster machinery never has to check
//! both directions or special-case the diagonal.
//!
//! # Invariants
//!
//! - [`AdjacencyMatrix`] is always symmetric and reflexive.
//! - Cached neighbour lists never contain the patch itself and are sorted.
//! - Positions and population rows, when present, have one entry per patch.

use rand::Rng;

use crate::error::{ClusterError, Result};

/// Patches closer than this (grid units) are lattice neighbours. Includes diagonals.
const LATTICE_RADIUS: f64 = 1.999;

// ─── Position ────────────────────────────────────────────────────────────────

/// Two-dimensional patch position.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// Horizontal coordinate (column on a grid layout).
    pub x: f64,
    /// Vertical coordinate (row on a grid layout).
    pub y: f64,
}

impl Position {
    /// Construct a position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Lay `num_patches` patches out on a near-square rectangular grid.
///
/// The grid has `ceil(sqrt(n))` rows and `ceil(n / rows)` columns; patch `i`
/// sits at column `i mod columns`, row `i div columns`.
pub fn grid_positions(num_patches: usize) -> Vec<Position> {
    if num_patches == 0 {
        return Vec::new();
    }
    let rows = (num_patches as f64).sqrt().ceil() as usize;
    let columns = num_patches.div_ceil(rows);
    (0..num_patches)
        .map(|p| Position::new((p % columns) as f64, (p / columns) as f64))
        .collect()
}

// ─── AdjacencyMatrix ─────────────────────────────────────────────────────────

/// Dense symmetric, reflexive adjacency relation over `N` patches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdjacencyMatrix {
    size: usize,
    cells: Vec<bool>,
    neighbours: Vec<Vec<usize>>,
}

impl AdjacencyMatrix {
    /// Network of `size` patches where each patch is adjacent only to itself.
    pub fn isolated(size: usize) -> Self {
        Self::from_fn(size, |_, _| false)
    }

    /// Build from a predicate; the result is symmetrised and made reflexive.
    pub fn from_fn(size: usize, mut is_edge: impl FnMut(usize, usize) -> bool) -> Self {
        let mut cells = vec![false; size * size];
        for i in 0..size {
            for j in 0..size {
                if is_edge(i, j) {
                    cells[i * size + j] = true;
                    cells[j * size + i] = true;
                }
            }
        }
        Self::finish(size, cells)
    }

    /// Build from an undirected edge list.
    ///
    /// Returns [`ClusterError::InvalidAdjacency`] if an endpoint is out of range.
    pub fn from_edges(
        size: usize,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self> {
        let mut cells = vec![false; size * size];
        for (a, b) in edges {
            if a >= size || b >= size {
                return Err(ClusterError::InvalidAdjacency(format!(
                    "edge ({a}, {b}) references a patch outside 0..{size}"
                )));
            }
            cells[a * size + b] = true;
            cells[b * size + a] = true;
        }
        Ok(Self::finish(size, cells))
    }

    /// Strictly validate a manually specified 0/1 matrix.
    ///
    /// Every row must have `rows.len()` entries, every entry must be 0 or 1,
    /// the matrix must be symmetric and the diagonal must be all ones.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        let size = rows.len();
        let mut cells = vec![false; size * size];
        for (x, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(ClusterError::InvalidAdjacency(format!(
                    "row {x} has {} columns, expected {size}",
                    row.len()
                )));
            }
            for (y, &value) in row.iter().enumerate() {
                if value > 1 {
                    return Err(ClusterError::InvalidAdjacency(format!(
                        "entry ({x}, {y}) is {value}; values must be 0 or 1"
                    )));
                }
                cells[x * size + y] = value == 1;
            }
            if row[x] != 1 {
                return Err(ClusterError::InvalidAdjacency(format!(
                    "diagonal entry ({x}, {x}) must be 1"
                )));
            }
        }
        for x in 0..size {
            for y in (x + 1)..size {
                if cells[x * size + y] != cells[y * size + x] {
                    return Err(ClusterError::InvalidAdjacency(format!(
                        "matrix is not symmetric at ({x}, {y})"
                    )));
                }
            }
        }
        Ok(Self::finish(size, cells))
    }

    fn finish(size: usize, mut cells: Vec<bool>) -> Self {
        for i in 0..size {
            cells[i * size + i] = true;
        }
        let neighbours = (0..size)
            .map(|i| (0..size).filter(|&j| j != i && cells[i * size + j]).collect())
            .collect();
        Self { size, cells, neighbours }
    }

    /// Number of patches.
    pub fn len(&self) -> usize {
        self.size
    }

    /// True for a network with no patches.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether `a` and `b` are adjacent. Always true for `a == b`.
    ///
    /// # Panics
    ///
    /// If either index is out of range.
    pub fn is_adjacent(&self, a: usize, b: usize) -> bool {
        self.cells[a * self.size + b]
    }

    /// Sorted neighbours of `patch`, excluding the patch itself.
    pub fn neighbours(&self, patch: usize) -> &[usize] {
        &self.neighbours[patch]
    }

    /// How many of `members` are adjacent to `patch`.
    pub fn adjacent_count(&self, patch: usize, members: &[usize]) -> usize {
        members.iter().filter(|&&m| self.is_adjacent(patch, m)).count()
    }

    /// Dense 0/1 rows, diagonal included.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        (0..self.size)
            .map(|i| (0..self.size).map(|j| u8::from(self.is_adjacent(i, j))).collect())
            .collect()
    }
}

// ─── AdjacencyProvider ───────────────────────────────────────────────────────

/// Source of a baseline adjacency matrix for a set of patch positions.
pub trait AdjacencyProvider {
    /// Produce the adjacency for `positions.len()` patches.
    fn adjacency<R: Rng + ?Sized>(
        &self,
        positions: &[Position],
        rng: &mut R,
    ) -> Result<AdjacencyMatrix>;
}

/// Built-in baseline graph families.
///
/// Richer random-graph families (small-world, scale-free, power-law cluster)
/// are expected to come from an external graph library through
/// [`AdjacencyProvider`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GraphType {
    /// Explicit 0/1 matrix, validated by [`AdjacencyMatrix::from_rows`].
    Manual(Vec<Vec<u8>>),
    /// Grid neighbours (diagonals included), each kept with probability `connectivity`.
    Lattice {
        /// Probability that a geometric neighbour pair is connected.
        connectivity: f64,
    },
    /// Each patch adjacent to its predecessor and successor by index.
    Line,
    /// Every patch adjacent to patch 0 only.
    Star,
    /// Erdős–Rényi graph with edge probability `connectivity`.
    Random {
        /// Probability that any pair is connected.
        connectivity: f64,
    },
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(ClusterError::invalid(format!("{name} must lie in [0, 1], got {p}")))
    }
}

impl AdjacencyProvider for GraphType {
    fn adjacency<R: Rng + ?Sized>(
        &self,
        positions: &[Position],
        rng: &mut R,
    ) -> Result<AdjacencyMatrix> {
        let n = positions.len();
        match self {
            GraphType::Manual(rows) => {
                if rows.len() != n {
                    return Err(ClusterError::InvalidAdjacency(format!(
                        "manual matrix has {} rows for {n} patches",
                        rows.len()
                    )));
                }
                AdjacencyMatrix::from_rows(rows)
            }
            GraphType::Lattice { connectivity } => {
                check_probability("lattice connectivity", *connectivity)?;
                let mut edges = Vec::new();
                for a in 0..n {
                    for b in (a + 1)..n {
                        if positions[a].distance(&positions[b]) < LATTICE_RADIUS
                            && rng.gen_bool(*connectivity)
                        {
                            edges.push((a, b));
                        }
                    }
                }
                AdjacencyMatrix::from_edges(n, edges)
            }
            GraphType::Line => AdjacencyMatrix::from_edges(n, (1..n).map(|x| (x - 1, x))),
            GraphType::Star => AdjacencyMatrix::from_edges(n, (1..n).map(|x| (0, x))),
            GraphType::Random { connectivity } => {
                check_probability("random connectivity", *connectivity)?;
                let mut edges = Vec::new();
                for a in 0..n {
                    for b in 0..a {
                        if rng.gen_bool(*connectivity) {
                            edges.push((a, b));
                        }
                    }
                }
                AdjacencyMatrix::from_edges(n, edges)
            }
        }
    }
}

// ─── PopulationArray ─────────────────────────────────────────────────────────

/// Per-patch, per-species population values (rows = patches, columns = species).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawPopulationArray"))]
pub struct PopulationArray {
    num_patches: usize,
    num_species: usize,
    values: Vec<f64>,
}

/// Unchecked wire form; deserialisation goes through [`PopulationArray::new`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawPopulationArray {
    num_patches: usize,
    num_species: usize,
    values: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawPopulationArray> for PopulationArray {
    type Error = ClusterError;

    fn try_from(raw: RawPopulationArray) -> Result<Self> {
        Self::new(raw.num_patches, raw.num_species, raw.values)
    }
}

impl PopulationArray {
    /// Wrap a row-major buffer of `num_patches * num_species` values.
    pub fn new(num_patches: usize, num_species: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != num_patches * num_species {
            return Err(ClusterError::invalid(format!(
                "population buffer has {} values, expected {num_patches} x {num_species}",
                values.len()
            )));
        }
        Ok(Self { num_patches, num_species, values })
    }

    /// Build from one row per patch; all rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let num_species = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * num_species);
        for (p, row) in rows.iter().enumerate() {
            if row.len() != num_species {
                return Err(ClusterError::invalid(format!(
                    "population row {p} has {} species, expected {num_species}",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        Self::new(rows.len(), num_species, values)
    }

    /// Number of patch rows.
    pub fn num_patches(&self) -> usize {
        self.num_patches
    }

    /// Number of species columns.
    pub fn num_species(&self) -> usize {
        self.num_species
    }

    /// Population of `species` at `patch`.
    pub fn value(&self, patch: usize, species: usize) -> f64 {
        self.values[patch * self.num_species + species]
    }

    /// All species values for `patch`.
    pub fn row(&self, patch: usize) -> &[f64] {
        &self.values[patch * self.num_species..(patch + 1) * self.num_species]
    }

    /// Sum over the first `num_species` species of `|pop[a] - pop[b]|`.
    pub fn difference(&self, a: usize, b: usize, num_species: usize) -> f64 {
        self.row(a)
            .iter()
            .zip(self.row(b))
            .take(num_species)
            .map(|(x, y)| (x - y).abs())
            .sum()
    }

    /// Copy with every species column divided by its maximum.
    ///
    /// Columns whose maximum is not positive are left as they are.
    pub fn normalised(&self) -> Self {
        let mut values = self.values.clone();
        for s in 0..self.num_species {
            let max = (0..self.num_patches)
                .map(|p| self.value(p, s))
                .fold(f64::NEG_INFINITY, f64::max);
            if max > 0.0 {
                for p in 0..self.num_patches {
                    values[p * self.num_species + s] /= max;
                }
            }
        }
        Self { num_patches: self.num_patches, num_species: self.num_species, values }
    }
}

// ─── SpatialNetwork ──────────────────────────────────────────────────────────

/// Read-only view of one patch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Patch<'a> {
    /// Index in `0..N`.
    pub index: usize,
    /// Position, if the network carries positions.
    pub position: Option<Position>,
    /// Population row, if the network carries populations.
    pub population: Option<&'a [f64]>,
}

/// Adjacency plus the optional per-patch data the cluster algorithms consume.
#[derive(Clone, Debug)]
pub struct SpatialNetwork {
    adjacency: AdjacencyMatrix,
    positions: Option<Vec<Position>>,
    populations: Option<PopulationArray>,
    normalised_populations: Option<PopulationArray>,
}

impl SpatialNetwork {
    /// Network with adjacency only.
    pub fn new(adjacency: AdjacencyMatrix) -> Self {
        Self { adjacency, positions: None, populations: None, normalised_populations: None }
    }

    /// Lay patches on a grid and ask `provider` for their adjacency.
    pub fn generate<P, R>(num_patches: usize, provider: &P, rng: &mut R) -> Result<Self>
    where
        P: AdjacencyProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let positions = grid_positions(num_patches);
        let adjacency = provider.adjacency(&positions, rng)?;
        Self::new(adjacency).with_positions(positions)
    }

    /// Attach positions; one per patch.
    pub fn with_positions(mut self, positions: Vec<Position>) -> Result<Self> {
        if positions.len() != self.num_patches() {
            return Err(ClusterError::invalid(format!(
                "{} positions for {} patches",
                positions.len(),
                self.num_patches()
            )));
        }
        self.positions = Some(positions);
        Ok(self)
    }

    /// Attach populations; the normalised copy is computed once here.
    pub fn with_populations(mut self, populations: PopulationArray) -> Result<Self> {
        if populations.num_patches() != self.num_patches() {
            return Err(ClusterError::invalid(format!(
                "population array has {} rows for {} patches",
                populations.num_patches(),
                self.num_patches()
            )));
        }
        self.normalised_populations = Some(populations.normalised());
        self.populations = Some(populations);
        Ok(self)
    }

    /// Number of patches.
    pub fn num_patches(&self) -> usize {
        self.adjacency.len()
    }

    /// The adjacency relation.
    pub fn adjacency(&self) -> &AdjacencyMatrix {
        &self.adjacency
    }

    /// Patch positions, if any.
    pub fn positions(&self) -> Option<&[Position]> {
        self.positions.as_deref()
    }

    /// Raw or normalised populations, if any.
    pub fn populations(&self, normalised: bool) -> Option<&PopulationArray> {
        if normalised {
            self.normalised_populations.as_ref()
        } else {
            self.populations.as_ref()
        }
    }

    /// Positions, or [`ClusterError::MissingPositions`].
    pub fn require_positions(&self) -> Result<&[Position]> {
        self.positions().ok_or(ClusterError::MissingPositions)
    }

    /// Populations, or [`ClusterError::MissingPopulation`].
    pub fn require_populations(&self, normalised: bool) -> Result<&PopulationArray> {
        self.populations(normalised).ok_or(ClusterError::MissingPopulation)
    }

    /// View of patch `index`, or `None` if out of range.
    pub fn patch(&self, index: usize) -> Option<Patch<'_>> {
        (index < self.num_patches()).then(|| Patch {
            index,
            position: self.positions.as_ref().map(|p| p[index]),
            population: self.populations.as_ref().map(|p| p.row(index)),
        })
    }
}
