//! Collaborators the engine consults but does not own.
//!
//! # Architecture
//!
//! The drivers see the tissue only through three traits:
//!
//! - [`Lattice`] maps graph coordinates to voxel spans, lattice locations and
//!   physical lengths, and enumerates the directions a sprout may take.
//! - [`AgentGrid`] reports the coarse category of the cells occupying a set
//!   of locations.
//! - [`ScalarField`] samples a growth-factor concentration at a voxel.
//!
//! [`CubicLattice`], [`OccupancyGrid`], [`GridField`] and [`UniformField`] are
//! small reference implementations used by the CLI and tests. Real lattice
//! geometry and the agent simulation live outside this crate.

use std::fmt;

use angio_core::{Coord, EdgeLevel};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// A discretized lattice location grouping one or more voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Location { x, y, z }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Lattice
// ---------------------------------------------------------------------------

/// Geometry of the tissue the graph is embedded in.
pub trait Lattice {
    /// Number of candidate sprout directions.
    fn direction_count(&self) -> usize;

    /// The coordinate one step from `node` in direction `dir`, scaled by
    /// `level`. `None` for an unknown direction.
    fn offset(&self, node: Coord, dir: usize, level: EdgeLevel) -> Option<Coord>;

    /// Whether `coord` lies inside the lattice bounds.
    fn contains(&self, coord: Coord) -> bool;

    /// Voxels covered by the straight segment from `from` to `to`, both ends
    /// included.
    fn span(&self, from: Coord, to: Coord) -> Vec<Coord>;

    /// The location holding `voxel`.
    fn location(&self, voxel: Coord) -> Location;

    /// Physical length [um] of an edge between two coordinates.
    fn edge_length(&self, from: Coord, to: Coord) -> f64;

    /// The direction index pointing from `from` toward `to`, if the two are
    /// aligned with one of the lattice directions.
    fn direction_between(&self, from: Coord, to: Coord) -> Option<usize>;

    /// Physical size [um] of one lattice step.
    fn grid_size(&self) -> f64;
}

/// Lattice dimensions and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeConfig {
    pub width: i32,
    pub length: i32,
    #[serde(default = "default_height")]
    pub height: i32,
    /// Physical size [um] of one lattice step.
    pub grid_size: f64,
    /// Voxels per location along each axis.
    #[serde(default = "default_patch_size")]
    pub patch_size: i32,
}

fn default_height() -> i32 {
    1
}

fn default_patch_size() -> i32 {
    1
}

impl Default for LatticeConfig {
    fn default() -> Self {
        LatticeConfig {
            width: 100,
            length: 100,
            height: 1,
            grid_size: 30.0,
            patch_size: 1,
        }
    }
}

const CUBIC_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Axis-aligned lattice with six neighbour directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicLattice {
    config: LatticeConfig,
}

impl CubicLattice {
    pub fn new(config: LatticeConfig) -> Self {
        CubicLattice { config }
    }

    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }
}

impl Default for CubicLattice {
    fn default() -> Self {
        CubicLattice::new(LatticeConfig::default())
    }
}

impl Lattice for CubicLattice {
    fn direction_count(&self) -> usize {
        CUBIC_OFFSETS.len()
    }

    fn offset(&self, node: Coord, dir: usize, level: EdgeLevel) -> Option<Coord> {
        let (dx, dy, dz) = *CUBIC_OFFSETS.get(dir)?;
        let s = level.scale();
        Some(node.offset(dx * s, dy * s, dz * s))
    }

    fn contains(&self, coord: Coord) -> bool {
        let c = &self.config;
        (0..c.width).contains(&coord.x)
            && (0..c.length).contains(&coord.y)
            && (0..c.height).contains(&coord.z)
    }

    fn span(&self, from: Coord, to: Coord) -> Vec<Coord> {
        let (dx, dy, dz) = (to.x - from.x, to.y - from.y, to.z - from.z);
        let steps = dx.abs().max(dy.abs()).max(dz.abs());
        if steps == 0 {
            return vec![from];
        }
        let lerp = |start: i32, delta: i32, i: i32| {
            start + (f64::from(delta) * f64::from(i) / f64::from(steps)).round() as i32
        };
        (0..=steps)
            .map(|i| Coord::new(lerp(from.x, dx, i), lerp(from.y, dy, i), lerp(from.z, dz, i)))
            .collect()
    }

    fn location(&self, voxel: Coord) -> Location {
        let p = self.config.patch_size.max(1);
        Location::new(voxel.x.div_euclid(p), voxel.y.div_euclid(p), voxel.z.div_euclid(p))
    }

    fn edge_length(&self, from: Coord, to: Coord) -> f64 {
        let d = |a: i32, b: i32| f64::from(b - a).powi(2);
        (d(from.x, to.x) + d(from.y, to.y) + d(from.z, to.z)).sqrt() * self.config.grid_size
    }

    fn direction_between(&self, from: Coord, to: Coord) -> Option<usize> {
        let delta = (
            (to.x - from.x).signum(),
            (to.y - from.y).signum(),
            (to.z - from.z).signum(),
        );
        CUBIC_OFFSETS.iter().position(|&o| o == delta)
    }

    fn grid_size(&self) -> f64 {
        self.config.grid_size
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Coarse cell type, as far as the vasculature cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellCategory {
    Healthy,
    Cancerous,
    Other,
}

/// Read-only view of the cells occupying the lattice.
pub trait AgentGrid {
    /// Categories of every cell at any of `locations`.
    fn categories_at(&self, locations: &[Location]) -> Vec<CellCategory>;
}

/// A cell placed at a location, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub location: Location,
    pub category: CellCategory,
}

/// Location-keyed cell occupancy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccupancyGrid {
    cells: IndexMap<Location, Vec<CellCategory>>,
}

impl OccupancyGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[AgentSpec]) -> Self {
        let mut grid = Self::new();
        for spec in specs {
            grid.place(spec.location, spec.category);
        }
        grid
    }

    pub fn place(&mut self, location: Location, category: CellCategory) {
        self.cells.entry(location).or_default().push(category);
    }

    /// Removes every cell at `location`.
    pub fn clear(&mut self, location: Location) {
        self.cells.shift_remove(&location);
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AgentGrid for OccupancyGrid {
    fn categories_at(&self, locations: &[Location]) -> Vec<CellCategory> {
        let unique: IndexSet<&Location> = locations.iter().collect();
        unique
            .into_iter()
            .filter_map(|loc| self.cells.get(loc))
            .flatten()
            .copied()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Scalar fields
// ---------------------------------------------------------------------------

/// A concentration field sampled per voxel.
pub trait ScalarField {
    fn value_at(&self, voxel: Coord) -> f64;
}

/// The same value everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformField(pub f64);

impl ScalarField for UniformField {
    fn value_at(&self, _voxel: Coord) -> f64 {
        self.0
    }
}

/// A voxel value written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldPoint {
    pub voxel: Coord,
    pub value: f64,
}

/// Sparse per-voxel values over a uniform background.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridField {
    #[serde(default)]
    pub background: f64,
    #[serde(default)]
    pub points: Vec<FieldPoint>,
    #[serde(skip)]
    values: IndexMap<Coord, f64>,
}

impl GridField {
    pub fn new(background: f64) -> Self {
        GridField {
            background,
            ..Self::default()
        }
    }

    /// Sets the value at one voxel.
    pub fn set(&mut self, voxel: Coord, value: f64) {
        self.values.insert(voxel, value);
    }

    /// Builds the lookup table from the configured points.
    pub fn indexed(mut self) -> Self {
        self.values = self.points.iter().map(|p| (p.voxel, p.value)).collect();
        self
    }
}

impl ScalarField for GridField {
    fn value_at(&self, voxel: Coord) -> f64 {
        self.values.get(&voxel).copied().unwrap_or(self.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> CubicLattice {
        CubicLattice::new(LatticeConfig {
            width: 10,
            length: 10,
            height: 1,
            grid_size: 30.0,
            patch_size: 2,
        })
    }

    #[test]
    fn offsets_scale_with_level() {
        let l = lattice();
        let c = Coord::new(4, 4, 0);
        assert_eq!(l.offset(c, 0, EdgeLevel::Variable), Some(Coord::new(5, 4, 0)));
        assert_eq!(l.offset(c, 3, EdgeLevel::Level2), Some(Coord::new(4, 2, 0)));
        assert_eq!(l.offset(c, 6, EdgeLevel::Variable), None);
    }

    #[test]
    fn bounds() {
        let l = lattice();
        assert!(l.contains(Coord::new(0, 9, 0)));
        assert!(!l.contains(Coord::new(10, 0, 0)));
        assert!(!l.contains(Coord::new(0, 0, 1)));
        assert!(!l.contains(Coord::new(-1, 0, 0)));
    }

    #[test]
    fn span_is_inclusive() {
        let l = lattice();
        let span = l.span(Coord::new(1, 1, 0), Coord::new(4, 1, 0));
        assert_eq!(span.len(), 4);
        assert_eq!(span.first(), Some(&Coord::new(1, 1, 0)));
        assert_eq!(span.last(), Some(&Coord::new(4, 1, 0)));
        assert_eq!(l.span(Coord::new(2, 2, 0), Coord::new(2, 2, 0)).len(), 1);
    }

    #[test]
    fn locations_group_by_patch() {
        let l = lattice();
        assert_eq!(l.location(Coord::new(3, 2, 0)), Location::new(1, 1, 0));
        assert_eq!(l.location(Coord::new(-1, 0, 0)), Location::new(-1, 0, 0));
    }

    #[test]
    fn lengths_and_directions() {
        let l = lattice();
        let a = Coord::new(1, 1, 0);
        assert_eq!(l.edge_length(a, Coord::new(3, 1, 0)), 60.0);
        assert_eq!(l.direction_between(a, Coord::new(3, 1, 0)), Some(0));
        assert_eq!(l.direction_between(a, Coord::new(1, 0, 0)), Some(3));
        assert_eq!(l.direction_between(a, Coord::new(2, 2, 0)), None);
    }

    #[test]
    fn occupancy_deduplicates_locations() {
        let mut grid = OccupancyGrid::new();
        let loc = Location::new(1, 1, 0);
        grid.place(loc, CellCategory::Healthy);
        grid.place(loc, CellCategory::Cancerous);
        let cats = grid.categories_at(&[loc, loc, Location::new(5, 5, 0)]);
        assert_eq!(cats, vec![CellCategory::Healthy, CellCategory::Cancerous]);

        grid.clear(loc);
        assert!(grid.is_empty());
    }

    #[test]
    fn grid_field_falls_back_to_background() {
        let mut field = GridField::new(0.5);
        field.set(Coord::new(1, 0, 0), 3.0);
        assert_eq!(field.value_at(Coord::new(1, 0, 0)), 3.0);
        assert_eq!(field.value_at(Coord::new(2, 0, 0)), 0.5);
        assert_eq!(UniformField(2.0).value_at(Coord::new(9, 9, 9)), 2.0);
    }

    #[test]
    fn grid_field_from_json() {
        let json = r#"{"background": 1.0, "points": [{"voxel": {"x": 2, "y": 0, "z": 0}, "value": 7.0}]}"#;
        let field: GridField = serde_json::from_str(json).unwrap();
        let field = field.indexed();
        assert_eq!(field.value_at(Coord::new(2, 0, 0)), 7.0);
        assert_eq!(field.value_at(Coord::new(0, 0, 0)), 1.0);
    }
}
