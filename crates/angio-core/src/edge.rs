//! Vessel edges: the directed segments of the vascular graph.
//!
//! A [`Vessel`] owns its geometry (radius, wall, length), its classification
//! ([`EdgeType`], [`EdgeLevel`]), the hemodynamic quantities derived by the
//! solver, and a set of status flags. It also carries two denormalized link
//! lists of neighbouring edges: `edges_in` (edges flowing into this edge's
//! FROM node) and `edges_out` (edges flowing out of this edge's TO node).
//! The link lists are maintained by [`VesselGraph`](crate::graph::VesselGraph)
//! and are read-only to everything else.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::EdgeId;
use crate::node::Coord;

/// Inline storage for edge link lists. Branching degree rarely exceeds two.
pub type EdgeLinks = SmallVec<[EdgeId; 4]>;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Coarse vessel category used by boundary conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeCategory {
    Artery,
    Capillary,
    Vein,
}

impl EdgeCategory {
    /// Sign applied to the radius in the root pressure relation.
    pub fn sign(self) -> f64 {
        match self {
            EdgeCategory::Artery => -1.0,
            EdgeCategory::Capillary => 0.0,
            EdgeCategory::Vein => 1.0,
        }
    }
}

/// Vessel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Arteriole,
    Artery,
    Capillary,
    Venule,
    Vein,
    Connector,
}

impl EdgeType {
    pub fn category(self) -> EdgeCategory {
        match self {
            EdgeType::Arteriole | EdgeType::Artery => EdgeCategory::Artery,
            EdgeType::Venule | EdgeType::Vein => EdgeCategory::Vein,
            EdgeType::Capillary | EdgeType::Connector => EdgeCategory::Capillary,
        }
    }

    /// Parses a root letter (`A` for artery, `V` for vein), ignoring case.
    pub fn from_code(code: &str) -> Option<EdgeType> {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => Some(EdgeType::Artery),
            "V" => Some(EdgeType::Vein),
            _ => None,
        }
    }
}

/// Graph resolution tier. The scale multiplies lattice offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EdgeLevel {
    #[default]
    Variable,
    Level1,
    Level2,
}

impl EdgeLevel {
    pub fn scale(self) -> i32 {
        match self {
            EdgeLevel::Variable => 1,
            EdgeLevel::Level1 => 4,
            EdgeLevel::Level2 => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Vessel
// ---------------------------------------------------------------------------

/// A directed vessel segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub from: Coord,
    pub to: Coord,
    pub kind: EdgeType,
    pub level: EdgeLevel,

    /// Internal radius [um].
    pub radius: f64,
    /// Wall thickness [um].
    pub wall: f64,
    /// Segment length [um].
    pub length: f64,

    /// Wall shear stress [mmHg].
    pub shear: f64,
    /// Shear min-max scaled across the graph to [0, 1].
    pub shear_scaled: f64,
    /// Circumferential wall stress [mmHg].
    pub circum: f64,
    /// Volumetric flow rate [um^3/min].
    pub flow: f64,
    /// Exchange surface area [um^2].
    pub area: f64,

    pub is_root: bool,
    pub is_ignored: bool,
    pub is_visited: bool,
    pub is_perfused: bool,
    pub is_angiogenic: bool,

    pub(crate) edges_in: EdgeLinks,
    pub(crate) edges_out: EdgeLinks,
}

impl Vessel {
    pub fn new(from: Coord, to: Coord, kind: EdgeType) -> Self {
        Vessel {
            from,
            to,
            kind,
            level: EdgeLevel::Variable,
            radius: 0.0,
            wall: 0.0,
            length: 0.0,
            shear: 0.0,
            shear_scaled: 0.0,
            circum: 0.0,
            flow: 0.0,
            area: 0.0,
            is_root: false,
            is_ignored: false,
            is_visited: false,
            is_perfused: false,
            is_angiogenic: false,
            edges_in: EdgeLinks::new(),
            edges_out: EdgeLinks::new(),
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_wall(mut self, wall: f64) -> Self {
        self.wall = wall;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_level(mut self, level: EdgeLevel) -> Self {
        self.level = level;
        self
    }

    pub fn category(&self) -> EdgeCategory {
        self.kind.category()
    }

    /// Edges flowing into this edge's FROM node.
    pub fn edges_in(&self) -> &[EdgeId] {
        &self.edges_in
    }

    /// Edges flowing out of this edge's TO node.
    pub fn edges_out(&self) -> &[EdgeId] {
        &self.edges_out
    }

    /// Swaps endpoints and link lists. Link contents are rebuilt by the
    /// graph after the swap.
    pub(crate) fn flip(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
        self.edges_in.clear();
        self.edges_out.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_and_signs() {
        assert_eq!(EdgeType::Arteriole.category(), EdgeCategory::Artery);
        assert_eq!(EdgeType::Venule.category(), EdgeCategory::Vein);
        assert_eq!(EdgeType::Connector.category(), EdgeCategory::Capillary);
        assert_eq!(EdgeCategory::Artery.sign(), -1.0);
        assert_eq!(EdgeCategory::Capillary.sign(), 0.0);
        assert_eq!(EdgeCategory::Vein.sign(), 1.0);
    }

    #[test]
    fn root_codes_parse_case_insensitively() {
        assert_eq!(EdgeType::from_code("a"), Some(EdgeType::Artery));
        assert_eq!(EdgeType::from_code(" V "), Some(EdgeType::Vein));
        assert_eq!(EdgeType::from_code("X"), None);
    }

    #[test]
    fn level_scales() {
        assert_eq!(EdgeLevel::Variable.scale(), 1);
        assert_eq!(EdgeLevel::Level1.scale(), 4);
        assert_eq!(EdgeLevel::Level2.scale(), 2);
    }

    #[test]
    fn builder_sets_geometry() {
        let v = Vessel::new(Coord::new(0, 0, 0), Coord::new(1, 0, 0), EdgeType::Capillary)
            .with_radius(5.0)
            .with_wall(1.5)
            .with_length(10.0)
            .with_level(EdgeLevel::Level2);
        assert_eq!(v.radius, 5.0);
        assert_eq!(v.wall, 1.5);
        assert_eq!(v.length, 10.0);
        assert_eq!(v.level, EdgeLevel::Level2);
        assert!(v.edges_in().is_empty());
        assert!(v.edges_out().is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let v = Vessel::new(Coord::new(0, 0, 0), Coord::new(0, 1, 0), EdgeType::Vein).with_radius(7.0);
        let json = serde_json::to_string(&v).unwrap();
        let back: Vessel = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
