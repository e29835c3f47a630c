//! Graph nodes: lattice coordinates plus the mutable state the graph keeps
//! for each coordinate.
//!
//! A node is identified solely by its [`Coord`]. Two coordinates with the
//! same components are the same node; there is no separate node identity.
//! The per-node fields ([`NodeState`]) are owned by the graph and updated in
//! place.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer lattice coordinate identifying a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Coord { x, y, z }
    }

    /// Component-wise offset.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Coord {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl From<(i32, i32, i32)> for Coord {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Coord { x, y, z }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// Mutable state carried alongside a node's coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// The node's coordinate. Never changes after creation.
    pub coord: Coord,
    /// Blood pressure [mmHg]. NaN when disconnected from a solved component.
    pub pressure: f64,
    /// Oxygen partial pressure [mmHg]. NaN whenever `pressure` is NaN.
    pub oxygen: f64,
    /// Boundary condition flag (arterial inlet or venous outlet).
    pub is_root: bool,
    /// Dijkstra scratch: hop distance from the current search start.
    pub distance: u32,
    /// Dijkstra scratch: predecessor on the current shortest path.
    pub prev: Option<Coord>,
    /// Tick at which growth last touched this node.
    pub last_update: f64,
    /// Node is an end of a committed angiogenic sprout.
    pub is_sprout: bool,
}

impl NodeState {
    pub fn new(coord: Coord) -> Self {
        NodeState {
            coord,
            pressure: 0.0,
            oxygen: 0.0,
            is_root: false,
            distance: u32::MAX,
            prev: None,
            last_update: 0.0,
            is_sprout: false,
        }
    }

    /// Returns `true` if the node is cut off from circulation.
    pub fn is_disconnected(&self) -> bool {
        self.pressure.is_nan()
    }

    /// Clears the Dijkstra scratch fields.
    pub fn reset_search(&mut self) {
        self.distance = u32::MAX;
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_compare_by_value() {
        let a = Coord::new(1, 2, 0);
        let b: Coord = (1, 2, 0).into();
        assert_eq!(a, b);
        assert!(Coord::new(0, 9, 9) < Coord::new(1, 0, 0));
    }

    #[test]
    fn coord_display() {
        assert_eq!(Coord::new(3, -1, 2).to_string(), "(3,-1,2)");
    }

    #[test]
    fn offset_moves_each_axis() {
        assert_eq!(Coord::new(1, 1, 1).offset(1, -1, 0), Coord::new(2, 0, 1));
    }

    #[test]
    fn nan_pressure_means_disconnected() {
        let mut node = NodeState::new(Coord::new(0, 0, 0));
        assert!(!node.is_disconnected());
        node.pressure = f64::NAN;
        assert!(node.is_disconnected());
    }

    #[test]
    fn reset_search_clears_scratch() {
        let mut node = NodeState::new(Coord::new(0, 0, 0));
        node.distance = 3;
        node.prev = Some(Coord::new(1, 0, 0));
        node.reset_search();
        assert_eq!(node.distance, u32::MAX);
        assert_eq!(node.prev, None);
    }
}
