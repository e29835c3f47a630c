//! Boundary-condition roots.

use serde::{Deserialize, Serialize};

use crate::edge::{EdgeCategory, EdgeType};
use crate::id::EdgeId;
use crate::node::Coord;

/// Pairs a boundary node with the edge that bounds it.
///
/// For an arterial root `node` is the edge's FROM node (the inlet); for a
/// venous root it is the TO node (the outlet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub node: Coord,
    pub edge: EdgeId,
    pub kind: EdgeType,
}

impl Root {
    pub fn new(node: Coord, edge: EdgeId, kind: EdgeType) -> Self {
        Root { node, edge, kind }
    }

    pub fn category(&self) -> EdgeCategory {
        self.kind.category()
    }
}
