//! VesselGraph: the directed multigraph of vessel segments.
//!
//! [`VesselGraph`] owns every [`Vessel`] in an arena keyed by stable
//! [`EdgeId`]s and keeps, for every coordinate that touches at least one
//! edge, a node record with its [`NodeState`] and its in/out edge lists.
//!
//! # Architecture
//!
//! Three structures are kept in sync by every mutation:
//! - **Edge arena** (`BTreeMap<EdgeId, Vessel>`): owns edge data. Ordered by
//!   id so that every sweep over the edges runs in creation order.
//! - **Node map** (`IndexMap<Coord, NodeEntry>`): per-coordinate state plus
//!   the out-set and in-set of the node. A coordinate with no edges is
//!   removed from the map, so node existence is implicit in the edges.
//! - **Edge links** (`Vessel::edges_in` / `Vessel::edges_out`): denormalized
//!   neighbour lists on each edge, updated in O(local degree) on add, remove
//!   and reverse.
//!
//! Coordinates are compared by value, so two edges that name the same
//! coordinate always share one node record and see each other's links.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use crate::edge::{EdgeLinks, Vessel};
use crate::error::CoreError;
use crate::id::EdgeId;
use crate::node::{Coord, NodeState};

/// Per-coordinate record: node state plus incident edge lists.
#[derive(Debug, Clone)]
struct NodeEntry {
    state: NodeState,
    outgoing: EdgeLinks,
    incoming: EdgeLinks,
}

impl NodeEntry {
    fn new(state: NodeState) -> Self {
        NodeEntry {
            state,
            outgoing: EdgeLinks::new(),
            incoming: EdgeLinks::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty()
    }
}

/// Directed vessel graph with bidirectional adjacency.
#[derive(Debug, Clone, Default)]
pub struct VesselGraph {
    edges: BTreeMap<EdgeId, Vessel>,
    nodes: IndexMap<Coord, NodeEntry>,
    next_edge_id: u32,
}

impl VesselGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Edge mutation
    // -----------------------------------------------------------------------

    /// Adds an edge and links it to its neighbours.
    ///
    /// Any link lists carried by `vessel` are discarded and rebuilt. Returns
    /// `InvalidEdge` for a self-loop.
    pub fn add_edge(&mut self, mut vessel: Vessel) -> Result<EdgeId, CoreError> {
        if vessel.from == vessel.to {
            return Err(CoreError::InvalidEdge {
                reason: format!("self-loop at {}", vessel.from),
            });
        }

        let id = self.allocate_id();
        vessel.edges_in.clear();
        vessel.edges_out.clear();
        self.edges.insert(id, vessel);
        self.attach(id);
        self.link(id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Removes an edge, unlinking it from its neighbours.
    ///
    /// Endpoint records left without any edge are dropped from the node map.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Vessel, CoreError> {
        if !self.edges.contains_key(&id) {
            return Err(CoreError::EdgeNotFound { id });
        }

        self.unlink(id);
        self.detach(id, true);
        let mut vessel = self
            .edges
            .remove(&id)
            .ok_or(CoreError::EdgeNotFound { id })?;
        vessel.edges_in.clear();
        vessel.edges_out.clear();

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(vessel)
    }

    /// Reverses an edge in place.
    ///
    /// The edge keeps its id and every field other than the endpoints and
    /// the link lists, which are rebuilt for the new direction.
    pub fn reverse_edge(&mut self, id: EdgeId) -> Result<(), CoreError> {
        if !self.edges.contains_key(&id) {
            return Err(CoreError::EdgeNotFound { id });
        }

        self.unlink(id);
        self.detach(id, false);
        if let Some(edge) = self.edges.get_mut(&id) {
            edge.flip();
        }
        self.attach(id);
        self.link(id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    /// Rebuilds the link lists of every edge from the node map.
    ///
    /// Coordinates are already coalesced by value, so after this call every
    /// pair of edges meeting at a shared coordinate sees each other.
    pub fn merge_nodes(&mut self) {
        let ids: Vec<EdgeId> = self.edges.keys().copied().collect();
        for id in ids {
            let Some(edge) = self.edges.get(&id) else {
                continue;
            };
            let upstream = self.incident(edge.from, id, Side::Incoming);
            let downstream = self.incident(edge.to, id, Side::Outgoing);
            if let Some(edge) = self.edges.get_mut(&id) {
                edge.edges_in = upstream;
                edge.edges_out = downstream;
            }
        }
    }

    /// Copies every edge of `other` into this graph under fresh ids, then
    /// calls [`merge_nodes`](Self::merge_nodes).
    ///
    /// Node state already present here wins over state from `other`.
    /// Returns the new ids in `other`'s edge order.
    pub fn merge_graph(&mut self, other: &VesselGraph) -> Vec<EdgeId> {
        let mut added = Vec::with_capacity(other.edge_count());
        for (_, vessel) in other.edges() {
            let id = self.allocate_id();
            let mut copy = vessel.clone();
            copy.edges_in.clear();
            copy.edges_out.clear();
            for coord in [copy.from, copy.to] {
                if !self.nodes.contains_key(&coord) {
                    let state = other
                        .node(coord)
                        .cloned()
                        .unwrap_or_else(|| NodeState::new(coord));
                    self.nodes.insert(coord, NodeEntry::new(state));
                }
            }
            self.edges.insert(id, copy);
            self.attach(id);
            added.push(id);
        }
        self.merge_nodes();

        #[cfg(debug_assertions)]
        self.assert_consistency();

        added
    }

    /// Copies the edges matching `filter` into a new graph.
    ///
    /// Edge ids, node state and in/out degrees are preserved. Edge link
    /// lists are copied verbatim and therefore still name edges of the
    /// source graph: traversal through `edges_in`/`edges_out` inside the
    /// subgraph is not supported.
    pub fn subgraph<F>(&self, mut filter: F) -> VesselGraph
    where
        F: FnMut(&Vessel) -> bool,
    {
        let mut sub = VesselGraph {
            edges: BTreeMap::new(),
            nodes: IndexMap::new(),
            next_edge_id: self.next_edge_id,
        };
        for (&id, vessel) in &self.edges {
            if !filter(vessel) {
                continue;
            }
            for coord in [vessel.from, vessel.to] {
                if !sub.nodes.contains_key(&coord) {
                    let state = self
                        .node(coord)
                        .cloned()
                        .unwrap_or_else(|| NodeState::new(coord));
                    sub.nodes.insert(coord, NodeEntry::new(state));
                }
            }
            sub.edges.insert(id, vessel.clone());
            sub.attach(id);
        }
        sub
    }

    // -----------------------------------------------------------------------
    // Adjacency queries
    // -----------------------------------------------------------------------

    /// Edges leaving `node`, in id order. Empty for an unknown node.
    pub fn edges_out(&self, node: Coord) -> Vec<EdgeId> {
        self.sorted_side(node, Side::Outgoing)
    }

    /// Edges entering `node`, in id order. Empty for an unknown node.
    pub fn edges_in(&self, node: Coord) -> Vec<EdgeId> {
        self.sorted_side(node, Side::Incoming)
    }

    pub fn out_degree(&self, node: Coord) -> usize {
        self.nodes.get(&node).map_or(0, |n| n.outgoing.len())
    }

    pub fn in_degree(&self, node: Coord) -> usize {
        self.nodes.get(&node).map_or(0, |n| n.incoming.len())
    }

    pub fn degree(&self, node: Coord) -> usize {
        self.out_degree(node) + self.in_degree(node)
    }

    /// Returns `true` if an edge runs from `from` to `to`.
    pub fn has_edge(&self, from: Coord, to: Coord) -> bool {
        self.find_edge(from, to).is_some()
    }

    /// First edge (lowest id) running from `from` to `to`.
    pub fn find_edge(&self, from: Coord, to: Coord) -> Option<EdgeId> {
        self.edges_out(from)
            .into_iter()
            .find(|id| self.edges.get(id).is_some_and(|e| e.to == to))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn edge(&self, id: EdgeId) -> Option<&Vessel> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Vessel> {
        self.edges.get_mut(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// Iterates edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Vessel)> {
        self.edges.iter().map(|(&id, e)| (id, e))
    }

    /// Iterates edges mutably in id order.
    pub fn edges_mut(&mut self) -> impl Iterator<Item = (EdgeId, &mut Vessel)> {
        self.edges.iter_mut().map(|(&id, e)| (id, e))
    }

    /// Snapshot of the current edge ids, in id order.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.keys().copied().collect()
    }

    pub fn node(&self, coord: Coord) -> Option<&NodeState> {
        self.nodes.get(&coord).map(|n| &n.state)
    }

    pub fn node_mut(&mut self, coord: Coord) -> Option<&mut NodeState> {
        self.nodes.get_mut(&coord).map(|n| &mut n.state)
    }

    pub fn contains_node(&self, coord: Coord) -> bool {
        self.nodes.contains_key(&coord)
    }

    /// Iterates node state in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeState> {
        self.nodes.values().map(|n| &n.state)
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeState> {
        self.nodes.values_mut().map(|n| &mut n.state)
    }

    /// Snapshot of the node coordinates, in insertion order.
    pub fn node_coords(&self) -> Vec<Coord> {
        self.nodes.keys().copied().collect()
    }

    /// Pressure at `coord`, NaN for an unknown node.
    pub fn pressure(&self, coord: Coord) -> f64 {
        self.node(coord).map_or(f64::NAN, |n| n.pressure)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    // -----------------------------------------------------------------------
    // Internal bookkeeping
    // -----------------------------------------------------------------------

    fn allocate_id(&mut self) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        id
    }

    /// Registers `id` in the out-set of its FROM node and the in-set of its
    /// TO node, creating node records as needed.
    fn attach(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.get(&id) else {
            return;
        };
        let (from, to) = (edge.from, edge.to);
        let source = self
            .nodes
            .entry(from)
            .or_insert_with(|| NodeEntry::new(NodeState::new(from)));
        if !source.outgoing.contains(&id) {
            source.outgoing.push(id);
        }
        let target = self
            .nodes
            .entry(to)
            .or_insert_with(|| NodeEntry::new(NodeState::new(to)));
        if !target.incoming.contains(&id) {
            target.incoming.push(id);
        }
    }

    /// Drops `id` from its endpoints' edge sets. With `prune`, endpoints
    /// left with no edges are removed.
    fn detach(&mut self, id: EdgeId, prune: bool) {
        let Some(edge) = self.edges.get(&id) else {
            return;
        };
        let (from, to) = (edge.from, edge.to);
        if let Some(source) = self.nodes.get_mut(&from) {
            source.outgoing.retain(|e| *e != id);
        }
        if let Some(target) = self.nodes.get_mut(&to) {
            target.incoming.retain(|e| *e != id);
        }
        if prune {
            for coord in [from, to] {
                if self.nodes.get(&coord).is_some_and(NodeEntry::is_empty) {
                    self.nodes.shift_remove(&coord);
                }
            }
        }
    }

    /// Sets the link lists of `id` and adds `id` to its neighbours' lists.
    fn link(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.get(&id) else {
            return;
        };
        let upstream = self.incident(edge.from, id, Side::Incoming);
        let downstream = self.incident(edge.to, id, Side::Outgoing);

        for f in &upstream {
            if let Some(prior) = self.edges.get_mut(f) {
                if !prior.edges_out.contains(&id) {
                    prior.edges_out.push(id);
                }
            }
        }
        for f in &downstream {
            if let Some(next) = self.edges.get_mut(f) {
                if !next.edges_in.contains(&id) {
                    next.edges_in.push(id);
                }
            }
        }
        if let Some(edge) = self.edges.get_mut(&id) {
            edge.edges_in = upstream;
            edge.edges_out = downstream;
        }
    }

    /// Removes `id` from the link lists of the edges it currently links to.
    fn unlink(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.get(&id) else {
            return;
        };
        let upstream = self.incident(edge.from, id, Side::Incoming);
        let downstream = self.incident(edge.to, id, Side::Outgoing);
        for f in upstream {
            if let Some(prior) = self.edges.get_mut(&f) {
                prior.edges_out.retain(|e| *e != id);
            }
        }
        for f in downstream {
            if let Some(next) = self.edges.get_mut(&f) {
                next.edges_in.retain(|e| *e != id);
            }
        }
    }

    /// Edges on one side of `node`, excluding `skip`.
    fn incident(&self, node: Coord, skip: EdgeId, side: Side) -> EdgeLinks {
        let Some(entry) = self.nodes.get(&node) else {
            return EdgeLinks::new();
        };
        let list = match side {
            Side::Incoming => &entry.incoming,
            Side::Outgoing => &entry.outgoing,
        };
        list.iter().copied().filter(|e| *e != skip).collect()
    }

    fn sorted_side(&self, node: Coord, side: Side) -> Vec<EdgeId> {
        let Some(entry) = self.nodes.get(&node) else {
            return Vec::new();
        };
        let mut ids: Vec<EdgeId> = match side {
            Side::Incoming => entry.incoming.to_vec(),
            Side::Outgoing => entry.outgoing.to_vec(),
        };
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Internal consistency (debug only)
    // -----------------------------------------------------------------------

    /// Verifies that every edge sits in exactly the out-set of its FROM node
    /// and the in-set of its TO node, and that no empty node record is kept.
    ///
    /// Only called in debug builds (via `cfg(debug_assertions)`).
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        for (id, edge) in &self.edges {
            let from = self.nodes.get(&edge.from);
            let to = self.nodes.get(&edge.to);
            debug_assert!(
                from.is_some_and(|n| n.outgoing.iter().filter(|e| *e == id).count() == 1),
                "edge {} missing from out-set of {}",
                id,
                edge.from
            );
            debug_assert!(
                to.is_some_and(|n| n.incoming.iter().filter(|e| *e == id).count() == 1),
                "edge {} missing from in-set of {}",
                id,
                edge.to
            );
        }
        for (coord, entry) in &self.nodes {
            for id in &entry.outgoing {
                debug_assert!(
                    self.edges.get(id).is_some_and(|e| e.from == *coord),
                    "out-set of {} names foreign edge {}",
                    coord,
                    id
                );
            }
            for id in &entry.incoming {
                debug_assert!(
                    self.edges.get(id).is_some_and(|e| e.to == *coord),
                    "in-set of {} names foreign edge {}",
                    coord,
                    id
                );
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    Incoming,
    Outgoing,
}

impl fmt::Display for VesselGraph {
    /// Dumps both adjacency maps, nodes sorted by coordinate.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut coords: Vec<Coord> = self.nodes.keys().copied().collect();
        coords.sort();

        writeln!(f, "EDGES OUT")?;
        for coord in &coords {
            let ids = self.edges_out(*coord);
            if ids.is_empty() {
                continue;
            }
            write!(f, "{coord} :")?;
            for id in ids {
                if let Some(e) = self.edges.get(&id) {
                    write!(f, " [{id}] -> {}", e.to)?;
                }
            }
            writeln!(f)?;
        }

        writeln!(f, "EDGES IN")?;
        for coord in &coords {
            let ids = self.edges_in(*coord);
            if ids.is_empty() {
                continue;
            }
            write!(f, "{coord} :")?;
            for id in ids {
                if let Some(e) = self.edges.get(&id) {
                    write!(f, " [{id}] <- {}", e.from)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
