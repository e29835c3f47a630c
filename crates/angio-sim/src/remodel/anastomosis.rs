//! Committing a finished sprout and rebalancing flow around it.
//!
//! # Architecture
//!
//! A sprout reaches the graph as a chain of lattice coordinates whose two
//! ends are existing nodes. [`Anastomosis::connect`] lays the chain from the
//! higher-pressure end to the lower one and refuses chains that would close
//! a directed cycle. It sizes the new capillaries against the vessel already
//! leaving the upstream end, then merges them into the graph.
//!
//! The [`FlowStrategy`] decides where the new flow comes from. `Compensate`
//! widens every artery-to-sprout and sprout-to-vein path, root vessels
//! included, which moves their boundary pressure. `Divert` narrows the
//! sibling branch and widens the sprout branch down to where the two meet
//! again. Every resize is a bisection on the Hagen-Poiseuille flow, and a
//! path is rolled back as a whole when any of its vessels has no solution.

use angio_core::{Coord, EdgeId, EdgeLevel, EdgeType, Root, Vessel, VesselGraph};
use tracing::debug;

use crate::config::FlowStrategy;
use crate::environment::Lattice;
use crate::hemodynamics::{
    chain_flow, local_flow, root_pressure, wall_thickness, CAPILLARY_RADIUS, MAXIMUM_CAPILLARY_RADIUS,
};
use crate::perfusion::{downstream_intersection, get_path};
use crate::reduction::update_graph;
use crate::solver::{bisection, LinearSolver};

/// Lower bracket for radius searches [um].
const RADIUS_FLOOR: f64 = 1e-6;
/// Bisection tolerance on radii [um].
const RADIUS_TOLERANCE: f64 = 1e-6;

/// Boundary conditions and solver of a network, borrowed alongside its graph.
#[derive(Clone, Copy)]
pub struct Circulation<'a> {
    pub arteries: &'a [Root],
    pub veins: &'a [Root],
    pub solver: &'a dyn LinearSolver,
}

/// Settings for committing sprouts during one growth step.
pub struct Anastomosis<'a> {
    pub circulation: Circulation<'a>,
    pub lattice: &'a dyn Lattice,
    pub level: EdgeLevel,
    pub strategy: FlowStrategy,
    pub tick: f64,
}

/// The end of a root vessel that holds the boundary pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Inlet,
    Outlet,
}

impl Anastomosis<'_> {
    /// Adds the vessels along `chain` and rebalances flow around them.
    /// Returns the new edge ids, or `None` when the chain was refused or
    /// backed out.
    ///
    /// Both ends must be nodes with fewer than three vessels and distinct
    /// positive pressures; interior coordinates must not be nodes yet.
    pub fn connect(&self, graph: &mut VesselGraph, chain: &[Coord]) -> Option<Vec<EdgeId>> {
        let (&first, &last) = (chain.first()?, chain.last()?);
        if first == last || !can_anchor(graph, first) || !can_anchor(graph, last) {
            return None;
        }
        if chain[1..chain.len() - 1].iter().any(|c| graph.contains_node(*c)) {
            return None;
        }

        let (p_first, p_last) = (graph.pressure(first), graph.pressure(last));
        let usable = |p: f64| p.is_finite() && p > 0.0;
        if !usable(p_first) || !usable(p_last) || p_first == p_last {
            debug!(from = %first, to = %last, "sprout ends lack a pressure gradient");
            return None;
        }
        let mut chain = chain.to_vec();
        if p_first < p_last {
            chain.reverse();
        }
        let (start, end) = (chain[0], chain[chain.len() - 1]);

        if get_path(graph, end, start).is_some() {
            debug!(%start, %end, "sprout would close a cycle");
            return None;
        }

        let sibling = *graph.edges_out(start).first()?;
        let radius = sprout_radius(graph, sibling)?;
        let added = graph.merge_graph(&self.sprout_graph(&chain, radius)?);

        match self.strategy {
            FlowStrategy::Compensate => self.compensate(graph, &added, start, end),
            FlowStrategy::Divert => {
                if !self.divert(graph, &added, start, end, sibling) {
                    for id in &added {
                        graph.remove_edge(*id).ok();
                    }
                    return None;
                }
            }
        }

        for coord in [start, end] {
            if let Some(node) = graph.node_mut(coord) {
                node.is_sprout = true;
            }
        }
        debug!(%start, %end, edges = added.len(), radius, "sprout anastomosis");
        Some(added)
    }

    /// The chain as a standalone graph of angiogenic capillaries.
    fn sprout_graph(&self, chain: &[Coord], radius: f64) -> Option<VesselGraph> {
        let mut sprout = VesselGraph::new();
        for pair in chain.windows(2) {
            let mut vessel = Vessel::new(pair[0], pair[1], EdgeType::Capillary)
                .with_radius(radius)
                .with_wall(wall_thickness(radius))
                .with_length(self.lattice.edge_length(pair[0], pair[1]))
                .with_level(self.level);
            vessel.is_angiogenic = true;
            sprout.add_edge(vessel).ok()?;
        }
        for node in sprout.nodes_mut() {
            node.last_update = self.tick;
        }
        Some(sprout)
    }

    /// Widens the artery and vein paths through the sprout so they carry its
    /// flow. Leaves every radius as it was when any path cannot.
    fn compensate(&self, graph: &mut VesselGraph, added: &[EdgeId], start: Coord, end: Coord) {
        update_graph(graph, self.circulation.solver);
        if graph.out_degree(start) < 2 {
            return;
        }
        let delta_p = graph.pressure(start) - graph.pressure(end);
        let flow = chain_flow(graph, CAPILLARY_RADIUS, added, delta_p);

        let inflows: Vec<Vec<EdgeId>> = self
            .circulation
            .arteries
            .iter()
            .filter_map(|artery| get_path(graph, artery.node, start))
            .filter(|path| !path.is_empty())
            .collect();
        let outflows: Vec<Vec<EdgeId>> = self
            .circulation
            .veins
            .iter()
            .filter_map(|vein| get_path(graph, end, vein.node))
            .filter(|path| !path.is_empty())
            .collect();
        if inflows.is_empty() || outflows.is_empty() {
            debug!(%start, %end, "no root reaches the sprout; radii unchanged");
            return;
        }

        let saved = Saved::take(graph, inflows.iter().chain(&outflows).flatten().copied());
        let artery_flow = flow / inflows.len() as f64;
        let vein_flow = flow / outflows.len() as f64;
        let widened = inflows.iter().all(|path| widen_from_artery(graph, path, artery_flow))
            && outflows.iter().all(|path| widen_to_vein(graph, path, vein_flow));
        if !widened {
            saved.restore(graph);
            debug!(%start, %end, flow, "root paths cannot carry the sprout flow; radii restored");
        }
    }

    /// Moves the sprout's flow out of the sibling branch. Returns `false`
    /// when the two branches never meet downstream, in which case the
    /// sprout must be removed again.
    fn divert(&self, graph: &mut VesselGraph, added: &[EdgeId], start: Coord, end: Coord, sibling: EdgeId) -> bool {
        let Some(&first) = added.first() else {
            return false;
        };
        let Some(meeting) = downstream_intersection(graph, sibling, first) else {
            debug!(%start, "sprout branch never rejoins its sibling");
            return false;
        };

        update_graph(graph, self.circulation.solver);
        let outlets = graph.edges_out(start);
        let sprout = outlets.iter().find(|id| added.contains(id));
        let other = outlets.iter().find(|id| !added.contains(id));
        let (Some(&sprout), Some(&other)) = (sprout, other) else {
            return true;
        };

        let delta_p = graph.pressure(start) - graph.pressure(end);
        let diverted = chain_flow(graph, CAPILLARY_RADIUS, added, delta_p);
        let available = graph.edge(other).map_or(0.0, |e| e.flow);
        if diverted > available {
            return true;
        }

        if graph.node(meeting).is_some_and(|n| n.is_root) {
            self.widen_to_any_vein(graph, sprout, diverted, added);
        } else if resize_branch(graph, other, meeting, -diverted, added) {
            resize_branch(graph, sprout, meeting, diverted, added);
        }
        true
    }

    /// Widens `head` and the path below it to the first vein it reaches.
    fn widen_to_any_vein(&self, graph: &mut VesselGraph, head: EdgeId, flow: f64, skip: &[EdgeId]) {
        let Some(below) = graph.edge(head).map(|e| e.to) else {
            return;
        };
        for vein in self.circulation.veins {
            let Some(rest) = get_path(graph, below, vein.node).filter(|p| !p.is_empty()) else {
                continue;
            };
            let path: Vec<EdgeId> = std::iter::once(head).chain(rest).collect();
            let saved = Saved::take(graph, path.iter().copied());
            let widened = path.iter().filter(|id| !skip.contains(id)).all(|&id| {
                if ends_at_root(graph, id, Boundary::Outlet) {
                    resize_root(graph, id, flow, Boundary::Outlet)
                } else {
                    resize(graph, id, flow)
                }
            });
            if !widened {
                saved.restore(graph);
            }
            break;
        }
    }
}

/// Whether `coord` is a node that can take one more vessel.
fn can_anchor(graph: &VesselGraph, coord: Coord) -> bool {
    graph.contains_node(coord) && graph.degree(coord) < 3
}

/// Radius for the sprout's vessels: the capillary radius, unless the vessel
/// already leaving its upstream end is narrower, in which case the two share
/// that vessel's flow evenly.
fn sprout_radius(graph: &VesselGraph, sibling: EdgeId) -> Option<f64> {
    let edge = graph.edge(sibling)?;
    if edge.radius > CAPILLARY_RADIUS {
        return Some(CAPILLARY_RADIUS);
    }
    even_split_radius(edge, graph.pressure(edge.from) - graph.pressure(edge.to))
}

/// Radius at which two equal vessels in parallel carry what `edge` carries
/// alone at the same pressure drop.
fn even_split_radius(edge: &Vessel, delta_p: f64) -> Option<f64> {
    let flow = local_flow(edge.radius, edge.length, delta_p);
    bisection(
        |r| flow - 2.0 * local_flow(r, edge.length, delta_p),
        RADIUS_FLOOR,
        5.0 * MAXIMUM_CAPILLARY_RADIUS,
        RADIUS_TOLERANCE,
    )
}

fn ends_at_root(graph: &VesselGraph, id: EdgeId, boundary: Boundary) -> bool {
    graph.edge(id).is_some_and(|e| {
        let coord = match boundary {
            Boundary::Inlet => e.from,
            Boundary::Outlet => e.to,
        };
        graph.node(coord).is_some_and(|n| n.is_root)
    })
}

/// Resizes `id` so it carries `flow` more (less when negative) at its
/// current pressure drop.
fn resize(graph: &mut VesselGraph, id: EdgeId, flow: f64) -> bool {
    let Some(edge) = graph.edge(id) else {
        return false;
    };
    let delta_p = graph.pressure(edge.from) - graph.pressure(edge.to);
    let length = edge.length;
    let target = local_flow(edge.radius, length, delta_p) + flow;
    let Some(radius) = bisection(
        |r| target - local_flow(r, length, delta_p),
        RADIUS_FLOOR,
        5.0 * MAXIMUM_CAPILLARY_RADIUS,
        RADIUS_TOLERANCE,
    ) else {
        return false;
    };
    if let Some(edge) = graph.edge_mut(id) {
        edge.radius = radius;
    }
    true
}

/// Resizes a root vessel so it carries `flow` more, letting its boundary
/// pressure follow the new radius. The radius may move by at most half.
fn resize_root(graph: &mut VesselGraph, id: EdgeId, flow: f64, boundary: Boundary) -> bool {
    let Some(edge) = graph.edge(id) else {
        return false;
    };
    let (from, to, radius, length) = (edge.from, edge.to, edge.radius, edge.length);
    let category = edge.category();
    let (p_from, p_to) = (graph.pressure(from), graph.pressure(to));
    let target = local_flow(radius, length, p_from - p_to) + flow;
    let drop = |r: f64| match boundary {
        Boundary::Inlet => root_pressure(r, category) - p_to,
        Boundary::Outlet => p_from - root_pressure(r, category),
    };
    let Some(new_radius) = bisection(
        |r| target - local_flow(r, length, drop(r)),
        0.5 * radius,
        1.5 * radius,
        RADIUS_TOLERANCE,
    ) else {
        return false;
    };

    if let Some(edge) = graph.edge_mut(id) {
        edge.radius = new_radius;
    }
    let held = match boundary {
        Boundary::Inlet => from,
        Boundary::Outlet => to,
    };
    if let Some(node) = graph.node_mut(held) {
        node.pressure = root_pressure(new_radius, category);
    }
    true
}

/// `path` starts at an artery root vessel; every vessel on it takes `flow`
/// more.
fn widen_from_artery(graph: &mut VesselGraph, path: &[EdgeId], flow: f64) -> bool {
    let Some((&root, rest)) = path.split_first() else {
        return false;
    };
    ends_at_root(graph, root, Boundary::Inlet)
        && resize_root(graph, root, flow, Boundary::Inlet)
        && rest.iter().all(|&id| resize(graph, id, flow))
}

/// `path` ends at a vein root vessel; every vessel on it takes `flow` more.
fn widen_to_vein(graph: &mut VesselGraph, path: &[EdgeId], flow: f64) -> bool {
    let Some((&root, rest)) = path.split_last() else {
        return false;
    };
    ends_at_root(graph, root, Boundary::Outlet)
        && resize_root(graph, root, flow, Boundary::Outlet)
        && rest.iter().all(|&id| resize(graph, id, flow))
}

/// Resizes `head` and the path from its TO node down to `meeting` by `flow`,
/// leaving `skip` alone. Restores the branch on failure.
fn resize_branch(graph: &mut VesselGraph, head: EdgeId, meeting: Coord, flow: f64, skip: &[EdgeId]) -> bool {
    let Some(below) = graph.edge(head).map(|e| e.to) else {
        return false;
    };
    let mut path = vec![head];
    path.extend(get_path(graph, below, meeting).unwrap_or_default());

    let saved = Saved::take(graph, path.iter().copied());
    let resized = path
        .iter()
        .filter(|id| !skip.contains(id))
        .all(|&id| resize(graph, id, flow));
    if !resized {
        saved.restore(graph);
    }
    resized
}

/// Radii and root pressures to roll back to when a resize fails.
struct Saved {
    radii: Vec<(EdgeId, f64)>,
    pressures: Vec<(Coord, f64)>,
}

impl Saved {
    fn take(graph: &VesselGraph, edges: impl IntoIterator<Item = EdgeId>) -> Self {
        let mut saved = Saved {
            radii: Vec::new(),
            pressures: Vec::new(),
        };
        for id in edges {
            let Some(edge) = graph.edge(id) else {
                continue;
            };
            saved.radii.push((id, edge.radius));
            for coord in [edge.from, edge.to] {
                if graph.node(coord).is_some_and(|n| n.is_root) {
                    saved.pressures.push((coord, graph.pressure(coord)));
                }
            }
        }
        saved
    }

    /// Applied in reverse so the earliest value of a repeated entry wins.
    fn restore(self, graph: &mut VesselGraph) {
        for (id, radius) in self.radii.into_iter().rev() {
            if let Some(edge) = graph.edge_mut(id) {
                edge.radius = radius;
            }
        }
        for (coord, pressure) in self.pressures.into_iter().rev() {
            if let Some(node) = graph.node_mut(coord) {
                node.pressure = pressure;
            }
        }
    }
}
