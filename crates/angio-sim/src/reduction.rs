//! Graph reduction: restores structural validity after a mutation.
//!
//! A leaf is an edge whose TO node has no outlet and is not a root, or whose
//! FROM node has no inlet and is not a root. Ignoring a leaf can expose its
//! neighbour as a new leaf, so [`prune_leaves`] repeats on a fresh working
//! copy of the still-active edges until a pass ignores nothing. Every pass
//! either ignores at least one more edge or ends the loop, so the loop runs
//! at most `edge_count + 1` times.
//!
//! Ignored edges stay in the graph; only the `is_ignored` flag and NaN
//! endpoint pressures record that they are cut off. Root nodes always keep
//! their boundary pressure.

use angio_core::{Coord, EdgeId, Vessel, VesselGraph};
use tracing::{debug, info};

use crate::hemodynamics::{
    assign_oxygen, calculate_current_state, MINIMUM_FLOW_PERCENT, MINIMUM_FLOW_RATE,
};
use crate::solver::LinearSolver;

fn invalidate(graph: &mut VesselGraph, coord: Coord) {
    if let Some(node) = graph.node_mut(coord) {
        if !node.is_root {
            node.pressure = f64::NAN;
        }
    }
}

/// Marks every leaf edge ignored, to a fixed point. Returns the number of
/// ignored edges.
///
/// Flags from earlier reductions are cleared first, so an edge reconnected
/// by growth becomes active again.
pub fn prune_leaves(graph: &mut VesselGraph) -> usize {
    for (_, edge) in graph.edges_mut() {
        edge.is_ignored = false;
    }

    let mut ignored = 0;
    let mut passes = 0;
    loop {
        passes += 1;
        let working = graph.subgraph(|e| !e.is_ignored);
        let is_root = |c: Coord| working.node(c).is_some_and(|n| n.is_root);
        let leaves: Vec<(EdgeId, Coord, Coord)> = working
            .edges()
            .filter(|(_, e)| {
                (working.out_degree(e.to) == 0 && !is_root(e.to))
                    || (working.in_degree(e.from) == 0 && !is_root(e.from))
            })
            .map(|(id, e)| (id, e.from, e.to))
            .collect();

        if leaves.is_empty() {
            break;
        }
        for (id, from, to) in &leaves {
            if let Some(edge) = graph.edge_mut(*id) {
                edge.is_ignored = true;
            }
            invalidate(graph, *from);
            invalidate(graph, *to);
        }
        ignored += leaves.len();
    }

    debug!(passes, ignored, "leaf pruning reached fixed point");
    ignored
}

/// Prunes leaves, recomputes the hemodynamic state and refreshes node oxygen.
pub fn update_graph(graph: &mut VesselGraph, solver: &dyn LinearSolver) {
    prune_leaves(graph);
    calculate_current_state(graph, solver);
    assign_oxygen(graph);
}

/// Removes an edge and marks its endpoints disconnected.
pub fn disconnect_edge(graph: &mut VesselGraph, id: EdgeId) -> Option<Vessel> {
    let removed = graph.remove_edge(id).ok()?;
    invalidate(graph, removed.from);
    invalidate(graph, removed.to);
    info!(edge = %id, from = %removed.from, to = %removed.to, "removing edge");
    Some(removed)
}

fn remove_and_update(graph: &mut VesselGraph, id: EdgeId, solver: &dyn LinearSolver) -> bool {
    if disconnect_edge(graph, id).is_some() {
        update_graph(graph, solver);
        true
    } else {
        false
    }
}

/// Removes low-flow edges around `nodes`.
///
/// An incident edge whose flow is below the absolute floor (or NaN) is
/// removed. At a two-inlet node, an inlet carrying less than 1% of the
/// combined inflow is removed. With `remove_min`, the lowest-flow surviving
/// edge seen is removed at the end. Every removal re-runs
/// [`update_graph`]. Returns the number of removed edges.
pub fn update_traverse(
    graph: &mut VesselGraph,
    nodes: &[Coord],
    remove_min: bool,
    solver: &dyn LinearSolver,
) -> usize {
    let mut removed = 0;
    let mut min_edge: Option<(EdgeId, f64)> = None;

    for &node in nodes {
        let incident: Vec<EdgeId> = graph
            .edges_out(node)
            .into_iter()
            .chain(graph.edges_in(node))
            .collect();
        for id in incident {
            let Some(flow) = graph.edge(id).map(|e| e.flow) else {
                continue;
            };
            if flow.is_nan() || flow < MINIMUM_FLOW_RATE {
                if remove_and_update(graph, id, solver) {
                    removed += 1;
                }
            } else if min_edge.map_or(true, |(_, f)| flow < f) {
                min_edge = Some((id, flow));
            }
        }

        let inlets = graph.edges_in(node);
        if let [first, second] = *inlets.as_slice() {
            let flow_of = |id: EdgeId| graph.edge(id).map(|e| e.flow);
            let (Some(f1), Some(f2)) = (flow_of(first), flow_of(second)) else {
                continue;
            };
            let total = f1 + f2;
            let weak = if f1 / total < MINIMUM_FLOW_PERCENT {
                Some(first)
            } else if f2 / total < MINIMUM_FLOW_PERCENT {
                Some(second)
            } else {
                None
            };
            if let Some(id) = weak {
                if remove_and_update(graph, id, solver) {
                    removed += 1;
                }
            }
        }
    }

    if remove_min {
        if let Some((id, _)) = min_edge {
            if remove_and_update(graph, id, solver) {
                removed += 1;
            }
        }
    }

    removed
}
