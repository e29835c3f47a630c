//! Shortest paths between roots and perfusion marking.
//!
//! Edge weights are unit (hop count). [`path`] runs Dijkstra from a start
//! node until the end node settles, leaving `distance` and `prev` on the
//! nodes it touched. [`check_perfused`] walks those predecessor chains back
//! from every vein root to mark edges perfused, then [`traverse`] closes the
//! marking over everything downstream. Node scratch fields are cleared before
//! every search and after every marking pass.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};

use angio_core::{Coord, EdgeId, Root, VesselGraph};
use tracing::debug;

fn reset_search(graph: &mut VesselGraph) {
    for node in graph.nodes_mut() {
        node.reset_search();
    }
}

/// Dijkstra search from `start`, stopping once `end` settles.
///
/// Leaves hop distances and predecessors on the visited nodes.
pub fn path(graph: &mut VesselGraph, start: Coord, end: Coord) {
    reset_search(graph);
    let Some(node) = graph.node_mut(start) else {
        return;
    };
    node.distance = 0;

    let mut heap = BinaryHeap::new();
    heap.push(Reverse((0u32, start)));
    while let Some(Reverse((distance, current))) = heap.pop() {
        if graph.node(current).map_or(true, |n| distance > n.distance) {
            continue;
        }
        if current == end {
            break;
        }
        let next = distance + 1;
        let targets: Vec<Coord> = graph
            .edges_out(current)
            .into_iter()
            .filter_map(|id| graph.edge(id).map(|e| e.to))
            .collect();
        for to in targets {
            if let Some(node) = graph.node_mut(to) {
                if next < node.distance {
                    node.distance = next;
                    node.prev = Some(current);
                    heap.push(Reverse((next, to)));
                }
            }
        }
    }
}

/// The edge entering `node` on the recorded shortest path.
///
/// A single inlet is taken as is; with two inlets the one whose FROM node is
/// the recorded predecessor wins.
fn inlet_on_path(graph: &VesselGraph, node: Coord) -> Option<EdgeId> {
    let prev = graph.node(node)?.prev;
    match graph.edges_in(node).as_slice() {
        [only] => Some(*only),
        [a, b] => {
            let from_a = graph.edge(*a).map(|e| e.from);
            Some(if from_a.is_some() && from_a == prev { *a } else { *b })
        }
        _ => None,
    }
}

/// Ordered edges of the shortest path from `start` to `end`, or `None` if
/// `end` is unreachable.
pub fn get_path(graph: &mut VesselGraph, start: Coord, end: Coord) -> Option<Vec<EdgeId>> {
    path(graph, start, end);
    let mut edges = Vec::new();
    let mut node = Some(end);
    while let Some(current) = node {
        if current == start {
            break;
        }
        if let Some(id) = inlet_on_path(graph, current) {
            edges.push(id);
        }
        node = graph.node(current).and_then(|n| n.prev);
    }
    reset_search(graph);

    if node.is_none() {
        return None;
    }
    edges.reverse();
    Some(edges)
}

/// Marks every non-ignored edge reachable downstream of `start` as perfused.
///
/// `is_visited` guards against cycles; callers clear it beforehand.
pub fn traverse(graph: &mut VesselGraph, start: Coord) {
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for id in graph.edges_out(node) {
            let Some(edge) = graph.edge_mut(id) else {
                continue;
            };
            if edge.is_ignored || edge.is_visited {
                continue;
            }
            edge.is_visited = true;
            edge.is_perfused = true;
            stack.push(edge.to);
        }
    }
}

/// First node reachable downstream of both `a` and `b`, searching from the
/// TO node of each edge.
///
/// Nodes below `a` are collected first; the breadth-first walk below `b`
/// returns the earliest of them it meets. The same edge twice yields its
/// own TO node.
pub fn downstream_intersection(graph: &VesselGraph, a: EdgeId, b: EdgeId) -> Option<Coord> {
    let below_a = graph.edge(a)?.to;
    let below_b = graph.edge(b)?.to;

    let mut reached = HashSet::from([below_a]);
    let mut stack = vec![below_a];
    while let Some(node) = stack.pop() {
        for id in graph.edges_out(node) {
            if let Some(edge) = graph.edge(id) {
                if reached.insert(edge.to) {
                    stack.push(edge.to);
                }
            }
        }
    }

    let mut seen = HashSet::from([below_b]);
    let mut queue = VecDeque::from([below_b]);
    while let Some(node) = queue.pop_front() {
        if reached.contains(&node) {
            return Some(node);
        }
        for id in graph.edges_out(node) {
            if let Some(edge) = graph.edge(id) {
                if seen.insert(edge.to) {
                    queue.push_back(edge.to);
                }
            }
        }
    }
    None
}

/// Recomputes `is_perfused` for every edge.
///
/// For each artery/vein pair the shortest path is marked, then perfusion
/// is propagated downstream from every marked edge.
pub fn check_perfused(graph: &mut VesselGraph, arteries: &[Root], veins: &[Root]) {
    for (_, edge) in graph.edges_mut() {
        edge.is_perfused = false;
        edge.is_visited = false;
    }

    for artery in arteries {
        for vein in veins {
            let (start, end) = (artery.node, vein.node);
            path(graph, start, end);
            // An unreached vein has no predecessor; its inlet is not on any path.
            if end != start && graph.node(end).and_then(|n| n.prev).is_none() {
                continue;
            }

            let mut node = Some(end);
            while let Some(current) = node {
                if current == start {
                    break;
                }
                if let Some(id) = inlet_on_path(graph, current) {
                    if let Some(edge) = graph.edge_mut(id) {
                        edge.is_perfused = true;
                    }
                }
                node = graph.node(current).and_then(|n| n.prev);
            }
        }
    }

    let marked: Vec<Coord> = graph
        .edges()
        .filter(|(_, e)| e.is_perfused)
        .map(|(_, e)| e.to)
        .collect();
    for to in marked {
        traverse(graph, to);
    }

    for (_, edge) in graph.edges_mut() {
        edge.is_visited = false;
    }
    reset_search(graph);

    let perfused = graph.edges().filter(|(_, e)| e.is_perfused).count();
    debug!(perfused, total = graph.edge_count(), "perfusion marked");
}

#[cfg(test)]
mod tests {
    use super::*;
    use angio_core::{EdgeType, Vessel};

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y, 0)
    }

    fn edge(g: &mut VesselGraph, from: Coord, to: Coord) -> EdgeId {
        g.add_edge(Vessel::new(from, to, EdgeType::Capillary).with_radius(5.0).with_length(10.0))
            .unwrap()
    }

    /// a -> b -> d and a -> c1 -> c2 -> d, plus d -> e.
    fn diamond() -> (VesselGraph, Vec<EdgeId>) {
        let mut g = VesselGraph::new();
        let ids = vec![
            edge(&mut g, c(0, 0), c(1, 0)),
            edge(&mut g, c(1, 0), c(2, 0)),
            edge(&mut g, c(0, 0), c(0, 1)),
            edge(&mut g, c(0, 1), c(1, 1)),
            edge(&mut g, c(1, 1), c(2, 0)),
            edge(&mut g, c(2, 0), c(3, 0)),
        ];
        (g, ids)
    }

    #[test]
    fn dijkstra_counts_hops() {
        let (mut g, _) = diamond();
        path(&mut g, c(0, 0), c(3, 0));
        assert_eq!(g.node(c(2, 0)).unwrap().distance, 2);
        assert_eq!(g.node(c(2, 0)).unwrap().prev, Some(c(1, 0)));
        assert_eq!(g.node(c(3, 0)).unwrap().distance, 3);
    }

    #[test]
    fn get_path_follows_predecessors() {
        let (mut g, ids) = diamond();
        let found = get_path(&mut g, c(0, 0), c(3, 0)).unwrap();
        assert_eq!(found, vec![ids[0], ids[1], ids[5]]);
        // Scratch cleared afterwards.
        assert!(g.nodes().all(|n| n.prev.is_none() && n.distance == u32::MAX));
    }

    #[test]
    fn unreachable_path_is_none() {
        let (mut g, _) = diamond();
        assert_eq!(get_path(&mut g, c(3, 0), c(0, 0)), None);
        assert_eq!(get_path(&mut g, c(0, 0), c(9, 9)), None);
    }

    #[test]
    fn perfusion_marks_path_and_downstream() {
        let (mut g, ids) = diamond();
        let arteries = [Root::new(c(0, 0), ids[0], EdgeType::Artery)];
        let veins = [Root::new(c(2, 0), ids[1], EdgeType::Vein)];
        check_perfused(&mut g, &arteries, &veins);

        // Shortest path a -> b -> d, then everything below d.
        assert!(g.edge(ids[0]).unwrap().is_perfused);
        assert!(g.edge(ids[1]).unwrap().is_perfused);
        assert!(g.edge(ids[5]).unwrap().is_perfused);
        // The longer branch is not on a shortest path and not downstream.
        assert!(!g.edge(ids[2]).unwrap().is_perfused);
        assert!(!g.edge(ids[4]).unwrap().is_perfused);
        assert!(g.edges().all(|(_, e)| !e.is_visited));
    }

    #[test]
    fn perfusion_is_downstream_closed() {
        let (mut g, ids) = diamond();
        // Extend below e with a fork.
        edge(&mut g, c(3, 0), c(4, 0));
        edge(&mut g, c(3, 0), c(3, 1));
        let arteries = [Root::new(c(0, 0), ids[0], EdgeType::Artery)];
        let veins = [Root::new(c(2, 0), ids[1], EdgeType::Vein)];
        check_perfused(&mut g, &arteries, &veins);

        for (_, e) in g.edges() {
            if e.is_perfused {
                for id in g.edges_out(e.to) {
                    assert!(g.edge(id).unwrap().is_perfused);
                }
            }
        }
    }

    #[test]
    fn branches_meet_at_first_shared_node() {
        let (mut g, ids) = diamond();
        assert_eq!(downstream_intersection(&g, ids[0], ids[2]), Some(c(2, 0)));
        assert_eq!(downstream_intersection(&g, ids[2], ids[0]), Some(c(2, 0)));
        assert_eq!(downstream_intersection(&g, ids[0], ids[0]), Some(c(1, 0)));

        let apart = edge(&mut g, c(9, 9), c(9, 8));
        assert_eq!(downstream_intersection(&g, ids[0], apart), None);
        assert_eq!(downstream_intersection(&g, ids[5], ids[2]), Some(c(3, 0)));
    }

    #[test]
    fn ignored_edges_stay_unperfused() {
        let (mut g, ids) = diamond();
        g.edge_mut(ids[5]).unwrap().is_ignored = true;
        let arteries = [Root::new(c(0, 0), ids[0], EdgeType::Artery)];
        let veins = [Root::new(c(2, 0), ids[1], EdgeType::Vein)];
        check_perfused(&mut g, &arteries, &veins);
        assert!(!g.edge(ids[5]).unwrap().is_perfused);
    }
}
