//! Radius propagation by Murray's law.
//!
//! # Architecture
//!
//! Seed edges receive the capillary radius and the rest of the network is
//! resolved breadth-first, layer by layer, either upstream toward arterial
//! roots or downstream toward venous roots. For each edge on the frontier the
//! neighbouring edges in the travel direction are classified by the degree
//! of the node they share:
//!
//! - **pass-through** (one in, one out): copy the known radius.
//! - **split** (the frontier edge is one of two branches): the unknown branch
//!   takes the Murray remainder of the known parent and sibling, or an even
//!   split when the sibling is also unknown.
//! - **merge** (the neighbour is fed by, or feeds, two branches): once both
//!   branch radii are known the neighbour takes their Murray combination.
//!
//! An edge with no radius yet is re-queued as its own child. The `visited`
//! flag stops revisits on cyclic subgraphs, and a layer that repeats without
//! assigning anything ends the walk.

use angio_core::{EdgeCategory, EdgeId, VesselGraph};
use indexmap::IndexSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hemodynamics::{CAPILLARY_RADIUS, DELTA_TOLERANCE, MINIMUM_CAPILLARY_RADIUS, MURRAY_EXPONENT};
use crate::SimRng;

/// Direction of travel through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    Upstream,
    Downstream,
}

/// Radius propagation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadiusMode {
    /// Upstream through every edge.
    UpstreamAll,
    /// Upstream, following arterial edges only.
    UpstreamArteries,
    /// Downstream, following venous edges only.
    DownstreamVeins,
    /// Upstream over a fixed pattern layout: no splits, jittered seeds.
    UpstreamPattern,
    /// Downstream over a fixed pattern layout: no splits, jittered seeds.
    DownstreamPattern,
}

impl RadiusMode {
    pub fn strategy(self) -> Strategy {
        match self {
            RadiusMode::UpstreamAll | RadiusMode::UpstreamArteries | RadiusMode::UpstreamPattern => {
                Strategy::Upstream
            }
            RadiusMode::DownstreamVeins | RadiusMode::DownstreamPattern => Strategy::Downstream,
        }
    }

    /// Category an edge must have to join the next frontier, if any.
    fn follows(self) -> Option<EdgeCategory> {
        match self {
            RadiusMode::UpstreamAll => None,
            RadiusMode::UpstreamArteries | RadiusMode::UpstreamPattern => Some(EdgeCategory::Artery),
            RadiusMode::DownstreamVeins | RadiusMode::DownstreamPattern => Some(EdgeCategory::Vein),
        }
    }

    fn is_pattern(self) -> bool {
        matches!(self, RadiusMode::UpstreamPattern | RadiusMode::DownstreamPattern)
    }

    /// Node degrees `(in, out)` that mark a split in this direction.
    fn checks(self) -> (usize, usize) {
        match self.strategy() {
            Strategy::Upstream => (2, 1),
            Strategy::Downstream => (1, 2),
        }
    }
}

/// Parent radius of two branches: `(r1^k + r2^k)^(1/k)`.
pub fn murray_parent(r1: f64, r2: f64) -> f64 {
    (r1.powf(MURRAY_EXPONENT) + r2.powf(MURRAY_EXPONENT)).powf(1.0 / MURRAY_EXPONENT)
}

/// Radius of the unknown branch given the other two radii at a bifurcation.
///
/// The result snaps to the nearer known radius within [`DELTA_TOLERANCE`]
/// and never drops below [`MINIMUM_CAPILLARY_RADIUS`].
pub fn murray_remainder(parent: f64, known: f64) -> f64 {
    let (big, small) = if parent > known {
        (parent, known)
    } else if parent < known {
        (known, parent)
    } else {
        return known;
    };
    let mut radius = (big.powf(MURRAY_EXPONENT) - small.powf(MURRAY_EXPONENT)).powf(1.0 / MURRAY_EXPONENT);
    if (radius - small).abs() < DELTA_TOLERANCE {
        radius = small;
    }
    radius.max(MINIMUM_CAPILLARY_RADIUS)
}

/// Radius of each branch when a parent splits into two equal branches.
pub fn even_split(parent: f64) -> f64 {
    (parent / 2f64.powf(1.0 / MURRAY_EXPONENT)).max(MINIMUM_CAPILLARY_RADIUS)
}

fn directed_degrees(graph: &VesselGraph, id: EdgeId, strategy: Strategy) -> (usize, usize) {
    let Some(edge) = graph.edge(id) else {
        return (0, 0);
    };
    let node = match strategy {
        Strategy::Upstream => edge.to,
        Strategy::Downstream => edge.from,
    };
    (graph.in_degree(node), graph.out_degree(node))
}

fn neighbours(graph: &VesselGraph, id: EdgeId, strategy: Strategy) -> Vec<EdgeId> {
    graph.edge(id).map_or_else(Vec::new, |e| match strategy {
        Strategy::Upstream => e.edges_in().to_vec(),
        Strategy::Downstream => e.edges_out().to_vec(),
    })
}

/// The two branches on the far side of `id`, looking against `strategy`.
fn branches(graph: &VesselGraph, id: EdgeId, strategy: Strategy) -> Option<(f64, f64)> {
    let e = graph.edge(id)?;
    let list = match strategy {
        Strategy::Upstream => e.edges_out(),
        Strategy::Downstream => e.edges_in(),
    };
    match list {
        [a, b, ..] => Some((graph.edge(*a)?.radius, graph.edge(*b)?.radius)),
        _ => None,
    }
}

fn radius_of(graph: &VesselGraph, id: EdgeId) -> f64 {
    graph.edge(id).map_or(0.0, |e| e.radius)
}

fn set_radius(graph: &mut VesselGraph, id: EdgeId, radius: f64) -> bool {
    match graph.edge_mut(id) {
        Some(e) if e.radius != radius => {
            e.radius = radius;
            true
        }
        _ => false,
    }
}

/// One propagation step from `id`. Returns the next frontier candidates and
/// whether any radius changed.
fn step(graph: &mut VesselGraph, id: EdgeId, mode: RadiusMode) -> (Vec<EdgeId>, bool) {
    let strategy = mode.strategy();
    let (from_check, to_check) = mode.checks();
    let list = neighbours(graph, id, strategy);
    let visited = graph.edge(id).map_or(true, |e| e.is_visited);
    if list.is_empty() || visited {
        return (Vec::new(), false);
    }

    let radius = radius_of(graph, id);
    let mut changed = false;
    let mut children = Vec::with_capacity(list.len());

    for &e in &list {
        let degrees = directed_degrees(graph, e, strategy);
        let current = radius_of(graph, e);

        let assigned = if degrees == (1, 1) && radius != 0.0 {
            Some(radius)
        } else if degrees == (from_check, to_check) {
            if mode.is_pattern() {
                Some(radius)
            } else if current == 0.0 && radius != 0.0 && list.len() >= 2 {
                let r1 = radius_of(graph, list[0]);
                let r2 = radius_of(graph, list[1]);
                Some(match (r1 == 0.0, r2 == 0.0) {
                    (true, false) => murray_remainder(radius, r2),
                    (false, true) => murray_remainder(radius, r1),
                    _ => even_split(radius),
                })
            } else {
                None
            }
        } else if degrees == (to_check, from_check) {
            match branches(graph, e, strategy) {
                Some((r1, r2)) if r1 != 0.0 && r2 != 0.0 => Some(murray_parent(r1, r2)),
                _ => None,
            }
        } else {
            None
        };

        if let Some(r) = assigned {
            changed |= set_radius(graph, e, r);
        }
        children.push(e);
    }

    if radius == 0.0 && !mode.is_pattern() {
        return (vec![id], changed);
    }
    if let Some(edge) = graph.edge_mut(id) {
        edge.is_visited = true;
    }
    (children, changed)
}

/// Seeds `seeds` with the capillary radius and propagates radii through
/// the graph according to `mode`.
///
/// Pattern modes multiply each seed radius by a uniform factor in
/// `[0.5, 1.5)` drawn from `rng`.
pub fn update_radii(graph: &mut VesselGraph, seeds: &[EdgeId], mode: RadiusMode, rng: &mut SimRng) {
    for (_, edge) in graph.edges_mut() {
        edge.is_visited = false;
    }

    for &id in seeds {
        let jitter = if mode.is_pattern() {
            rng.gen::<f64>() + 0.5
        } else {
            1.0
        };
        if let Some(edge) = graph.edge_mut(id) {
            edge.radius = CAPILLARY_RADIUS * jitter;
        }
    }

    let follows = mode.follows();
    let keep = |graph: &VesselGraph, id: EdgeId| {
        follows.map_or(true, |cat| graph.edge(id).is_some_and(|e| e.category() == cat))
    };

    let mut frontier: IndexSet<EdgeId> = IndexSet::new();
    for &id in seeds {
        let (children, _) = step(graph, id, mode);
        frontier.extend(children.into_iter().filter(|e| keep(graph, *e)));
    }

    let mut layers = 0;
    while !frontier.is_empty() {
        layers += 1;
        let mut next: IndexSet<EdgeId> = IndexSet::new();
        let mut changed = false;
        for &id in &frontier {
            let (children, stepped) = step(graph, id, mode);
            changed |= stepped;
            next.extend(children.into_iter().filter(|e| keep(graph, *e)));
        }
        if !changed && next == frontier {
            debug!(layers, stalled = next.len(), "radius propagation stalled");
            break;
        }
        frontier = next;
    }
    debug!(layers, ?mode, "radius propagation finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use angio_core::{Coord, EdgeType, Vessel};
    use rand::SeedableRng;

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y, 0)
    }

    fn edge(g: &mut VesselGraph, from: Coord, to: Coord, kind: EdgeType, radius: f64) -> EdgeId {
        g.add_edge(Vessel::new(from, to, kind).with_radius(radius).with_length(10.0))
            .unwrap()
    }

    fn murray_sum(r: f64) -> f64 {
        r.powf(MURRAY_EXPONENT)
    }

    #[test]
    fn parent_of_two_branches_obeys_murray() {
        let r = murray_parent(4.0, 6.0);
        assert!((murray_sum(r) - murray_sum(4.0) - murray_sum(6.0)).abs() < 1e-8 * murray_sum(r));
    }

    #[test]
    fn remainder_inverts_parent() {
        let parent = murray_parent(4.0, 6.0);
        assert!((murray_remainder(parent, 6.0) - 4.0).abs() < 1e-9);
        assert!((murray_remainder(6.0, parent) - 4.0).abs() < 1e-9);
        assert_eq!(murray_remainder(5.0, 5.0), 5.0);
        // A tiny remainder is floored.
        assert_eq!(murray_remainder(5.0, 4.999), MINIMUM_CAPILLARY_RADIUS);
    }

    #[test]
    fn even_split_is_floored() {
        let r = even_split(10.0);
        assert!((2.0 * murray_sum(r) - murray_sum(10.0)).abs() < 1e-8 * murray_sum(10.0));
        assert_eq!(even_split(2.0), MINIMUM_CAPILLARY_RADIUS);
    }

    #[test]
    fn upstream_merge_follows_murray() {
        // Two capillaries feed m from a single artery p -> a.
        //   p -> a -> b1 -> m
        //        a -> b2 -> m
        // b1 and b2 seeded; the artery into a combines them.
        let mut g = VesselGraph::new();
        let parent = edge(&mut g, c(0, 0), c(1, 0), EdgeType::Artery, 0.0);
        let b1 = edge(&mut g, c(1, 0), c(2, 1), EdgeType::Capillary, 0.0);
        let b2 = edge(&mut g, c(1, 0), c(2, -1), EdgeType::Capillary, 0.0);
        edge(&mut g, c(2, 1), c(3, 0), EdgeType::Vein, 0.0);
        edge(&mut g, c(2, -1), c(3, 0), EdgeType::Vein, 0.0);

        let mut rng = SimRng::seed_from_u64(7);
        update_radii(&mut g, &[b1, b2], RadiusMode::UpstreamAll, &mut rng);

        let r = g.edge(parent).unwrap().radius;
        let expected = murray_parent(CAPILLARY_RADIUS, CAPILLARY_RADIUS);
        assert!((r - expected).abs() < 1e-8, "parent {r}, expected {expected}");
    }

    #[test]
    fn downstream_split_fills_unknown_branch() {
        // Seeded capillary s flows into node n which splits into v1 (known)
        // and v2 (unknown); v1 and v2 drain to separate vein roots.
        let mut g = VesselGraph::new();
        let s = edge(&mut g, c(0, 0), c(1, 0), EdgeType::Capillary, 0.0);
        let v1 = edge(&mut g, c(1, 0), c(2, 1), EdgeType::Vein, 3.0);
        let v2 = edge(&mut g, c(1, 0), c(2, -1), EdgeType::Vein, 0.0);

        let mut rng = SimRng::seed_from_u64(1);
        update_radii(&mut g, &[s], RadiusMode::DownstreamVeins, &mut rng);

        let r2 = g.edge(v2).unwrap().radius;
        assert!((r2 - murray_remainder(CAPILLARY_RADIUS, 3.0)).abs() < 1e-12);
        assert_eq!(g.edge(v1).unwrap().radius, 3.0);
    }

    #[test]
    fn pass_through_copies_radius() {
        let mut g = VesselGraph::new();
        let a1 = edge(&mut g, c(0, 0), c(1, 0), EdgeType::Artery, 0.0);
        let a2 = edge(&mut g, c(1, 0), c(2, 0), EdgeType::Artery, 0.0);
        let seed = edge(&mut g, c(2, 0), c(3, 0), EdgeType::Capillary, 0.0);

        let mut rng = SimRng::seed_from_u64(1);
        update_radii(&mut g, &[seed], RadiusMode::UpstreamArteries, &mut rng);
        assert_eq!(g.edge(a2).unwrap().radius, CAPILLARY_RADIUS);
        assert_eq!(g.edge(a1).unwrap().radius, CAPILLARY_RADIUS);
    }

    #[test]
    fn pattern_seeds_are_jittered_reproducibly() {
        let build = || {
            let mut g = VesselGraph::new();
            let seed = edge(&mut g, c(1, 0), c(2, 0), EdgeType::Capillary, 0.0);
            let up = edge(&mut g, c(0, 0), c(1, 0), EdgeType::Artery, 0.0);
            (g, seed, up)
        };

        let (mut g1, s1, u1) = build();
        let (mut g2, s2, u2) = build();
        update_radii(&mut g1, &[s1], RadiusMode::UpstreamPattern, &mut SimRng::seed_from_u64(42));
        update_radii(&mut g2, &[s2], RadiusMode::UpstreamPattern, &mut SimRng::seed_from_u64(42));

        let r = g1.edge(s1).unwrap().radius;
        assert!((0.5 * CAPILLARY_RADIUS..1.5 * CAPILLARY_RADIUS).contains(&r));
        assert_eq!(r, g2.edge(s2).unwrap().radius);
        assert_eq!(g1.edge(u1).unwrap().radius, r);
        assert_eq!(g2.edge(u2).unwrap().radius, r);
    }

    #[test]
    fn cycle_terminates() {
        let mut g = VesselGraph::new();
        let seed = edge(&mut g, c(0, 0), c(1, 0), EdgeType::Capillary, 0.0);
        edge(&mut g, c(1, 0), c(1, 1), EdgeType::Capillary, 0.0);
        edge(&mut g, c(1, 1), c(0, 1), EdgeType::Capillary, 0.0);
        edge(&mut g, c(0, 1), c(0, 0), EdgeType::Capillary, 0.0);
        edge(&mut g, c(2, 1), c(0, 1), EdgeType::Capillary, 0.0);

        let mut rng = SimRng::seed_from_u64(3);
        update_radii(&mut g, &[seed], RadiusMode::UpstreamAll, &mut rng);
        assert!(g.edges().all(|(_, e)| e.radius >= MINIMUM_CAPILLARY_RADIUS));
    }

    #[test]
    fn stalled_frontier_terminates() {
        // Node n has two inlets and two outlets, which matches no rule, so
        // the inlet a never gets a radius and keeps re-queueing itself.
        let mut g = VesselGraph::new();
        let n = c(1, 0);
        edge(&mut g, c(-1, 0), c(0, 0), EdgeType::Capillary, 0.0);
        let a = edge(&mut g, c(0, 0), n, EdgeType::Capillary, 0.0);
        edge(&mut g, c(0, 1), n, EdgeType::Capillary, 0.0);
        let seed = edge(&mut g, n, c(2, 0), EdgeType::Capillary, 0.0);
        edge(&mut g, n, c(2, 1), EdgeType::Capillary, 0.0);

        let mut rng = SimRng::seed_from_u64(3);
        update_radii(&mut g, &[seed], RadiusMode::UpstreamAll, &mut rng);
        assert_eq!(g.edge(seed).unwrap().radius, CAPILLARY_RADIUS);
        assert_eq!(g.edge(a).unwrap().radius, 0.0);
    }
}
