//! Sprouting toward growth-factor gradients.
//!
//! # Architecture
//!
//! Sprouts live in the driver until they reach the network; nothing is
//! written to the graph for a sprout that has not joined. Each step runs
//! three phases.
//!
//! 1. **Start.** Endpoints of active vessels are candidates, except a lone
//!    inlet or a dead end. A candidate must not be a root, must have fewer
//!    than three incident vessels and no ignored one, must not already hold
//!    a sprout, and must be past its migration cooldown. The field is
//!    sampled along the voxel span of every lattice direction; when the mean
//!    of all samples exceeds the threshold the [`WalkType`] picks one of the
//!    directions its vessels do not already take.
//! 2. **Extend.** Every sprout past its migration cooldown moves its tip one
//!    lattice step. A free coordinate lengthens it. A node with both inlets
//!    and outlets, or a coordinate another sprout holds, completes it. Any
//!    other target discards it, and so does reaching the length limit.
//! 3. **Join.** Completed sprouts go through [`Anastomosis`], which orients
//!    them by pressure, sizes them and rebalances flow around them.

use angio_core::{Coord, EdgeLevel, VesselGraph};
use indexmap::{IndexMap, IndexSet};
use rand::Rng;
use serde_json::json;
use tracing::{debug, info};

use super::anastomosis::Anastomosis;
use crate::config::{ComponentSummary, GrowthConfig, WalkType};
use crate::environment::{Lattice, ScalarField};
use crate::hemodynamics::calc_stress;
use crate::network::VascularNetwork;
use crate::reduction::update_graph;
use crate::SimRng;

/// Adds angiogenic capillaries where the growth-factor signal is strong.
#[derive(Debug, Clone, PartialEq)]
pub struct Growth {
    config: GrowthConfig,
    walk: WalkType,
    interval: u32,
    max_edges: u32,
    sprouts: IndexMap<Coord, Sprout>,
}

/// A sprout that has not reached the network yet, keyed by its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprout {
    direction: usize,
    path: Vec<Coord>,
    last_extended: f64,
}

impl Sprout {
    fn new(direction: usize) -> Self {
        Sprout {
            direction,
            path: Vec::new(),
            last_extended: f64::NEG_INFINITY,
        }
    }

    /// Lattice direction the sprout grows in.
    pub fn direction(&self) -> usize {
        self.direction
    }

    /// Coordinates the tip has moved through, origin excluded.
    pub fn path(&self) -> &[Coord] {
        &self.path
    }
}

/// Where one step of a sprout lands.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Reach {
    Free,
    /// A node that can take the sprout.
    Network,
    /// The `index`-th coordinate of the sprout started at `origin`.
    Sprout { origin: Coord, index: usize },
    Blocked,
}

/// Mean field signal per direction. `None` for directions leaving the
/// lattice.
struct Signal {
    per_direction: Vec<Option<f64>>,
    mean: f64,
}

impl Growth {
    /// Resolves the walk policy once and derives the sprout limit and the
    /// step interval from the lattice edge size.
    pub fn new(config: GrowthConfig, lattice: &dyn Lattice) -> Self {
        let walk = WalkType::parse(&config.walk_type);
        let edge_size = lattice.grid_size() * f64::from(config.level.scale());
        let max_edges = if edge_size > 0.0 {
            (config.max_length / edge_size).floor().max(0.0) as u32
        } else {
            0
        };
        let interval = config
            .interval
            .unwrap_or(if config.migration_rate < edge_size { 60 } else { 30 });
        Growth {
            config,
            walk,
            interval,
            max_edges,
            sprouts: IndexMap::new(),
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn walk(&self) -> WalkType {
        self.walk
    }

    pub fn max_edges(&self) -> u32 {
        self.max_edges
    }

    /// Sprouts still growing, keyed by origin in start order.
    pub fn sprouts(&self) -> &IndexMap<Coord, Sprout> {
        &self.sprouts
    }

    /// Runs one growth step at time `tick`. Returns the number of edges
    /// added by sprouts that joined the network.
    pub fn step(
        &mut self,
        network: &mut VascularNetwork,
        lattice: &dyn Lattice,
        field: &dyn ScalarField,
        tick: f64,
        rng: &mut SimRng,
    ) -> usize {
        let (graph, circulation) = network.circulation_mut();
        let started = self.start_sprouts(graph, lattice, field, tick, rng);
        let joined = self.extend_sprouts(graph, lattice, tick);
        debug!(tick, started, pending = self.sprouts.len(), joined = joined.len(), "growth step");

        let anastomosis = Anastomosis {
            circulation,
            lattice,
            level: self.config.level,
            strategy: self.config.flow_strategy,
            tick,
        };
        let added: usize = joined
            .iter()
            .filter_map(|chain| anastomosis.connect(graph, chain))
            .map(|ids| ids.len())
            .sum();

        if added > 0 {
            info!(tick, added, "sprouts joined the network");
            update_graph(graph, circulation.solver);
        } else {
            calc_stress(graph);
        }
        added
    }

    /// Starts a sprout at every candidate whose signal clears the threshold.
    /// Returns how many started.
    fn start_sprouts(
        &mut self,
        graph: &mut VesselGraph,
        lattice: &dyn Lattice,
        field: &dyn ScalarField,
        tick: f64,
        rng: &mut SimRng,
    ) -> usize {
        let mut started = 0;
        for node in self.candidates(graph, tick) {
            let signal = sample(lattice, field, node, self.config.level);
            if signal.mean <= self.config.vegf_threshold {
                continue;
            }
            let allowed = free_directions(graph, lattice, node, &signal);
            let Some(direction) = self.choose(&allowed, &signal, rng) else {
                continue;
            };
            if let Some(state) = graph.node_mut(node) {
                state.last_update = tick;
            }
            self.sprouts.insert(node, Sprout::new(direction));
            started += 1;
        }
        started
    }

    /// Endpoints of active vessels that may start a sprout, in edge order.
    fn candidates(&self, graph: &VesselGraph, tick: f64) -> Vec<Coord> {
        let mut ends = IndexSet::new();
        for (_, edge) in graph.edges().filter(|(_, e)| !e.is_ignored) {
            if !is_lone_inlet(graph, edge.from) {
                ends.insert(edge.from);
            }
            if !is_dead_end(graph, edge.to) {
                ends.insert(edge.to);
            }
        }
        ends.into_iter()
            .filter(|&c| self.is_candidate(graph, c, tick))
            .collect()
    }

    fn is_candidate(&self, graph: &VesselGraph, coord: Coord, tick: f64) -> bool {
        let Some(node) = graph.node(coord) else {
            return false;
        };
        !node.is_root
            && graph.degree(coord) < 3
            && !self.sprouts.contains_key(&coord)
            && !touches_ignored(graph, coord)
            && tick - node.last_update >= self.config.migration_rate
    }

    /// Moves every due sprout one step. Returns the coordinate chains of the
    /// sprouts that completed, each running between two network nodes.
    fn extend_sprouts(&mut self, graph: &VesselGraph, lattice: &dyn Lattice, tick: f64) -> Vec<Vec<Coord>> {
        let mut joined = Vec::new();
        let origins: Vec<Coord> = self.sprouts.keys().copied().collect();
        for origin in origins {
            let Some(sprout) = self.sprouts.get(&origin) else {
                continue;
            };
            // The origin may have been saturated, cut off or removed since.
            if !graph.contains_node(origin) || graph.degree(origin) >= 3 || touches_ignored(graph, origin) {
                self.discard(origin);
                continue;
            }
            if tick - sprout.last_extended < self.config.migration_rate {
                continue;
            }
            let tip = sprout.path.last().copied().unwrap_or(origin);
            let target = lattice
                .offset(tip, sprout.direction, self.config.level)
                .filter(|t| lattice.contains(*t));
            let Some(target) = target.filter(|_| sprout.path.len() < self.max_edges as usize) else {
                self.discard(origin);
                continue;
            };

            match self.reach(graph, origin, target) {
                Reach::Free => {
                    if let Some(sprout) = self.sprouts.get_mut(&origin) {
                        sprout.path.push(target);
                        sprout.last_extended = tick;
                    }
                }
                Reach::Network => {
                    if let Some(sprout) = self.sprouts.shift_remove(&origin) {
                        let mut chain = vec![origin];
                        chain.extend(sprout.path);
                        chain.push(target);
                        joined.push(chain);
                    }
                }
                Reach::Sprout { origin: other, index } => {
                    let mine = self.sprouts.shift_remove(&origin);
                    let theirs = self.sprouts.shift_remove(&other);
                    if let (Some(mine), Some(theirs)) = (mine, theirs) {
                        let mut chain = vec![origin];
                        chain.extend(mine.path);
                        chain.extend(theirs.path.iter().take(index + 1).rev());
                        chain.push(other);
                        joined.push(chain);
                    }
                }
                Reach::Blocked => self.discard(origin),
            }
        }
        joined
    }

    /// Classifies the coordinate the sprout started at `origin` would move to.
    fn reach(&self, graph: &VesselGraph, origin: Coord, target: Coord) -> Reach {
        let own = self.sprouts.get(&origin).map_or(&[][..], |s| s.path.as_slice());
        if target == origin || own.contains(&target) {
            return Reach::Blocked;
        }
        if let Some(node) = graph.node(target) {
            let adjacent = own.is_empty() && (graph.has_edge(origin, target) || graph.has_edge(target, origin));
            let joinable = !node.is_root
                && graph.degree(target) < 3
                && graph.in_degree(target) > 0
                && graph.out_degree(target) > 0
                && !adjacent;
            return if joinable { Reach::Network } else { Reach::Blocked };
        }
        self.sprouts
            .iter()
            .filter(|(other, _)| **other != origin)
            .find_map(|(&other, s)| {
                let index = s.path.iter().position(|&c| c == target)?;
                Some(Reach::Sprout { origin: other, index })
            })
            .unwrap_or(Reach::Free)
    }

    fn discard(&mut self, origin: Coord) {
        if let Some(sprout) = self.sprouts.shift_remove(&origin) {
            debug!(%origin, length = sprout.path.len(), "sprout discarded");
        }
    }

    fn choose(&self, allowed: &[usize], signal: &Signal, rng: &mut SimRng) -> Option<usize> {
        if allowed.is_empty() {
            return None;
        }
        let weight = |dir: usize| {
            signal.per_direction[dir]
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(0.0)
        };
        match self.walk {
            WalkType::Random => Some(allowed[rng.gen_range(0..allowed.len())]),
            WalkType::Biased => {
                let total: f64 = allowed.iter().map(|&d| weight(d)).sum();
                if total <= 0.0 {
                    return Some(allowed[rng.gen_range(0..allowed.len())]);
                }
                let draw = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                for &dir in allowed {
                    cumulative += weight(dir);
                    if draw < cumulative {
                        return Some(dir);
                    }
                }
                allowed.last().copied()
            }
            WalkType::Deterministic => {
                let mut best = allowed[0];
                for &dir in &allowed[1..] {
                    if weight(dir) > weight(best) {
                        best = dir;
                    }
                }
                Some(best)
            }
        }
    }

    pub fn summary(&self) -> ComponentSummary {
        let mut specs = IndexMap::new();
        specs.insert("MIGRATION_RATE".to_string(), json!(self.config.migration_rate));
        specs.insert("VEGF_THRESHOLD".to_string(), json!(self.config.vegf_threshold));
        specs.insert("WALK_TYPE".to_string(), json!(self.config.walk_type));
        specs.insert("MAX_LENGTH".to_string(), json!(self.config.max_length));
        ComponentSummary {
            kind: "GROWTH".to_string(),
            interval: self.interval,
            specs,
        }
    }
}

fn sample(lattice: &dyn Lattice, field: &dyn ScalarField, node: Coord, level: EdgeLevel) -> Signal {
    let mut total = 0.0;
    let mut count = 0usize;
    let per_direction = (0..lattice.direction_count())
        .map(|dir| {
            let target = lattice.offset(node, dir, level).filter(|t| lattice.contains(*t))?;
            let values: Vec<f64> = lattice
                .span(node, target)
                .into_iter()
                .map(|voxel| field.value_at(voxel))
                .collect();
            if values.is_empty() {
                return None;
            }
            let sum: f64 = values.iter().sum();
            total += sum;
            count += values.len();
            Some(sum / values.len() as f64)
        })
        .collect();
    let mean = if count == 0 { 0.0 } else { total / count as f64 };
    Signal { per_direction, mean }
}

/// In-bounds directions not already used by a vessel at `node`.
fn free_directions(graph: &VesselGraph, lattice: &dyn Lattice, node: Coord, signal: &Signal) -> Vec<usize> {
    let mut used = Vec::new();
    for id in graph.edges_out(node) {
        if let Some(e) = graph.edge(id) {
            used.extend(lattice.direction_between(node, e.to));
        }
    }
    for id in graph.edges_in(node) {
        if let Some(e) = graph.edge(id) {
            used.extend(lattice.direction_between(node, e.from));
        }
    }
    (0..lattice.direction_count())
        .filter(|d| signal.per_direction[*d].is_some() && !used.contains(d))
        .collect()
}

fn is_lone_inlet(graph: &VesselGraph, coord: Coord) -> bool {
    graph.in_degree(coord) == 0 && graph.out_degree(coord) == 1
}

fn is_dead_end(graph: &VesselGraph, coord: Coord) -> bool {
    graph.in_degree(coord) == 1 && graph.out_degree(coord) == 0
}

fn touches_ignored(graph: &VesselGraph, coord: Coord) -> bool {
    graph
        .edges_in(coord)
        .into_iter()
        .chain(graph.edges_out(coord))
        .any(|id| graph.edge(id).is_some_and(|e| e.is_ignored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowStrategy;
    use crate::environment::{CubicLattice, GridField, LatticeConfig, UniformField};
    use angio_core::{EdgeId, EdgeType, Root, Vessel};
    use rand::SeedableRng;

    fn lattice() -> CubicLattice {
        CubicLattice::new(LatticeConfig {
            width: 20,
            length: 20,
            height: 1,
            grid_size: 30.0,
            patch_size: 1,
        })
    }

    fn config(walk: &str) -> GrowthConfig {
        GrowthConfig {
            interval: None,
            migration_rate: 60.0,
            vegf_threshold: 0.5,
            walk_type: walk.to_string(),
            max_length: 90.0,
            level: EdgeLevel::Variable,
            flow_strategy: FlowStrategy::Compensate,
        }
    }

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y, 0)
    }

    /// Inlet (0,1) -> (1,1), channels along y = 2 and y = 0 to (5,1), outlet
    /// (5,1) -> (6,1). The lower channel is longer before (3,0), so (3,0)
    /// sits below (3,2) in pressure.
    fn twin() -> VascularNetwork {
        let mut g = VesselGraph::new();
        let mut add = |from: Coord, to: Coord, kind: EdgeType, radius: f64, length: f64| {
            g.add_edge(Vessel::new(from, to, kind).with_radius(radius).with_length(length))
                .unwrap()
        };
        let inlet = add(c(0, 1), c(1, 1), EdgeType::Artery, 6.0, 30.0);
        let upper = [c(1, 1), c(1, 2), c(2, 2), c(3, 2), c(4, 2), c(5, 2), c(5, 1)];
        for pair in upper.windows(2) {
            add(pair[0], pair[1], EdgeType::Capillary, 5.0, 30.0);
        }
        let lower = [c(1, 1), c(1, 0), c(2, 0), c(3, 0), c(4, 0), c(5, 0), c(5, 1)];
        for (i, pair) in lower.windows(2).enumerate() {
            add(pair[0], pair[1], EdgeType::Capillary, 5.0, if i < 3 { 33.0 } else { 30.0 });
        }
        let outlet = add(c(5, 1), c(6, 1), EdgeType::Vein, 6.0, 30.0);
        let mut net = VascularNetwork::new(
            g,
            vec![
                Root::new(c(0, 1), inlet, EdgeType::Artery),
                Root::new(c(6, 1), outlet, EdgeType::Vein),
            ],
        );
        net.initialize();
        net
    }

    fn layout(g: &VesselGraph) -> Vec<(EdgeId, Coord, Coord, f64)> {
        g.edges().map(|(id, e)| (id, e.from, e.to, e.radius)).collect()
    }

    fn radius(g: &VesselGraph, from: Coord, to: Coord) -> f64 {
        g.edge(g.find_edge(from, to).unwrap()).unwrap().radius
    }

    #[test]
    fn derived_limits() {
        let growth = Growth::new(config("MAX"), &lattice());
        assert_eq!(growth.max_edges(), 3);
        assert_eq!(growth.interval(), 30);

        let slow = GrowthConfig {
            migration_rate: 10.0,
            ..config("MAX")
        };
        assert_eq!(Growth::new(slow, &lattice()).interval(), 60);
    }

    #[test]
    fn invalid_walk_falls_back_to_deterministic() {
        assert_eq!(Growth::new(config("zigzag"), &lattice()).walk(), WalkType::Deterministic);
    }

    #[test]
    fn weak_signal_adds_nothing() {
        let mut net = twin();
        let mut rng = SimRng::seed_from_u64(1);
        let mut growth = Growth::new(config("MAX"), &lattice());
        let added = growth.step(&mut net, &lattice(), &UniformField(0.1), 100.0, &mut rng);
        assert_eq!(added, 0);
        assert!(growth.sprouts().is_empty());
        assert_eq!(net.graph().edge_count(), 14);
    }

    #[test]
    fn pending_sprout_leaves_graph_untouched() {
        let mut net = twin();
        let before = layout(net.graph());
        let mut field = GridField::new(0.0);
        field.set(c(3, 3), 10.0);
        let mut rng = SimRng::seed_from_u64(1);
        let mut growth = Growth::new(GrowthConfig { vegf_threshold: 1.0, ..config("MAX") }, &lattice());

        let added = growth.step(&mut net, &lattice(), &field, 100.0, &mut rng);
        assert_eq!(added, 0);
        let sprout = &growth.sprouts()[&c(3, 2)];
        assert_eq!(sprout.direction(), 2);
        assert_eq!(sprout.path(), &[c(3, 3)]);
        assert_eq!(growth.sprouts().len(), 1);
        assert_eq!(layout(net.graph()), before);
        assert!(!net.graph().contains_node(c(3, 3)));
    }

    #[test]
    fn joined_sprout_runs_downhill_with_widened_roots() {
        let mut net = twin();
        let mut field = GridField::new(0.0);
        field.set(c(3, 1), 10.0);
        let mut rng = SimRng::seed_from_u64(1);
        let mut growth = Growth::new(GrowthConfig { vegf_threshold: 1.5, ..config("MAX") }, &lattice());

        // (3,0) starts upward; (3,2) sees the same voxel over a longer span
        // and stays below the threshold.
        assert_eq!(growth.step(&mut net, &lattice(), &field, 100.0, &mut rng), 0);
        assert_eq!(growth.sprouts().keys().copied().collect::<Vec<_>>(), vec![c(3, 0)]);
        assert_eq!(growth.sprouts()[&c(3, 0)].path(), &[c(3, 1)]);

        let added = growth.step(&mut net, &lattice(), &field, 160.0, &mut rng);
        let g = net.graph();
        assert_eq!(added, 2);
        assert!(growth.sprouts().is_empty());
        // Grown upward but laid from high to low pressure.
        assert!(g.has_edge(c(3, 2), c(3, 1)));
        assert!(g.has_edge(c(3, 1), c(3, 0)));
        let sprout = g.edge(g.find_edge(c(3, 2), c(3, 1)).unwrap()).unwrap();
        assert!(sprout.is_angiogenic);
        assert!(sprout.flow > 0.0);
        assert!(radius(g, c(0, 1), c(1, 1)) > 6.0);
        assert!(radius(g, c(5, 1), c(6, 1)) > 6.0);
        assert!(g.node(c(3, 0)).unwrap().is_sprout);
    }

    #[test]
    fn join_needs_a_flowing_node() {
        let mut net = twin();
        // A detached segment: (10,10) only feeds, (11,10) only drains.
        net.graph_mut()
            .add_edge(Vessel::new(c(10, 10), c(11, 10), EdgeType::Capillary).with_radius(5.0))
            .unwrap();
        let growth = Growth::new(config("MAX"), &lattice());
        let g = net.graph();

        assert_eq!(growth.reach(g, c(3, 2), c(3, 0)), Reach::Network);
        assert_eq!(growth.reach(g, c(3, 2), c(3, 1)), Reach::Free);
        // Root.
        assert_eq!(growth.reach(g, c(5, 0), c(6, 1)), Reach::Blocked);
        // Three vessels already.
        assert_eq!(growth.reach(g, c(4, 1), c(5, 1)), Reach::Blocked);
        assert_eq!(growth.reach(g, c(11, 11), c(11, 10)), Reach::Blocked);
        assert_eq!(growth.reach(g, c(10, 11), c(10, 10)), Reach::Blocked);
        // Already linked to the origin.
        assert_eq!(growth.reach(g, c(3, 2), c(4, 2)), Reach::Blocked);
        assert_eq!(growth.reach(g, c(3, 2), c(3, 2)), Reach::Blocked);
    }

    #[test]
    fn sprout_paths_block_and_meet() {
        let net = twin();
        let mut growth = Growth::new(config("MAX"), &lattice());
        let mut rising = Sprout::new(2);
        rising.path.extend([c(3, 1), c(4, 1)]);
        growth.sprouts.insert(c(8, 1), rising);

        assert_eq!(growth.reach(net.graph(), c(8, 1), c(3, 1)), Reach::Blocked);
        assert_eq!(
            growth.reach(net.graph(), c(4, 2), c(4, 1)),
            Reach::Sprout { origin: c(8, 1), index: 1 }
        );
    }

    #[test]
    fn sprouts_meeting_midway_join_each_other() {
        let net = twin();
        let mut growth = Growth::new(config("MAX"), &lattice());
        growth.sprouts.insert(c(3, 2), Sprout::new(3));
        let mut rising = Sprout::new(2);
        rising.path.push(c(3, 1));
        growth.sprouts.insert(c(3, 0), rising);

        let joined = growth.extend_sprouts(net.graph(), &lattice(), 100.0);
        assert_eq!(joined, vec![vec![c(3, 2), c(3, 1), c(3, 0)]]);
        assert!(growth.sprouts().is_empty());
    }

    #[test]
    fn sprouts_stop_at_max_length() {
        let mut net = twin();
        let mut field = GridField::new(0.0);
        for y in 3..8 {
            field.set(c(3, y), 10.0);
        }
        let mut rng = SimRng::seed_from_u64(9);
        let limited = GrowthConfig {
            vegf_threshold: 1.0,
            max_length: 60.0,
            ..config("MAX")
        };
        let mut growth = Growth::new(limited, &lattice());
        assert_eq!(growth.max_edges(), 2);

        growth.step(&mut net, &lattice(), &field, 100.0, &mut rng);
        growth.step(&mut net, &lattice(), &field, 160.0, &mut rng);
        assert_eq!(growth.sprouts()[&c(3, 2)].path(), &[c(3, 3), c(3, 4)]);

        growth.step(&mut net, &lattice(), &field, 220.0, &mut rng);
        assert!(!growth.sprouts().contains_key(&c(3, 2)));
        assert_eq!(net.graph().edge_count(), 14);
    }

    #[test]
    fn roots_never_sprout() {
        let mut net = twin();
        let mut rng = SimRng::seed_from_u64(3);
        let mut growth = Growth::new(config("RANDOM"), &lattice());
        growth.step(&mut net, &lattice(), &UniformField(5.0), 100.0, &mut rng);
        assert!(!growth.sprouts().is_empty());
        assert!(!growth.sprouts().contains_key(&c(0, 1)));
        assert!(!growth.sprouts().contains_key(&c(6, 1)));
        assert_eq!(net.graph().degree(c(0, 1)), 1);
    }

    #[test]
    fn cooldown_blocks_recent_nodes() {
        let mut net = twin();
        for node in net.graph_mut().nodes_mut() {
            node.last_update = 90.0;
        }
        let mut rng = SimRng::seed_from_u64(1);
        let mut growth = Growth::new(config("MAX"), &lattice());
        let added = growth.step(&mut net, &lattice(), &UniformField(5.0), 100.0, &mut rng);
        assert_eq!(added, 0);
        assert!(growth.sprouts().is_empty());
    }

    #[test]
    fn same_seed_same_growth() {
        let run = |seed: u64| {
            let mut net = twin();
            let mut rng = SimRng::seed_from_u64(seed);
            let mut growth = Growth::new(config("BIASED"), &lattice());
            for tick in [100.0, 200.0, 300.0] {
                growth.step(&mut net, &lattice(), &UniformField(5.0), tick, &mut rng);
            }
            (layout(net.graph()), growth.sprouts().clone())
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn summary_snapshot() {
        let growth = Growth::new(config("BIASED"), &lattice());
        insta::assert_json_snapshot!(growth.summary(), @r###"
        {
          "type": "GROWTH",
          "interval": 30,
          "specs": {
            "MIGRATION_RATE": 60.0,
            "VEGF_THRESHOLD": 0.5,
            "WALK_TYPE": "BIASED",
            "MAX_LENGTH": 90.0
          }
        }
        "###);
    }
}
