//! The vascular network facade.
//!
//! [`VascularNetwork`] owns the graph, the arterial and venous roots and the
//! linear solver, and sequences the engine's stages for callers: building
//! from a [`NetworkSpec`], seeding boundary conditions, repairing after a
//! structural change and exporting a [`NetworkReport`].

use angio_core::{Coord, EdgeCategory, EdgeId, EdgeLevel, EdgeType, Root, Vessel, VesselGraph};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::NetworkSpec;
use crate::environment::Lattice;
use crate::error::SimError;
use crate::hemodynamics::{set_leaf_pressures, set_root_pressures, wall_thickness};
use crate::perfusion::check_perfused;
use crate::radius::{update_radii, RadiusMode};
use crate::remodel::Circulation;
use crate::reduction::{update_graph, update_traverse};
use crate::solver::{LinearSolver, SorSolver};
use crate::SimRng;

/// A vessel graph together with its boundary conditions and solver.
pub struct VascularNetwork {
    graph: VesselGraph,
    arteries: Vec<Root>,
    veins: Vec<Root>,
    solver: Box<dyn LinearSolver>,
    artery_pressure: f64,
    vein_pressure: f64,
}

impl VascularNetwork {
    /// Wraps an existing graph. Roots are split by category; capillary
    /// roots are dropped.
    pub fn new(graph: VesselGraph, roots: Vec<Root>) -> Self {
        let (arteries, rest): (Vec<Root>, Vec<Root>) = roots
            .into_iter()
            .partition(|r| r.category() == EdgeCategory::Artery);
        let veins = rest
            .into_iter()
            .filter(|r| r.category() == EdgeCategory::Vein)
            .collect();
        VascularNetwork {
            graph,
            arteries,
            veins,
            solver: Box::new(SorSolver::default()),
            artery_pressure: f64::NAN,
            vein_pressure: f64::NAN,
        }
    }

    /// Builds a network from its description. Missing lengths come from
    /// `lattice`.
    pub fn from_spec(spec: &NetworkSpec, lattice: &dyn Lattice) -> Result<Self, SimError> {
        let mut graph = VesselGraph::new();
        let mut ids = Vec::with_capacity(spec.edges.len());
        for edge in &spec.edges {
            let length = edge
                .length
                .unwrap_or_else(|| lattice.edge_length(edge.from, edge.to));
            let vessel = Vessel::new(edge.from, edge.to, edge.kind)
                .with_radius(edge.radius)
                .with_wall(edge.wall.unwrap_or(0.0))
                .with_length(length)
                .with_level(edge.level);
            ids.push(graph.add_edge(vessel)?);
        }

        let mut roots = Vec::with_capacity(spec.roots.len());
        for (index, root) in spec.roots.iter().enumerate() {
            let (Some(&id), Some(edge)) = (ids.get(root.edge), spec.edges.get(root.edge)) else {
                return Err(SimError::UnknownRoot {
                    index,
                    edge: root.edge,
                });
            };
            let kind = EdgeType::from_code(&root.code).ok_or_else(|| SimError::InvalidRootType {
                index,
                code: root.code.clone(),
            })?;
            let node = match kind.category() {
                EdgeCategory::Vein => edge.to,
                _ => edge.from,
            };
            roots.push(Root::new(node, id, kind));
        }

        info!(
            edges = graph.edge_count(),
            nodes = graph.node_count(),
            roots = roots.len(),
            "network built"
        );
        Ok(Self::new(graph, roots))
    }

    /// Replaces the linear solver.
    pub fn with_solver(mut self, solver: impl LinearSolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    /// Seeds boundary conditions and brings the network to a solved state.
    ///
    /// Vessels without a wall thickness get one from their radius. Arterial
    /// roots share the highest root pressure, venous roots the lowest.
    pub fn initialize(&mut self) {
        for (_, edge) in self.graph.edges_mut() {
            if edge.wall <= 0.0 {
                edge.wall = wall_thickness(edge.radius);
            }
        }
        self.artery_pressure = set_root_pressures(&mut self.graph, &self.arteries, EdgeCategory::Artery);
        self.vein_pressure = set_root_pressures(&mut self.graph, &self.veins, EdgeCategory::Vein);
        set_leaf_pressures(&mut self.graph, self.artery_pressure, self.vein_pressure);
        debug!(
            artery = self.artery_pressure,
            vein = self.vein_pressure,
            "root pressures assigned"
        );
        self.refresh();
    }

    /// Re-runs reduction, the hemodynamic solve and perfusion marking.
    pub fn refresh(&mut self) {
        update_graph(&mut self.graph, self.solver.as_ref());
        self.check_perfused();
    }

    /// Recomputes perfusion flags only.
    pub fn check_perfused(&mut self) {
        check_perfused(&mut self.graph, &self.arteries, &self.veins);
    }

    /// Propagates radii from every capillary with `mode`.
    pub fn update_radii(&mut self, mode: RadiusMode, rng: &mut SimRng) {
        let seeds = self.edges_by_type(&[EdgeType::Capillary]);
        update_radii(&mut self.graph, &seeds, mode, rng);
    }

    /// Removes low-flow vessels around every node. Returns the number of
    /// removed edges.
    pub fn prune_low_flow(&mut self, remove_min: bool) -> usize {
        let nodes = self.graph.node_coords();
        let removed = update_traverse(&mut self.graph, &nodes, remove_min, self.solver.as_ref());
        if removed > 0 {
            self.check_perfused();
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &VesselGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut VesselGraph {
        &mut self.graph
    }

    /// The graph and the solver, borrowed together for driver steps.
    pub fn parts_mut(&mut self) -> (&mut VesselGraph, &dyn LinearSolver) {
        (&mut self.graph, self.solver.as_ref())
    }

    /// The graph with its roots and solver, for drivers that rebalance flow
    /// against the boundary conditions.
    pub fn circulation_mut(&mut self) -> (&mut VesselGraph, Circulation<'_>) {
        let circulation = Circulation {
            arteries: &self.arteries,
            veins: &self.veins,
            solver: self.solver.as_ref(),
        };
        (&mut self.graph, circulation)
    }

    pub fn solver(&self) -> &dyn LinearSolver {
        self.solver.as_ref()
    }

    pub fn arteries(&self) -> &[Root] {
        &self.arteries
    }

    pub fn veins(&self) -> &[Root] {
        &self.veins
    }

    /// Shared arterial root pressure, NaN before initialization.
    pub fn artery_pressure(&self) -> f64 {
        self.artery_pressure
    }

    /// Shared venous root pressure, NaN before initialization.
    pub fn vein_pressure(&self) -> f64 {
        self.vein_pressure
    }

    /// Edges of any of `kinds`, in id order.
    pub fn edges_by_type(&self, kinds: &[EdgeType]) -> Vec<EdgeId> {
        self.graph
            .edges()
            .filter(|(_, e)| kinds.contains(&e.kind))
            .map(|(id, _)| id)
            .collect()
    }

    /// Edges of any of `kinds` at `level`, in id order.
    pub fn edges_by_type_at(&self, kinds: &[EdgeType], level: EdgeLevel) -> Vec<EdgeId> {
        self.graph
            .edges()
            .filter(|(_, e)| kinds.contains(&e.kind) && e.level == level)
            .map(|(id, _)| id)
            .collect()
    }

    /// Edges of any of `kinds` whose TO node has no outlet.
    pub fn leaves_by_type(&self, kinds: &[EdgeType]) -> Vec<EdgeId> {
        self.graph
            .edges()
            .filter(|(_, e)| kinds.contains(&e.kind) && self.graph.out_degree(e.to) == 0)
            .map(|(id, _)| id)
            .collect()
    }

    /// Snapshot of every edge and node for export.
    pub fn report(&self) -> NetworkReport {
        let edges: Vec<EdgeReport> = self
            .graph
            .edges()
            .map(|(id, e)| EdgeReport {
                id,
                from: e.from,
                to: e.to,
                kind: e.kind,
                radius: e.radius,
                wall: e.wall,
                length: e.length,
                flow: finite(e.flow),
                shear: finite(e.shear),
                circum: finite(e.circum),
                area: finite(e.area),
                is_root: e.is_root,
                is_ignored: e.is_ignored,
                is_perfused: e.is_perfused,
                is_angiogenic: e.is_angiogenic,
            })
            .collect();
        let nodes: Vec<NodeReport> = self
            .graph
            .nodes()
            .map(|n| NodeReport {
                coord: n.coord,
                pressure: finite(n.pressure),
                oxygen: finite(n.oxygen),
                is_root: n.is_root,
            })
            .collect();
        NetworkReport {
            artery_pressure: finite(self.artery_pressure),
            vein_pressure: finite(self.vein_pressure),
            perfused: edges.iter().filter(|e| e.is_perfused).count(),
            ignored: edges.iter().filter(|e| e.is_ignored).count(),
            edges,
            nodes,
        }
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Exported network state. Undefined quantities (NaN) are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub artery_pressure: Option<f64>,
    pub vein_pressure: Option<f64>,
    pub perfused: usize,
    pub ignored: usize,
    pub edges: Vec<EdgeReport>,
    pub nodes: Vec<NodeReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeReport {
    pub id: EdgeId,
    pub from: Coord,
    pub to: Coord,
    pub kind: EdgeType,
    pub radius: f64,
    pub wall: f64,
    pub length: f64,
    pub flow: Option<f64>,
    pub shear: Option<f64>,
    pub circum: Option<f64>,
    pub area: Option<f64>,
    pub is_root: bool,
    pub is_ignored: bool,
    pub is_perfused: bool,
    pub is_angiogenic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub coord: Coord,
    pub pressure: Option<f64>,
    pub oxygen: Option<f64>,
    pub is_root: bool,
}
