//! Wall degradation near non-healthy tissue.

use angio_core::{EdgeId, VesselGraph};
use indexmap::{IndexMap, IndexSet};
use serde_json::json;

use crate::config::{ComponentSummary, DegradeConfig};
use crate::environment::{AgentGrid, CellCategory, Lattice, Location};
use crate::hemodynamics::{calc_stress, MINIMUM_WALL_THICKNESS};
use crate::reduction::{disconnect_edge, update_graph};
use crate::solver::LinearSolver;

/// Thins the walls of vessels running through non-healthy tissue and
/// removes those that collapse.
#[derive(Debug, Clone, PartialEq)]
pub struct Degrade {
    config: DegradeConfig,
    /// Wall loss per tick [um/min].
    rate: f64,
}

impl Degrade {
    pub fn new(config: DegradeConfig) -> Self {
        Degrade {
            config,
            rate: config.degradation_rate / 60.0,
        }
    }

    pub fn interval(&self) -> u32 {
        self.config.interval
    }

    /// Runs one degradation step. Returns the number of removed edges.
    ///
    /// Exposure is broad: an occupant of any category other than
    /// [`CellCategory::Healthy`] along the span counts, not only cancerous
    /// cells. An exposed vessel loses wall thickness, down to the minimum. A vessel at the minimum whose shear is
    /// below the threshold, or NaN, is removed.
    pub fn step(
        &self,
        graph: &mut VesselGraph,
        lattice: &dyn Lattice,
        agents: &dyn AgentGrid,
        solver: &dyn LinearSolver,
    ) -> usize {
        let mut removed = 0;
        for id in graph.edge_ids() {
            if !self.is_exposed(graph, id, lattice, agents) {
                continue;
            }
            let Some(edge) = graph.edge_mut(id) else {
                continue;
            };
            edge.wall = (edge.wall - self.rate).max(MINIMUM_WALL_THICKNESS);
            let collapses = edge.wall <= MINIMUM_WALL_THICKNESS
                && (edge.shear < self.config.shear_threshold || edge.shear.is_nan());
            if collapses && disconnect_edge(graph, id).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            update_graph(graph, solver);
        } else {
            calc_stress(graph);
        }
        removed
    }

    fn is_exposed(
        &self,
        graph: &VesselGraph,
        id: EdgeId,
        lattice: &dyn Lattice,
        agents: &dyn AgentGrid,
    ) -> bool {
        let Some(edge) = graph.edge(id) else {
            return false;
        };
        let locations: IndexSet<Location> = lattice
            .span(edge.from, edge.to)
            .into_iter()
            .map(|voxel| lattice.location(voxel))
            .collect();
        let locations: Vec<Location> = locations.into_iter().collect();
        agents
            .categories_at(&locations)
            .into_iter()
            .any(|c| c != CellCategory::Healthy)
    }

    pub fn summary(&self) -> ComponentSummary {
        let mut specs = IndexMap::new();
        specs.insert("DEGRADATION_RATE".to_string(), json!(self.config.degradation_rate));
        specs.insert("SHEAR_THRESHOLD".to_string(), json!(self.config.shear_threshold));
        ComponentSummary {
            kind: "DEGRADE".to_string(),
            interval: self.config.interval,
            specs,
        }
    }
}
