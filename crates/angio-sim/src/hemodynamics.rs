//! Pressure, flow and stress solution over a vessel graph.
//!
//! # Architecture
//!
//! Nodal pressures follow from conservation of flow at every interior node.
//! [`calc_pressures`] assembles one row per interior node: each incident
//! non-ignored edge adds its Hagen-Poiseuille conductance to the diagonal,
//! interior neighbours contribute negated off-diagonal entries, and boundary
//! neighbours (roots and dangling ends) move to the right-hand side with
//! their fixed pressure. The system is scaled by 1e-7 and handed to a
//! [`LinearSolver`].
//!
//! Flows, areas and stresses are then derived edge by edge. NaN pressures
//! are expected on disconnected nodes and flow through every formula
//! unchanged.

use angio_core::{Coord, EdgeCategory, EdgeId, Root, Vessel, VesselGraph};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::solver::{LinearSolver, SparseMatrix};

/// Radius of a newly formed capillary [um].
pub const CAPILLARY_RADIUS: f64 = 4.0;
/// Largest capillary radius [um].
pub const MAXIMUM_CAPILLARY_RADIUS: f64 = 20.0;
/// Smallest radius any propagated vessel may take [um].
pub const MINIMUM_CAPILLARY_RADIUS: f64 = 2.0;
/// Floor for wall thickness under degradation [um].
pub const MINIMUM_WALL_THICKNESS: f64 = 0.5;
/// Plasma viscosity [mmHg s].
pub const PLASMA_VISCOSITY: f64 = 0.000009;
/// Tolerance for treating two radii as equal.
pub const DELTA_TOLERANCE: f64 = 1e-8;
/// Height of the tissue layer [um].
pub const LAYER_HEIGHT: f64 = 8.7;
/// Murray's law exponent.
pub const MURRAY_EXPONENT: f64 = 2.7;
/// Absolute flow floor used by low-flow pruning [um^3/min].
pub const MINIMUM_FLOW_RATE: f64 = 1000.0;
/// Minimum share of a two-inlet confluence an inlet must carry.
pub const MINIMUM_FLOW_PERCENT: f64 = 0.01;
/// Cap on the pressure/reversal/flow loop.
pub const MAXIMUM_ITERATIONS: usize = 100;

const MAXIMUM_OXYGEN_PRESSURE: f64 = 100.0;
const MINIMUM_OXYGEN_PRESSURE: f64 = 55.0;
const OXYGEN_PRESSURE_SCALE: f64 = 1.0;
const SYSTEM_SCALE: f64 = 1e-7;

// ---------------------------------------------------------------------------
// Closed-form relations
// ---------------------------------------------------------------------------

/// Root pressure for a vessel of the given radius and category [mmHg].
pub fn root_pressure(radius: f64, category: EdgeCategory) -> f64 {
    18.0 + (89.0 - 18.0) / (1.0 + ((radius * category.sign() + 21.0) / 16.0).exp())
}

/// Relative blood viscosity as a function of radius (Pries et al. 1994).
pub fn relative_viscosity(radius: f64) -> f64 {
    let d = 2.0 * radius;
    let mu45 = 6.0 * (-0.085 * d).exp() + 3.2 - 2.44 * (-0.06 * d.powf(0.645)).exp();
    let fr = (d / (d - 1.1)).powi(2);
    (1.0 + (mu45 - 1.0) * fr) * fr
}

/// Flow conductance [um^3/(mmHg min)]. Zero for a vessel without lumen.
pub fn flow_coefficient(radius: f64, length: f64) -> f64 {
    if radius <= 0.0 {
        return 0.0;
    }
    let mu = PLASMA_VISCOSITY * relative_viscosity(radius) / 60.0;
    (std::f64::consts::PI * radius.powi(4)) / (8.0 * mu * length)
}

pub fn edge_coefficient(vessel: &Vessel) -> f64 {
    flow_coefficient(vessel.radius, vessel.length)
}

/// Wall thickness for a vessel of the given radius [um].
pub fn wall_thickness(radius: f64) -> f64 {
    let d = 2.0 * radius;
    d * (0.267 - 0.084 * d.log10())
}

/// Sets every edge's wall from its radius.
pub fn calc_thicknesses(graph: &mut VesselGraph) {
    for (_, edge) in graph.edges_mut() {
        edge.wall = wall_thickness(edge.radius);
    }
}

/// Flow through one unbranched segment.
pub fn local_flow(radius: f64, length: f64, delta_p: f64) -> f64 {
    flow_coefficient(radius, length) * delta_p
}

/// Flow through a branch-free run of edges sharing one radius.
pub fn chain_flow(graph: &VesselGraph, radius: f64, edges: &[EdgeId], delta_p: f64) -> f64 {
    let length: f64 = edges
        .iter()
        .filter_map(|id| graph.edge(*id))
        .map(|e| e.length)
        .sum();
    local_flow(radius, length, delta_p)
}

/// Oxygen partial pressure carried by a vessel of the given radius [mmHg].
pub fn partial_pressure(radius: f64) -> f64 {
    (MINIMUM_OXYGEN_PRESSURE + OXYGEN_PRESSURE_SCALE * radius).min(MAXIMUM_OXYGEN_PRESSURE)
}

// ---------------------------------------------------------------------------
// Boundary conditions
// ---------------------------------------------------------------------------

/// Assigns one shared pressure to every root of `category`.
///
/// Arteries take the maximum root pressure across their bounding edges,
/// veins the minimum. Roots whose edge no longer exists do not take part.
/// Returns the assigned pressure, NaN when no root qualified.
pub fn set_root_pressures(graph: &mut VesselGraph, roots: &[Root], category: EdgeCategory) -> f64 {
    let candidates = roots.iter().filter_map(|root| {
        graph
            .edge(root.edge)
            .map(|e| root_pressure(e.radius, e.category()))
    });
    let extreme = match category {
        EdgeCategory::Vein => candidates.reduce(f64::min),
        _ => candidates.reduce(f64::max),
    };
    let Some(pressure) = extreme.filter(|p| !p.is_nan()) else {
        return f64::NAN;
    };

    for root in roots {
        if let Some(node) = graph.node_mut(root.node) {
            node.pressure = pressure;
            node.is_root = true;
        }
        if let Some(edge) = graph.edge_mut(root.edge) {
            edge.is_root = true;
        }
    }
    pressure
}

/// Gives every non-root sink node the artery or vein pressure, chosen by
/// the category of the edge that ends there.
pub fn set_leaf_pressures(graph: &mut VesselGraph, artery_pressure: f64, vein_pressure: f64) {
    let sinks: Vec<(Coord, EdgeCategory)> = graph
        .edges()
        .filter(|(_, e)| graph.out_degree(e.to) == 0)
        .map(|(_, e)| (e.to, e.category()))
        .collect();
    for (coord, category) in sinks {
        if let Some(node) = graph.node_mut(coord) {
            if !node.is_root {
                node.pressure = match category {
                    EdgeCategory::Artery => artery_pressure,
                    _ => vein_pressure,
                };
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pressure solve
// ---------------------------------------------------------------------------

fn is_root(graph: &VesselGraph, coord: Coord) -> bool {
    graph.node(coord).is_some_and(|n| n.is_root)
}

fn active_incident(graph: &VesselGraph, coord: Coord) -> impl Iterator<Item = (&Vessel, Coord)> {
    graph
        .edges_in(coord)
        .into_iter()
        .chain(graph.edges_out(coord))
        .filter_map(move |id| graph.edge(id))
        .filter(|e| !e.is_ignored)
        .map(move |e| {
            let neighbour = if e.from == coord { e.to } else { e.from };
            (e, neighbour)
        })
}

/// Nodes whose pressure is unknown, in first-seen edge order.
///
/// Roots, dangling ends (a source with a single outlet, a sink with a single
/// inlet) and nodes whose every active vessel has no lumen are excluded.
fn interior_nodes(graph: &VesselGraph) -> IndexMap<Coord, usize> {
    let mut index = IndexMap::new();
    for (_, edge) in graph.edges() {
        if edge.is_ignored {
            continue;
        }
        let source_dangles = graph.in_degree(edge.from) == 0 && graph.out_degree(edge.from) == 1;
        let sink_dangles = graph.in_degree(edge.to) == 1 && graph.out_degree(edge.to) == 0;
        for (coord, dangling) in [(edge.from, source_dangles), (edge.to, sink_dangles)] {
            if dangling || is_root(graph, coord) || index.contains_key(&coord) {
                continue;
            }
            let has_lumen = active_incident(graph, coord).any(|(e, _)| e.radius > 0.0);
            if has_lumen {
                let next = index.len();
                index.insert(coord, next);
            }
        }
    }
    index
}

/// Solves for the pressure of every interior node.
///
/// Root pressures are read, never written.
pub fn calc_pressures(graph: &mut VesselGraph, solver: &dyn LinearSolver) {
    let index = interior_nodes(graph);
    let n = index.len();
    if n == 0 {
        return;
    }

    let mut a = SparseMatrix::new(n);
    let mut b = vec![0.0; n];
    let mut x0 = vec![0.0; n];

    for (&coord, &row) in &index {
        let mut guess = 0.0;
        let mut div = 0usize;
        for (edge, neighbour) in active_incident(graph, coord) {
            let coeff = edge_coefficient(edge);
            a.add(row, row, coeff);
            match index.get(&neighbour) {
                Some(&col) => {
                    a.add(row, col, -coeff);
                    guess += graph.pressure(neighbour);
                    div += 1;
                }
                None => b[row] += coeff * graph.pressure(neighbour),
            }
        }
        if div != 0 {
            guess /= div as f64;
        }
        let own = graph.pressure(coord);
        if own > 0.0 {
            guess = own;
        }
        x0[row] = if guess.is_nan() { 0.0 } else { guess };
    }

    a.scale(SYSTEM_SCALE);
    for v in &mut b {
        *v *= SYSTEM_SCALE;
    }

    let x = solver.solve(&a, &b, &x0);
    for (&coord, &row) in &index {
        if let (Some(node), Some(p)) = (graph.node_mut(coord), x.get(row)) {
            node.pressure = *p;
        }
    }
}

/// Reverses every non-ignored edge whose TO pressure exceeds its FROM
/// pressure. Returns `true` if anything was reversed.
pub fn reverse_pressures(graph: &mut VesselGraph) -> bool {
    let mut reversed = false;
    for id in graph.edge_ids() {
        let Some(edge) = graph.edge(id) else {
            continue;
        };
        if edge.is_ignored {
            continue;
        }
        let delta = graph.pressure(edge.from) - graph.pressure(edge.to);
        if delta < 0.0 && graph.reverse_edge(id).is_ok() {
            reversed = true;
        }
    }
    reversed
}

// ---------------------------------------------------------------------------
// Derived quantities
// ---------------------------------------------------------------------------

fn endpoint_pressures(graph: &VesselGraph) -> Vec<(EdgeId, f64, f64)> {
    graph
        .edges()
        .map(|(id, e)| (id, graph.pressure(e.from), graph.pressure(e.to)))
        .collect()
}

/// Computes flow rate and exchange area of every edge.
pub fn calc_flows(graph: &mut VesselGraph) {
    for (id, p_from, p_to) in endpoint_pressures(graph) {
        let Some(edge) = graph.edge_mut(id) else {
            continue;
        };
        edge.flow = edge_coefficient(edge) * (p_from - p_to);
        // Wider vessels are assumed to extend past the layer.
        edge.area = if 2.0 * edge.radius < LAYER_HEIGHT {
            std::f64::consts::PI * 2.0 * (edge.radius + edge.wall / 2.0) * edge.length
        } else {
            edge.length * LAYER_HEIGHT * 2.0
        };
    }
}

/// Computes shear and circumferential stress of every edge, then min-max
/// scales shear into `shear_scaled`.
pub fn calc_stress(graph: &mut VesselGraph) {
    let mut shear_min = f64::INFINITY;
    let mut shear_max = f64::NEG_INFINITY;

    for (id, p_from, p_to) in endpoint_pressures(graph) {
        let Some(edge) = graph.edge_mut(id) else {
            continue;
        };
        edge.shear = edge.radius * (p_to - p_from).abs() / (2.0 * edge.length);
        edge.circum = (p_to + p_from) / 2.0 * edge.radius / edge.wall;
        if !edge.shear.is_nan() {
            shear_min = shear_min.min(edge.shear);
            shear_max = shear_max.max(edge.shear);
        }
    }

    let range = shear_max - shear_min;
    for (_, edge) in graph.edges_mut() {
        edge.shear_scaled = if range > 0.0 {
            (edge.shear - shear_min) / range
        } else if edge.shear.is_nan() {
            f64::NAN
        } else {
            0.0
        };
    }
}

/// Returns `true` if any active edge carries negative flow.
pub fn check_for_negative_flow(graph: &VesselGraph) -> bool {
    graph
        .edges()
        .any(|(_, e)| !e.is_ignored && e.flow < 0.0)
}

/// Repeats pressures, reversal, flows and stresses until no active edge
/// carries negative flow. Returns the number of passes taken.
pub fn calculate_current_state(graph: &mut VesselGraph, solver: &dyn LinearSolver) -> usize {
    let mut iterations = 0;
    loop {
        iterations += 1;
        calc_pressures(graph, solver);
        if reverse_pressures(graph) {
            calc_pressures(graph, solver);
        }
        calc_flows(graph);
        calc_stress(graph);

        if !check_for_negative_flow(graph) {
            break;
        }
        if iterations >= MAXIMUM_ITERATIONS {
            warn!(iterations, "negative flow persists; giving up");
            break;
        }
        debug!(iterations, "negative flow detected, recalculating");
    }
    iterations
}

/// Sets each node's oxygen to the partial pressure of its widest active
/// vessel. Nodes with NaN pressure, or with no active vessel, get NaN.
pub fn assign_oxygen(graph: &mut VesselGraph) {
    for coord in graph.node_coords() {
        let oxygen = if graph.pressure(coord).is_nan() {
            f64::NAN
        } else {
            active_incident(graph, coord)
                .map(|(e, _)| partial_pressure(e.radius))
                .fold(f64::NAN, f64::max)
        };
        if let Some(node) = graph.node_mut(coord) {
            node.oxygen = oxygen;
        }
    }
}
