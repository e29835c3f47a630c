//! Tick runner.
//!
//! [`Simulation`] owns a [`VascularNetwork`], the environment collaborators,
//! the optional drivers and the one seeded generator. Each tick runs the
//! drivers whose schedule falls on it, degradation first, and refreshes
//! perfusion after any structural change. A driver with interval `n` runs on
//! ticks `1, 1 + n, 1 + 2n, ...`.

use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ComponentSummary, DegradeConfig, GrowthConfig, SimulationConfig};
use crate::environment::{AgentGrid, CubicLattice, Lattice, OccupancyGrid, ScalarField};
use crate::error::SimError;
use crate::network::VascularNetwork;
use crate::remodel::{Degrade, Growth};
use crate::SimRng;

/// Structural changes made during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub tick: u64,
    pub removed: usize,
    pub added: usize,
}

/// A network evolving in a fixed environment.
pub struct Simulation {
    network: VascularNetwork,
    lattice: Box<dyn Lattice>,
    agents: Box<dyn AgentGrid>,
    field: Box<dyn ScalarField>,
    degrade: Option<Degrade>,
    growth: Option<Growth>,
    rng: SimRng,
    tick: u64,
}

impl Simulation {
    /// Wraps an initialized network. No drivers are attached.
    pub fn new(
        network: VascularNetwork,
        lattice: Box<dyn Lattice>,
        agents: Box<dyn AgentGrid>,
        field: Box<dyn ScalarField>,
        seed: u64,
    ) -> Self {
        Simulation {
            network,
            lattice,
            agents,
            field,
            degrade: None,
            growth: None,
            rng: SimRng::seed_from_u64(seed),
            tick: 0,
        }
    }

    /// Builds and initializes everything a configuration describes.
    pub fn from_config(config: SimulationConfig) -> Result<Self, SimError> {
        let lattice = CubicLattice::new(config.lattice);
        let mut network = VascularNetwork::from_spec(&config.network, &lattice)?;
        network.initialize();

        let agents = OccupancyGrid::from_specs(&config.agents);
        let field = config.vegf.indexed();
        let mut sim = Simulation::new(
            network,
            Box::new(lattice),
            Box::new(agents),
            Box::new(field),
            config.seed,
        );
        if let Some(degrade) = config.degrade {
            sim = sim.with_degrade(degrade);
        }
        if let Some(growth) = config.growth {
            sim = sim.with_growth(growth);
        }
        Ok(sim)
    }

    pub fn with_degrade(mut self, config: DegradeConfig) -> Self {
        self.degrade = Some(Degrade::new(config));
        self
    }

    pub fn with_growth(mut self, config: GrowthConfig) -> Self {
        self.growth = Some(Growth::new(config, self.lattice.as_ref()));
        self
    }

    /// Advances one tick.
    pub fn step(&mut self) -> TickOutcome {
        self.tick += 1;
        let tick = self.tick;
        let due = |interval: u32| (tick - 1) % u64::from(interval.max(1)) == 0;
        let mut outcome = TickOutcome {
            tick,
            ..TickOutcome::default()
        };

        if let Some(degrade) = self.degrade.as_ref().filter(|d| due(d.interval())) {
            let (graph, solver) = self.network.parts_mut();
            outcome.removed = degrade.step(graph, self.lattice.as_ref(), self.agents.as_ref(), solver);
        }
        if let Some(growth) = self.growth.as_mut().filter(|g| due(g.interval())) {
            outcome.added = growth.step(
                &mut self.network,
                self.lattice.as_ref(),
                self.field.as_ref(),
                tick as f64,
                &mut self.rng,
            );
        }

        if outcome.removed > 0 || outcome.added > 0 {
            self.network.check_perfused();
            info!(
                tick,
                removed = outcome.removed,
                added = outcome.added,
                edges = self.network.graph().edge_count(),
                "network remodeled"
            );
        }
        outcome
    }

    /// Advances `ticks` ticks and returns every outcome that changed the
    /// network.
    pub fn run(&mut self, ticks: u64) -> Vec<TickOutcome> {
        (0..ticks)
            .map(|_| self.step())
            .filter(|o| o.removed > 0 || o.added > 0)
            .collect()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn network(&self) -> &VascularNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut VascularNetwork {
        &mut self.network
    }

    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Settings of the attached drivers.
    pub fn summaries(&self) -> Vec<ComponentSummary> {
        self.degrade
            .iter()
            .map(Degrade::summary)
            .chain(self.growth.iter().map(Growth::summary))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EdgeSpec, FlowStrategy, NetworkSpec, RootSpec};
    use crate::environment::{CellCategory, GridField, LatticeConfig, Location};
    use angio_core::{Coord, EdgeLevel, EdgeType};

    fn spec() -> NetworkSpec {
        let edge = |x: i32, kind| EdgeSpec {
            from: Coord::new(x, 2, 0),
            to: Coord::new(x + 1, 2, 0),
            kind,
            radius: 5.0,
            wall: None,
            length: None,
            level: EdgeLevel::Variable,
        };
        NetworkSpec {
            edges: vec![
                edge(0, EdgeType::Artery),
                edge(1, EdgeType::Capillary),
                edge(2, EdgeType::Vein),
            ],
            roots: vec![
                RootSpec { edge: 0, code: "A".into() },
                RootSpec { edge: 2, code: "V".into() },
            ],
        }
    }

    fn sim(agents: OccupancyGrid) -> Simulation {
        let lattice = CubicLattice::new(LatticeConfig {
            width: 6,
            length: 6,
            height: 1,
            grid_size: 30.0,
            patch_size: 1,
        });
        let mut network = VascularNetwork::from_spec(&spec(), &lattice).unwrap();
        network.initialize();
        Simulation::new(network, Box::new(lattice), Box::new(agents), Box::new(GridField::new(0.0)), 1)
    }

    #[test]
    fn drivers_follow_their_interval() {
        let mut grid = OccupancyGrid::new();
        grid.place(Location::new(2, 2, 0), CellCategory::Cancerous);
        let mut s = sim(grid).with_degrade(DegradeConfig {
            interval: 3,
            degradation_rate: 1.0,
            shear_threshold: 0.0,
        });

        let id = s.network().edges_by_type(&[EdgeType::Capillary])[0];
        let wall = |s: &Simulation| s.network().graph().edge(id).unwrap().wall;
        let start = wall(&s);
        s.step();
        let after_first = wall(&s);
        assert!(after_first < start);
        s.step();
        s.step();
        assert_eq!(wall(&s), after_first);
        s.step();
        assert!(wall(&s) < after_first);
        assert_eq!(s.tick(), 4);
    }

    #[test]
    fn quiet_environment_changes_nothing() {
        let mut s = sim(OccupancyGrid::new())
            .with_degrade(DegradeConfig {
                interval: 1,
                degradation_rate: 1.0,
                shear_threshold: 100.0,
            })
            .with_growth(GrowthConfig {
                interval: Some(1),
                migration_rate: 1.0,
                vegf_threshold: 10.0,
                walk_type: "MAX".into(),
                max_length: 90.0,
                level: EdgeLevel::Variable,
                flow_strategy: FlowStrategy::Compensate,
            });
        assert!(s.run(5).is_empty());
        assert_eq!(s.network().graph().edge_count(), 3);
        assert_eq!(s.summaries().len(), 2);
    }

    #[test]
    fn from_config_attaches_drivers() {
        let config = SimulationConfig {
            seed: 3,
            lattice: LatticeConfig::default(),
            network: spec(),
            degrade: None,
            growth: Some(GrowthConfig {
                interval: None,
                migration_rate: 60.0,
                vegf_threshold: 0.5,
                walk_type: "RANDOM".into(),
                max_length: 60.0,
                level: EdgeLevel::Variable,
                flow_strategy: FlowStrategy::Divert,
            }),
            vegf: GridField::new(1.0),
            agents: Vec::new(),
        };
        let s = Simulation::from_config(config).unwrap();
        let summaries = s.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].kind, "GROWTH");
        assert!(s.network().graph().edges().all(|(_, e)| e.is_perfused));
    }
}
