//! Hemodynamics and remodeling engine for vascular graphs.
//!
//! # Architecture
//!
//! Built on the [`angio_core::VesselGraph`] arena. Each tick a structural
//! driver ([`remodel::Degrade`] or [`remodel::Growth`]) mutates the graph,
//! [`reduction`] restores structural validity and [`hemodynamics`] recomputes
//! pressures, flows and stresses. [`network::VascularNetwork`] bundles the
//! graph with its roots and solver, and [`simulation::Simulation`] drives it
//! tick by tick against the environment collaborators in [`environment`].

pub mod config;
pub mod environment;
pub mod error;
pub mod hemodynamics;
pub mod network;
pub mod perfusion;
pub mod radius;
pub mod reduction;
pub mod remodel;
pub mod simulation;
pub mod solver;

pub use error::SimError;
pub use network::{NetworkReport, VascularNetwork};
pub use simulation::Simulation;
pub use solver::{LinearSolver, SorSolver, SparseMatrix};

/// The seeded generator threaded through every driver call that draws.
pub type SimRng = rand_chacha::ChaCha8Rng;
