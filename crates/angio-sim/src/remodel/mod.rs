//! Structural drivers that remodel the network between solves.
//!
//! Growth holds sprouts until they reach the network and commits them
//! through [`Anastomosis`]. Both drivers mutate the graph, then repair it with
//! [`update_graph`](crate::reduction::update_graph) when anything changed or
//! refresh only the stresses when nothing did.

mod anastomosis;
mod degrade;
mod growth;

pub use anastomosis::{Anastomosis, Circulation};
pub use degrade::Degrade;
pub use growth::{Growth, Sprout};
