//! Error types for angio-sim.
//!
//! Only configuration loading and network construction fail. Once a network
//! is running, disconnection and numerical trouble are carried as NaN values
//! and ignored flags, never as errors.

use angio_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A root declaration names an edge index outside the edge list.
    #[error("root {index} names unknown edge {edge}")]
    UnknownRoot { index: usize, edge: usize },

    /// A root declaration carries a type letter other than `A` or `V`.
    #[error("root {index} has invalid type code {code:?}")]
    InvalidRootType { index: usize, code: String },
}
