//! Core error types for angio-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Only misuse of
//! the graph API is an error; disconnection and dangling structure are
//! encoded in the data (NaN pressures, ignored flags) instead.

use crate::id::EdgeId;
use crate::node::Coord;
use thiserror::Error;

/// Core errors produced by the angio-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An edge id was not found in the graph.
    #[error("edge not found: EdgeId({id})", id = id.0)]
    EdgeNotFound { id: EdgeId },

    /// A node coordinate was not found in the graph.
    #[error("node not found: {coord}")]
    NodeNotFound { coord: Coord },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },
}
