pub mod id;
pub mod error;
pub mod node;
pub mod edge;
pub mod root;
pub mod graph;

// Re-export commonly used types
pub use id::EdgeId;
pub use error::CoreError;
pub use node::{Coord, NodeState};
pub use edge::{EdgeCategory, EdgeLevel, EdgeLinks, EdgeType, Vessel};
pub use root::Root;
pub use graph::VesselGraph;
