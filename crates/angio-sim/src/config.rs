//! Configuration types, loaded from JSON.
//!
//! A [`SimulationConfig`] describes the initial network, the lattice it sits
//! in, the growth-factor field, the cells occupying the tissue and the two
//! optional remodeling drivers. Drivers report their settings back as a flat
//! [`ComponentSummary`] for logging and export.

use std::path::Path;

use angio_core::{Coord, EdgeLevel, EdgeType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::environment::{AgentSpec, GridField, LatticeConfig};
use crate::error::SimError;

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub lattice: LatticeConfig,
    pub network: NetworkSpec,
    #[serde(default)]
    pub degrade: Option<DegradeConfig>,
    #[serde(default)]
    pub growth: Option<GrowthConfig>,
    #[serde(default)]
    pub vegf: GridField,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

// ---------------------------------------------------------------------------
// Network description
// ---------------------------------------------------------------------------

/// The initial vessel network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub edges: Vec<EdgeSpec>,
    pub roots: Vec<RootSpec>,
}

/// One vessel of the initial network.
///
/// A missing wall thickness is derived from the radius; a missing length
/// comes from the lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: Coord,
    pub to: Coord,
    pub kind: EdgeType,
    pub radius: f64,
    #[serde(default)]
    pub wall: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub level: EdgeLevel,
}

/// A boundary condition: `edge` indexes [`NetworkSpec::edges`], `code` is
/// `A` (arterial inlet) or `V` (venous outlet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootSpec {
    pub edge: usize,
    #[serde(rename = "type")]
    pub code: String,
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Wall degradation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradeConfig {
    /// Ticks between steps.
    pub interval: u32,
    /// Wall thinning rate [um/hour].
    pub degradation_rate: f64,
    /// Shear below which a fully thinned vessel collapses [mmHg].
    pub shear_threshold: f64,
}

/// Sprouting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Ticks between steps. Derived from the migration rate when absent.
    #[serde(default)]
    pub interval: Option<u32>,
    /// Minimum ticks between two extensions from the same node.
    pub migration_rate: f64,
    /// Mean growth-factor signal that triggers sprouting.
    pub vegf_threshold: f64,
    /// `RANDOM`, `BIASED` or `MAX`.
    pub walk_type: String,
    /// Maximum sprout length [um].
    pub max_length: f64,
    #[serde(default)]
    pub level: EdgeLevel,
    /// How the network makes room for the flow of a joined sprout.
    #[serde(default)]
    pub flow_strategy: FlowStrategy,
}

/// Radius update applied after a sprout joins the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStrategy {
    /// Widen the paths from the arteries to the sprout and from the sprout
    /// to the veins so they carry the extra flow.
    #[default]
    Compensate,
    /// Move flow from the sibling branch into the sprout branch up to where
    /// the two meet again downstream.
    Divert,
}

/// How a sprout picks its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkType {
    /// Uniform over the free directions.
    Random,
    /// Weighted by the mean signal in each free direction.
    Biased,
    /// The free direction with the strongest signal.
    Deterministic,
}

impl WalkType {
    /// Resolves a configured policy name. Unknown names fall back to
    /// [`WalkType::Deterministic`] with a warning.
    pub fn parse(name: &str) -> WalkType {
        match name.trim().to_ascii_uppercase().as_str() {
            "RANDOM" => WalkType::Random,
            "BIASED" => WalkType::Biased,
            "MAX" | "DETERMINISTIC" => WalkType::Deterministic,
            _ => {
                warn!(walk_type = name, "invalid walk type; using MAX");
                WalkType::Deterministic
            }
        }
    }
}

/// Flat description of a driver's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    #[serde(rename = "type")]
    pub kind: String,
    pub interval: u32,
    pub specs: IndexMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "seed": 7,
        "network": {
            "edges": [
                {"from": {"x": 0, "y": 0, "z": 0}, "to": {"x": 1, "y": 0, "z": 0}, "kind": "Artery", "radius": 5.0},
                {"from": {"x": 1, "y": 0, "z": 0}, "to": {"x": 2, "y": 0, "z": 0}, "kind": "Vein", "radius": 5.0, "length": 10.0}
            ],
            "roots": [{"edge": 0, "type": "A"}, {"edge": 1, "type": "V"}]
        },
        "degrade": {"interval": 1, "degradation_rate": 0.5, "shear_threshold": 0.1},
        "growth": {"migration_rate": 60.0, "vegf_threshold": 0.5, "walk_type": "biased", "max_length": 120.0},
        "agents": [{"location": {"x": 1, "y": 0, "z": 0}, "category": "Cancerous"}]
    }"#;

    #[test]
    fn parses_sample() {
        let config = SimulationConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.lattice, LatticeConfig::default());
        assert_eq!(config.network.edges.len(), 2);
        assert_eq!(config.network.edges[0].length, None);
        assert_eq!(config.network.edges[1].length, Some(10.0));
        assert_eq!(config.network.roots[1].code, "V");
        assert_eq!(config.degrade.unwrap().degradation_rate, 0.5);
        let growth = config.growth.unwrap();
        assert_eq!(growth.interval, None);
        assert_eq!(growth.level, EdgeLevel::Variable);
        assert_eq!(growth.flow_strategy, FlowStrategy::Compensate);
        assert_eq!(config.agents.len(), 1);
    }

    #[test]
    fn flow_strategy_names() {
        let divert: FlowStrategy = serde_json::from_str("\"DIVERT\"").unwrap();
        assert_eq!(divert, FlowStrategy::Divert);
        assert!(serde_json::from_str::<FlowStrategy>("\"SPLIT\"").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = SimulationConfig::from_path(file.path()).unwrap();
        assert_eq!(config.network.roots.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SimulationConfig::from_path("/nonexistent/angio.json").unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }

    #[test]
    fn malformed_json_is_json_error() {
        let err = SimulationConfig::from_json("{\"network\": 3}").unwrap_err();
        assert!(matches!(err, SimError::Json(_)));
    }

    #[test]
    fn walk_type_names() {
        assert_eq!(WalkType::parse("random"), WalkType::Random);
        assert_eq!(WalkType::parse(" BIASED "), WalkType::Biased);
        assert_eq!(WalkType::parse("MAX"), WalkType::Deterministic);
        assert_eq!(WalkType::parse("sideways"), WalkType::Deterministic);
    }
}
