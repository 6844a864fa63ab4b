//! Deserialisable configuration record (C9). Cross-field validation belongs
//! to [`crate::settings`] (C4); this module only describes shape and loads JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{AnalysisId, Frequency, ModelId, Parameters, OutputType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub output_type: OutputType,
    #[serde(default)]
    pub initial_value: Option<f64>,
    #[serde(default)]
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetClass {
    pub id: String,
    pub model_id: ModelId,
    #[serde(default)]
    pub parameters: Parameters,
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub random_drivers: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Economy {
    pub id: String,
    pub asset_classes: Vec<AssetClass>,
}

/// Sparse upper-triangular correlation input: unspecified pairs are 0,
/// the diagonal is implicitly 1. Reified into a dense matrix by C4.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub entries: Vec<CorrelationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub driver_a: String,
    pub driver_b: String,
    pub rho: f64,
}

impl CorrelationMatrix {
    /// Correlation between two drivers; 1.0 on the diagonal, 0.0 if unspecified.
    /// The sparse input is stored unordered, so both (a,b) and (b,a) match.
    pub fn get(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        self.entries
            .iter()
            .find(|e| {
                (e.driver_a == a && e.driver_b == b) || (e.driver_a == b && e.driver_b == a)
            })
            .map(|e| e.rho)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfiguration {
    pub number_of_simulations: u32,
    pub number_of_projection_steps: u32,
    pub number_of_batches: u32,
    pub projection_frequency: Frequency,
    pub random_seed: u64,
    pub start_date: NaiveDate,
    pub economies: Vec<Economy>,
    #[serde(default)]
    pub correlations: CorrelationMatrix,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisParameters {
    #[serde(default)]
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub terms: Option<Vec<f64>>,
}

impl AnalysisParameters {
    pub fn confidence_level(&self) -> f64 {
        self.confidence_level.unwrap_or(0.95)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSpec {
    pub analysis_id: AnalysisId,
    #[serde(default)]
    pub parameters: AnalysisParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetClassValidation {
    pub asset_class_id: String,
    pub analyses: Vec<AnalysisSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfiguration {
    pub asset_classes: Vec<AssetClassValidation>,
}

/// Deserialises a [`SimulationConfiguration`] from a JSON document.
///
/// Performs no cross-field validation; pass the result to
/// [`crate::settings::InitialisedSettings::build`] for that.
pub fn load_simulation_configuration(json: &str) -> Result<SimulationConfiguration, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_validation_configuration(json: &str) -> Result<ValidationConfiguration, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_lookup_is_symmetric_and_defaults() {
        let matrix = CorrelationMatrix {
            entries: vec![CorrelationEntry {
                driver_a: "A".into(),
                driver_b: "B".into(),
                rho: 0.3,
            }],
        };
        assert_eq!(matrix.get("A", "B"), 0.3);
        assert_eq!(matrix.get("B", "A"), 0.3);
        assert_eq!(matrix.get("A", "A"), 1.0);
        assert_eq!(matrix.get("A", "C"), 0.0);
    }

    #[test]
    fn loads_minimal_configuration_from_json() {
        let json = r#"{
            "number_of_simulations": 100,
            "number_of_projection_steps": 30,
            "number_of_batches": 1,
            "projection_frequency": "annually",
            "random_seed": 128,
            "start_date": "2018-01-01",
            "economies": [],
            "correlations": { "entries": [] }
        }"#;
        let cfg = load_simulation_configuration(json).unwrap();
        assert_eq!(cfg.number_of_simulations, 100);
        assert_eq!(cfg.projection_frequency, Frequency::Annually);
    }
}
