//! Validators (C8): re-open a finalised artifact and check generated paths
//! against analytic expectations.

mod data_extractor;
mod stats;
mod validators;

pub use data_extractor::DataExtractor;
pub use validators::{
    average_discount_factor, discounted_total_return_index, discounted_zero_coupon_bond,
    total_return_index_log_return_moments, MartingaleResult, MartingaleSeries, MomentsResult,
    MomentsSeries, ValidatorResult,
};

use std::path::Path;

use tracing::instrument;

use crate::codec::Reader;
use crate::config::{SimulationConfiguration, ValidationConfiguration};
use crate::error::{EsgError, ValidationError};

/// Runs every analysis named in `validation_config` against the artifact at
/// `artifact_path`, resolving each `asset_class_id` against `simulation_config`.
///
/// Opens one reader per asset class; outputs are located by (type,
/// parameters), never by the artifact's declared output IDs.
#[instrument(skip(simulation_config, validation_config))]
pub fn validate(
    simulation_config: &SimulationConfiguration,
    validation_config: &ValidationConfiguration,
    artifact_path: impl AsRef<Path>,
) -> Result<Vec<ValidatorResult>, EsgError> {
    let artifact_path = artifact_path.as_ref();
    let annualisation_factor = simulation_config.projection_frequency.annualisation_factor();
    let mut results = Vec::new();

    for asset_class_validation in &validation_config.asset_classes {
        let asset_class = simulation_config
            .economies
            .iter()
            .flat_map(|economy| economy.asset_classes.iter())
            .find(|ac| ac.id == asset_class_validation.asset_class_id)
            .ok_or_else(|| {
                ValidationError::OutputNotFound {
                    asset_class: asset_class_validation.asset_class_id.clone(),
                    output_type: String::new(),
                    parameters: "asset class not found in simulation configuration".into(),
                }
            })?;

        let reader = Reader::open(artifact_path)?;
        let mut extractor = DataExtractor::new(reader, asset_class);

        for analysis in &asset_class_validation.analyses {
            let confidence_level = analysis.parameters.confidence_level();
            let terms = analysis.parameters.terms.clone().unwrap_or_default();
            let mut outcome = validators::dispatch(
                analysis.analysis_id,
                &mut extractor,
                annualisation_factor,
                confidence_level,
                &terms,
            )?;
            results.append(&mut outcome);
        }
    }

    Ok(results)
}
