//! Flattens a [`SimulationConfiguration`] into indexed, cross-checked runtime
//! settings and the reified driver correlation matrix (C4).

use chrono::{DateTime, Months, NaiveDate, Utc};
use nalgebra::DMatrix;
use tracing::debug;

use crate::config::{AssetClass, SimulationConfiguration};
use crate::error::ConfigError;
use crate::random::GaussianSource;
use crate::types::Frequency;

pub struct InitialisedSettings {
    pub asset_classes: Vec<AssetClass>,
    pub output_ids: Vec<String>,
    pub driver_ids: Vec<String>,
    pub projection_dates: Vec<DateTime<Utc>>,
    pub annualisation_factor: f64,
    pub correlation: DMatrix<f64>,
    pub gaussian_source: GaussianSource,
    pub number_of_simulations: u32,
    pub number_of_projection_steps: u32,
    pub number_of_batches: u32,
}

impl InitialisedSettings {
    pub fn batch_size(&self) -> u32 {
        self.number_of_simulations / self.number_of_batches
    }

    pub fn build(config: &SimulationConfiguration) -> Result<Self, ConfigError> {
        if config.number_of_simulations % config.number_of_batches != 0 {
            return Err(ConfigError::BatchSizeNotDivisible {
                simulations: config.number_of_simulations,
                batches: config.number_of_batches,
            });
        }

        let asset_classes: Vec<AssetClass> = config
            .economies
            .iter()
            .flat_map(|economy| economy.asset_classes.iter().cloned())
            .collect();

        let mut asset_class_ids = Vec::with_capacity(asset_classes.len());
        for ac in &asset_classes {
            if asset_class_ids.contains(&ac.id) {
                return Err(ConfigError::DuplicateAssetClass(ac.id.clone()));
            }
            asset_class_ids.push(ac.id.clone());
        }

        let mut output_ids = Vec::new();
        for ac in &asset_classes {
            for output in &ac.outputs {
                if output_ids.contains(&output.id) {
                    return Err(ConfigError::DuplicateOutput(output.id.clone()));
                }
                output_ids.push(output.id.clone());
            }
        }

        let mut driver_ids = Vec::new();
        for ac in &asset_classes {
            for driver in &ac.random_drivers {
                if driver_ids.contains(driver) {
                    return Err(ConfigError::DuplicateDriver(driver.clone()));
                }
                driver_ids.push(driver.clone());
            }
        }

        for entry in &config.correlations.entries {
            if !driver_ids.contains(&entry.driver_a) {
                return Err(ConfigError::UnknownCorrelationDriver(entry.driver_a.clone()));
            }
            if !driver_ids.contains(&entry.driver_b) {
                return Err(ConfigError::UnknownCorrelationDriver(entry.driver_b.clone()));
            }
        }

        let n = driver_ids.len();
        let mut correlation = DMatrix::<f64>::identity(n, n);
        for i in 0..n {
            for j in 0..n {
                correlation[(i, j)] = config.correlations.get(&driver_ids[i], &driver_ids[j]);
            }
        }

        let gaussian_source = GaussianSource::new(config.random_seed, &correlation)?;

        let projection_dates = projection_dates(
            config.start_date,
            config.projection_frequency,
            config.number_of_projection_steps,
        );

        debug!(
            asset_classes = asset_class_ids.len(),
            outputs = output_ids.len(),
            drivers = driver_ids.len(),
            "flattened simulation settings"
        );

        Ok(Self {
            asset_classes,
            output_ids,
            driver_ids,
            projection_dates,
            annualisation_factor: config.projection_frequency.annualisation_factor(),
            correlation,
            gaussian_source,
            number_of_simulations: config.number_of_simulations,
            number_of_projection_steps: config.number_of_projection_steps,
            number_of_batches: config.number_of_batches,
        })
    }
}

/// `T+1` dates starting at `start_date` (step 0), stepping forward by one
/// calendar unit of `frequency` per subsequent step.
fn projection_dates(start_date: NaiveDate, frequency: Frequency, steps: u32) -> Vec<DateTime<Utc>> {
    (0..=steps)
        .map(|step| {
            let date = match frequency {
                Frequency::Annually => start_date
                    .checked_add_months(Months::new(12 * step))
                    .expect("date within representable range"),
                Frequency::Monthly => start_date
                    .checked_add_months(Months::new(step))
                    .expect("date within representable range"),
                Frequency::Weekly => start_date + chrono::Duration::weeks(step as i64),
            };
            date.and_hms_opt(0, 0, 0)
                .expect("midnight is always valid")
                .and_utc()
        })
        .collect()
}
