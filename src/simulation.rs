//! Orchestrates batches x steps x outputs and writes the result to disk (C7).

use std::path::Path;

use ndarray::Array3;
use tracing::{info, instrument};

use crate::codec::Writer;
use crate::config::SimulationConfiguration;
use crate::error::EsgError;
use crate::graph::Simulation;
use crate::settings::InitialisedSettings;

/// Runs the full generation algorithm: validate, build the output graph,
/// walk every batch and step, and finalise the artifact.
///
/// Leaves the output file unfinalised (invalid) if any step returns an error;
/// the driver does not attempt partial recovery.
#[instrument(skip(config), fields(simulations = config.number_of_simulations, steps = config.number_of_projection_steps))]
pub fn generate(config: &SimulationConfiguration, output_path: impl AsRef<Path>) -> Result<(), EsgError> {
    let settings = InitialisedSettings::build(config)?;
    let mut sim = Simulation::new(&settings)?;

    let mut writer = Writer::create(
        &output_path,
        settings.number_of_simulations,
        &settings.output_ids,
        &settings.projection_dates,
    )?;

    let number_of_outputs = settings.output_ids.len();
    let number_of_steps = settings.number_of_projection_steps as usize + 1;
    let batch_size = settings.batch_size() as usize;
    let step_walk_order = sim.step_walk_order();

    for batch_index in 0..settings.number_of_batches {
        run_batch(
            &mut sim,
            &settings,
            &step_walk_order,
            batch_index,
            number_of_outputs,
            number_of_steps,
            batch_size,
            &mut writer,
        )?;
    }

    writer.finalise()?;
    Ok(())
}

#[instrument(skip(sim, settings, step_walk_order, writer))]
#[allow(clippy::too_many_arguments)]
fn run_batch(
    sim: &mut Simulation,
    settings: &InitialisedSettings,
    step_walk_order: &[crate::graph::NodeRef],
    batch_index: u32,
    number_of_outputs: usize,
    number_of_steps: usize,
    batch_size: usize,
    writer: &mut Writer,
) -> Result<(), EsgError> {
    let drivers = settings.gaussian_source.sample_batch(
        settings.number_of_projection_steps as usize,
        batch_size,
        batch_index,
    );
    sim.assign_batch_drivers(&drivers);

    let mut buffer = Array3::<f32>::zeros((number_of_outputs, number_of_steps, batch_size));
    for step in 0..number_of_steps as u32 {
        for &node_ref in step_walk_order {
            let values = sim.value_at(node_ref, step)?;
            if let Some(output_index) = sim.output_index_of(node_ref) {
                for (path, &value) in values.iter().enumerate() {
                    buffer[[output_index, step as usize, path]] = value as f32;
                }
            }
        }
    }

    writer.write_batch(batch_index, settings.number_of_batches, &buffer)?;
    info!(batch_index, batch_size, "batch complete");
    Ok(())
}
