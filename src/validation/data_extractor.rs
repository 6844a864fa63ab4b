//! Locates simulation outputs on a finalised artifact by (type, parameters)
//! rather than by their user-chosen IDs (C8).

use std::collections::HashMap;

use ndarray::Array2;

use crate::codec::Reader;
use crate::config::AssetClass;
use crate::error::{EsgError, ValidationError};
use crate::types::{OutputType, Parameters};

/// Wraps a [`Reader`] scoped to one asset class; caches path reads by the
/// output's resolved artifact ID so repeated lookups of the same output
/// (e.g. across several analyses) don't re-read the block from disk.
pub struct DataExtractor<'a> {
    reader: Reader,
    asset_class: &'a AssetClass,
    cache: HashMap<String, Array2<f32>>,
}

impl<'a> DataExtractor<'a> {
    pub fn new(reader: Reader, asset_class: &'a AssetClass) -> Self {
        Self {
            reader,
            asset_class,
            cache: HashMap::new(),
        }
    }

    pub fn asset_class(&self) -> &AssetClass {
        self.asset_class
    }

    pub fn step_dates(&self) -> &[chrono::DateTime<chrono::Utc>] {
        self.reader.step_dates()
    }

    /// Finds the unique declared output whose `type` and `parameters` match exactly.
    fn find_output_id(&self, output_type: OutputType, parameters: &Parameters) -> Result<&str, ValidationError> {
        self.asset_class
            .outputs
            .iter()
            .find(|o| o.output_type == output_type && &o.parameters == parameters)
            .map(|o| o.id.as_str())
            .ok_or_else(|| ValidationError::OutputNotFound {
                asset_class: self.asset_class.id.clone(),
                output_type: output_type.to_string(),
                parameters: format!("{parameters:?}"),
            })
    }

    /// The (S, T+1) path matrix for the output matching `output_type`/`parameters`.
    pub fn paths(&mut self, output_type: OutputType, parameters: &Parameters) -> Result<&Array2<f32>, EsgError> {
        let id = self.find_output_id(output_type, parameters)?.to_string();
        if !self.cache.contains_key(&id) {
            let matrix = self.reader.paths_for_output(id.as_str())?;
            self.cache.insert(id.clone(), matrix);
        }
        Ok(&self.cache[&id])
    }
}
