//! Lazy, memoised per-output computation graph (C5), wired to the
//! Hull-White and Black-Scholes kernels (C6).

use ndarray::Array3;

use crate::config::AssetClass;
use crate::error::{ConfigError, EsgError, ModelError};
use crate::models::{black_scholes, hull_white};
use crate::settings::InitialisedSettings;
use crate::types::{param, ModelId, OutputType, Parameters};
use crate::yield_curve::{extract_yield_curve, YieldCurve};

/// A reference to an output node: `(model index, index into that model's output vector)`.
pub type NodeRef = (usize, usize);

#[derive(Clone)]
enum Kernel {
    BrownianMotion {
        driver_local_index: usize,
    },
    OuProcess {
        alpha: f64,
        driver_local_index: usize,
    },
    DiscountFactor {
        alpha: f64,
        sigma: f64,
        brownian_dep: NodeRef,
        ou_dep: NodeRef,
    },
    CashAccount {
        discount_factor_dep: NodeRef,
    },
    ZeroCouponBond {
        alpha: f64,
        sigma: f64,
        term: f64,
        ou_dep: NodeRef,
    },
    TotalReturnIndex {
        sigma: f64,
        driver_local_index: usize,
        discount_factor_dep: NodeRef,
    },
}

struct OutputSpecRuntime {
    output_type: OutputType,
    parameters: Parameters,
    initial_value: Option<f64>,
}

struct OutputNode {
    spec: OutputSpecRuntime,
    /// `Some(i)` for user-declared outputs, at position `i` in the batch buffer / header id list.
    output_index: Option<usize>,
    current_step: Option<u32>,
    current_values: Vec<f64>,
    /// Values as of the step before `current_step`, for kernels that read another
    /// node's prior value after that node has already been walked this step.
    previous_values: Vec<f64>,
    kernel: Kernel,
}

struct ModelState {
    asset_class_id: String,
    model_id: ModelId,
    parameters: Parameters,
    dependencies: Vec<String>,
    local_driver_global_index: Vec<usize>,
    yield_curve: Option<YieldCurve>,
    outputs: Vec<OutputNode>,
    batch_drivers: Option<Array3<f64>>,
}

/// Owns every asset class's runtime state and the global (dependency-created,
/// user-declared) output order used for the per-step walk (C7).
pub struct Simulation {
    models: Vec<ModelState>,
    batch_size: usize,
    annualisation_factor: f64,
    dependency_outputs: Vec<NodeRef>,
    declared_outputs: Vec<NodeRef>,
}

impl Simulation {
    pub fn new(settings: &InitialisedSettings) -> Result<Self, EsgError> {
        let batch_size = settings.batch_size() as usize;
        let mut models = Vec::with_capacity(settings.asset_classes.len());
        for asset_class in &settings.asset_classes {
            models.push(Self::build_model_state(asset_class)?);
        }
        for (model, asset_class) in models.iter_mut().zip(settings.asset_classes.iter()) {
            model.local_driver_global_index = asset_class
                .random_drivers
                .iter()
                .map(|driver_id| {
                    settings
                        .driver_ids
                        .iter()
                        .position(|id| id == driver_id)
                        .expect("C4 validated every driver id exists")
                })
                .collect();
        }

        let mut sim = Self {
            models,
            batch_size,
            annualisation_factor: settings.annualisation_factor,
            dependency_outputs: Vec::new(),
            declared_outputs: Vec::new(),
        };

        for model_idx in 0..sim.models.len() {
            let outputs = settings.asset_classes[model_idx].outputs.clone();
            for spec in outputs {
                let output_index = settings
                    .output_ids
                    .iter()
                    .position(|id| id == &spec.id)
                    .expect("output id was flattened from the same config");
                sim.declare_output(model_idx, output_index, spec.output_type, spec.parameters, spec.initial_value)?;
            }
        }

        Ok(sim)
    }

    fn build_model_state(asset_class: &AssetClass) -> Result<ModelState, EsgError> {
        let yield_curve = if asset_class.model_id == ModelId::HullWhite {
            Some(extract_yield_curve(&asset_class.parameters)?)
        } else {
            None
        };
        Ok(ModelState {
            asset_class_id: asset_class.id.clone(),
            model_id: asset_class.model_id,
            parameters: asset_class.parameters.clone(),
            dependencies: asset_class.dependencies.clone(),
            local_driver_global_index: Vec::new(),
            yield_curve,
            outputs: Vec::new(),
            batch_drivers: None,
        })
    }

    fn model_param(&self, model_idx: usize, key: &str, context: &str) -> Result<f64, ConfigError> {
        param(&self.models[model_idx].parameters, key).ok_or_else(|| ConfigError::MissingParameter {
            parameter: key.to_string(),
            context: context.to_string(),
        })
    }

    fn declare_output(
        &mut self,
        model_idx: usize,
        output_index: usize,
        output_type: OutputType,
        parameters: Parameters,
        initial_value: Option<f64>,
    ) -> Result<NodeRef, EsgError> {
        let kernel = self.build_kernel(model_idx, output_type, &parameters)?;
        let node = OutputNode {
            spec: OutputSpecRuntime {
                output_type,
                parameters,
                initial_value: initial_value.or_else(|| default_initial_value(output_type)),
            },
            output_index: Some(output_index),
            current_step: None,
            current_values: vec![0.0; self.batch_size],
            previous_values: vec![0.0; self.batch_size],
            kernel,
        };
        self.models[model_idx].outputs.push(node);
        let node_ref = (model_idx, self.models[model_idx].outputs.len() - 1);
        self.declared_outputs.push(node_ref);
        Ok(node_ref)
    }

    /// Finds an existing node on the target model matching `(output_type, parameters)`,
    /// or builds and registers a new dependency-created one.
    fn get_or_create(
        &mut self,
        requesting_model_idx: usize,
        target_asset_class_id: Option<&str>,
        output_type: OutputType,
        parameters: Parameters,
    ) -> Result<NodeRef, EsgError> {
        let target_model_idx = match target_asset_class_id {
            None => requesting_model_idx,
            Some(id) => self
                .models
                .iter()
                .position(|m| m.asset_class_id == id)
                .ok_or_else(|| ModelError::DependencyMissing {
                    output_type: output_type.to_string(),
                    asset_class: id.to_string(),
                })?,
        };
        if let Some(idx) = self.models[target_model_idx]
            .outputs
            .iter()
            .position(|n| n.spec.output_type == output_type && n.spec.parameters == parameters)
        {
            return Ok((target_model_idx, idx));
        }

        let kernel = self.build_kernel(target_model_idx, output_type, &parameters)?;
        let node = OutputNode {
            spec: OutputSpecRuntime {
                output_type,
                parameters,
                initial_value: default_initial_value(output_type),
            },
            output_index: None,
            current_step: None,
            current_values: vec![0.0; self.batch_size],
            previous_values: vec![0.0; self.batch_size],
            kernel,
        };
        self.models[target_model_idx].outputs.push(node);
        let node_ref = (target_model_idx, self.models[target_model_idx].outputs.len() - 1);
        self.dependency_outputs.push(node_ref);
        Ok(node_ref)
    }

    fn build_kernel(
        &mut self,
        model_idx: usize,
        output_type: OutputType,
        parameters: &Parameters,
    ) -> Result<Kernel, EsgError> {
        let model_id = self.models[model_idx].model_id;
        match (model_id, output_type) {
            (ModelId::HullWhite, OutputType::BrownianMotion) => Ok(Kernel::BrownianMotion { driver_local_index: 0 }),
            (ModelId::HullWhite, OutputType::OuProcess) => {
                let alpha = self.model_param(model_idx, "alpha", "ou_process")?;
                Ok(Kernel::OuProcess { alpha, driver_local_index: 0 })
            }
            (ModelId::HullWhite, OutputType::DiscountFactor) => {
                let alpha = self.model_param(model_idx, "alpha", "discount_factor")?;
                let sigma = self.model_param(model_idx, "sigma", "discount_factor")?;
                let brownian_dep =
                    self.get_or_create(model_idx, None, OutputType::BrownianMotion, Parameters::new())?;
                let ou_dep = self.get_or_create(model_idx, None, OutputType::OuProcess, Parameters::new())?;
                Ok(Kernel::DiscountFactor { alpha, sigma, brownian_dep, ou_dep })
            }
            (ModelId::HullWhite, OutputType::CashAccount) => {
                let discount_factor_dep =
                    self.get_or_create(model_idx, None, OutputType::DiscountFactor, Parameters::new())?;
                Ok(Kernel::CashAccount { discount_factor_dep })
            }
            (ModelId::HullWhite, OutputType::ZeroCouponBond) => {
                let alpha = self.model_param(model_idx, "alpha", "zero_coupon_bond")?;
                let sigma = self.model_param(model_idx, "sigma", "zero_coupon_bond")?;
                let term = param(parameters, "term").ok_or_else(|| ConfigError::MissingParameter {
                    parameter: "term".to_string(),
                    context: "zero_coupon_bond".to_string(),
                })?;
                let ou_dep = self.get_or_create(model_idx, None, OutputType::OuProcess, Parameters::new())?;
                Ok(Kernel::ZeroCouponBond { alpha, sigma, term, ou_dep })
            }
            (ModelId::BlackScholes, OutputType::TotalReturnIndex) => {
                let sigma = self.model_param(model_idx, "sigma", "total_return_index")?;
                let hw_asset_class_id = self.models[model_idx]
                    .dependencies
                    .first()
                    .cloned()
                    .ok_or_else(|| ModelError::DependencyMissing {
                        output_type: OutputType::TotalReturnIndex.to_string(),
                        asset_class: "<none declared>".to_string(),
                    })?;
                let discount_factor_dep = self.get_or_create(
                    model_idx,
                    Some(&hw_asset_class_id),
                    OutputType::DiscountFactor,
                    Parameters::new(),
                )?;
                Ok(Kernel::TotalReturnIndex { sigma, driver_local_index: 0, discount_factor_dep })
            }
            (model_id, output_type) => Err(ModelError::OutputNotSupported(output_type.to_string(), model_id.to_string()).into()),
        }
    }

    /// Slices the batch's correlated Gaussian tensor down to each model's own drivers (C7 step 3c).
    pub fn assign_batch_drivers(&mut self, global_drivers: &Array3<f64>) {
        for model in &mut self.models {
            let k = model.local_driver_global_index.len();
            let (steps, batch_size, _n) = global_drivers.dim();
            let mut local = Array3::<f64>::zeros((steps, batch_size, k.max(1)));
            for (local_idx, &global_idx) in model.local_driver_global_index.iter().enumerate() {
                for step in 0..steps {
                    for path in 0..batch_size {
                        local[[step, path, local_idx]] = global_drivers[[step, path, global_idx]];
                    }
                }
            }
            model.batch_drivers = Some(local);
        }
    }

    fn driver_sample(&self, model_idx: usize, local_driver_index: usize, step: u32) -> Vec<f64> {
        let drivers = self.models[model_idx]
            .batch_drivers
            .as_ref()
            .expect("drivers assigned before stepping");
        (0..self.batch_size)
            .map(|path| drivers[[(step - 1) as usize, path, local_driver_index]])
            .collect()
    }

    /// The ordered list of (dependency-created, then user-declared) node refs
    /// to walk at every step (C5 "step walk order").
    pub fn step_walk_order(&self) -> Vec<NodeRef> {
        self.dependency_outputs
            .iter()
            .chain(self.declared_outputs.iter())
            .copied()
            .collect()
    }

    pub fn output_index_of(&self, node_ref: NodeRef) -> Option<usize> {
        self.models[node_ref.0].outputs[node_ref.1].output_index
    }

    /// Computes (or returns the memoised) value of a node at `step`, as `f64`.
    pub fn value_at(&mut self, node_ref: NodeRef, step: u32) -> Result<Vec<f64>, EsgError> {
        let (model_idx, output_idx) = node_ref;
        {
            let node = &self.models[model_idx].outputs[output_idx];
            if node.current_step == Some(step) {
                return Ok(node.current_values.clone());
            }
        }

        let new_values = if step == 0 {
            let initial = self.models[model_idx].outputs[output_idx].spec.initial_value;
            match initial {
                Some(v) => vec![v; self.batch_size],
                None => self.compute_kernel(node_ref, step)?,
            }
        } else {
            self.compute_kernel(node_ref, step)?
        };

        let node = &mut self.models[model_idx].outputs[output_idx];
        node.previous_values = std::mem::replace(&mut node.current_values, new_values.clone());
        node.current_step = Some(step);
        Ok(new_values)
    }

    fn compute_kernel(&mut self, node_ref: NodeRef, step: u32) -> Result<Vec<f64>, EsgError> {
        let (model_idx, output_idx) = node_ref;
        let kernel = self.models[model_idx].outputs[output_idx].kernel.clone();
        let f = self.annualisation_factor;
        let t = step as f64 / f;

        let values = match kernel {
            Kernel::BrownianMotion { driver_local_index } => {
                let prev = self.models[model_idx].outputs[output_idx].current_values.clone();
                let z = self.driver_sample(model_idx, driver_local_index, step);
                let scale = hull_white::brownian_scale(f);
                prev.iter().zip(z.iter()).map(|(p, zi)| p + scale * zi).collect()
            }
            Kernel::OuProcess { alpha, driver_local_index } => {
                let prev = self.models[model_idx].outputs[output_idx].current_values.clone();
                let z = self.driver_sample(model_idx, driver_local_index, step);
                let decay = hull_white::ou_decay(alpha, f);
                let vol = hull_white::ou_vol(alpha, f);
                prev.iter().zip(z.iter()).map(|(p, zi)| decay * p + vol * zi).collect()
            }
            Kernel::DiscountFactor { alpha, sigma, brownian_dep, ou_dep } => {
                let b = self.value_at(brownian_dep, step)?;
                let x = self.value_at(ou_dep, step)?;
                let p_t = self.zcb_price(model_idx, t)?;
                let a_term = hull_white::discount_factor_a(sigma, alpha, t);
                let c_term = hull_white::discount_factor_c(sigma, alpha);
                b.iter()
                    .zip(x.iter())
                    .map(|(bi, xi)| p_t * (-(a_term + c_term * bi - c_term * xi)).exp())
                    .collect()
            }
            Kernel::CashAccount { discount_factor_dep } => {
                let d = self.value_at(discount_factor_dep, step)?;
                d.iter().map(|di| 1.0 / di).collect()
            }
            Kernel::ZeroCouponBond { alpha, sigma, term, ou_dep } => {
                let x = self.value_at(ou_dep, step)?;
                let p_t = self.zcb_price(model_idx, t)?;
                let p_t_tau = self.zcb_price(model_idx, t + term)?;
                let g_term = hull_white::zcb_g(sigma, alpha, t, term);
                let coefficient = hull_white::zcb_x_coefficient(sigma, alpha, term);
                x.iter()
                    .map(|xi| (p_t_tau / p_t) * (g_term - coefficient * xi).exp())
                    .collect()
            }
            Kernel::TotalReturnIndex { sigma, driver_local_index, discount_factor_dep } => {
                let prev_tri = self.models[model_idx].outputs[output_idx].current_values.clone();
                let z = self.driver_sample(model_idx, driver_local_index, step);
                // discount_factor_dep is walked earlier in this step's order, so its
                // current_values already hold the step-`step` value; its previous_values
                // field holds the step-`step - 1` value we need here without recomputing it.
                let d_curr = self.value_at(discount_factor_dep, step)?;
                let d_prev = self.models[discount_factor_dep.0].outputs[discount_factor_dep.1].previous_values.clone();
                prev_tri
                    .iter()
                    .zip(z.iter())
                    .zip(d_curr.iter())
                    .zip(d_prev.iter())
                    .map(|(((p, zi), dc), dp)| p * black_scholes::tri_log_increment(sigma, *zi, f).exp() * (dp / dc))
                    .collect()
            }
        };
        Ok(values)
    }

    fn zcb_price(&mut self, model_idx: usize, term: f64) -> Result<f64, EsgError> {
        Ok(self.models[model_idx]
            .yield_curve
            .as_mut()
            .expect("discount/ZCB kernels only exist on Hull-White models")
            .zcb_price(term)?)
    }
}

fn default_initial_value(output_type: OutputType) -> Option<f64> {
    match output_type {
        OutputType::BrownianMotion | OutputType::OuProcess => Some(0.0),
        _ => None,
    }
}
