//! Martingale and log-return-moment validators (C8 analyses).

use serde::Serialize;
use tracing::instrument;

use crate::error::{EsgError, ValidationError};
use crate::types::{AnalysisId, OutputType, params_from};
use crate::yield_curve::extract_yield_curve;

use super::data_extractor::DataExtractor;
use super::stats::{confidence_interval, kurtosis, log_returns, mean, sample_variance, skewness};

#[derive(Debug, Clone, Serialize)]
pub struct MartingaleSeries {
    pub time: Vec<f64>,
    pub sample_mean: Vec<f64>,
    pub lower_confidence_interval: Vec<f64>,
    pub upper_confidence_interval: Vec<f64>,
    pub expected_value: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MartingaleResult {
    pub asset_class_id: String,
    pub analysis_id: AnalysisId,
    pub result_type: &'static str,
    pub term: Option<f64>,
    pub series: MartingaleSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentsSeries {
    pub time: Vec<f64>,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub skewness: Vec<f64>,
    pub kurtosis: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentsResult {
    pub asset_class_id: String,
    pub analysis_id: AnalysisId,
    pub result_type: &'static str,
    pub series: MomentsSeries,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ValidatorResult {
    Martingale(MartingaleResult),
    Moments(MomentsResult),
}

/// Swaps the CI bounds after the monotonically-decreasing `p -> -ln(p)/t` map
/// (a higher discounted-price bound corresponds to a lower yield bound).
fn discount_to_yield(mean: f64, lower: f64, upper: f64, t: f64) -> (f64, f64, f64) {
    let to_yield = |p: f64| -p.ln() / t;
    (to_yield(mean), to_yield(upper), to_yield(lower))
}

#[instrument(skip(extractor), fields(asset_class = %extractor.asset_class().id))]
pub fn average_discount_factor(
    extractor: &mut DataExtractor,
    annualisation_factor: f64,
    confidence_level: f64,
) -> Result<MartingaleResult, EsgError> {
    let paths = extractor.paths(OutputType::DiscountFactor, &params_from([]))?.clone();
    let mut curve = extract_yield_curve(&extractor.asset_class().parameters)?;

    let (_, steps) = paths.dim();
    let mut series = MartingaleSeries {
        time: Vec::with_capacity(steps - 1),
        sample_mean: Vec::with_capacity(steps - 1),
        lower_confidence_interval: Vec::with_capacity(steps - 1),
        upper_confidence_interval: Vec::with_capacity(steps - 1),
        expected_value: Vec::with_capacity(steps - 1),
    };

    for step in 1..steps {
        let t = step as f64 / annualisation_factor;
        let values: Vec<f64> = paths.column(step).iter().map(|&v| v as f64).collect();
        let (m, lower, upper) = confidence_interval(&values, confidence_level);
        let (y_mean, y_lower, y_upper) = discount_to_yield(m, lower, upper, t);
        series.time.push(t);
        series.sample_mean.push(y_mean);
        series.lower_confidence_interval.push(y_lower);
        series.upper_confidence_interval.push(y_upper);
        series.expected_value.push(curve.rate(t)?);
    }

    Ok(MartingaleResult {
        asset_class_id: extractor.asset_class().id.clone(),
        analysis_id: AnalysisId::AverageDiscountFactor,
        result_type: "martingale",
        term: None,
        series,
    })
}

#[instrument(skip(extractor), fields(asset_class = %extractor.asset_class().id))]
pub fn discounted_zero_coupon_bond(
    extractor: &mut DataExtractor,
    annualisation_factor: f64,
    confidence_level: f64,
    term: f64,
) -> Result<MartingaleResult, EsgError> {
    let discount_factor = extractor.paths(OutputType::DiscountFactor, &params_from([]))?.clone();
    let zcb_parameters = params_from([("term", term)]);
    let zcb = extractor.paths(OutputType::ZeroCouponBond, &zcb_parameters)?.clone();
    let mut curve = extract_yield_curve(&extractor.asset_class().parameters)?;

    let (_, steps) = discount_factor.dim();
    let mut series = MartingaleSeries {
        time: Vec::with_capacity(steps - 1),
        sample_mean: Vec::with_capacity(steps - 1),
        lower_confidence_interval: Vec::with_capacity(steps - 1),
        upper_confidence_interval: Vec::with_capacity(steps - 1),
        expected_value: Vec::with_capacity(steps - 1),
    };

    for step in 1..steps {
        let t = step as f64 / annualisation_factor;
        let horizon = t + term;
        let values: Vec<f64> = discount_factor
            .column(step)
            .iter()
            .zip(zcb.column(step).iter())
            .map(|(&d, &z)| (d as f64) * (z as f64))
            .collect();
        let (m, lower, upper) = confidence_interval(&values, confidence_level);
        let (y_mean, y_lower, y_upper) = discount_to_yield(m, lower, upper, horizon);
        series.time.push(t);
        series.sample_mean.push(y_mean);
        series.lower_confidence_interval.push(y_lower);
        series.upper_confidence_interval.push(y_upper);
        series.expected_value.push(curve.rate(horizon)?);
    }

    Ok(MartingaleResult {
        asset_class_id: extractor.asset_class().id.clone(),
        analysis_id: AnalysisId::DiscountedZeroCouponBond,
        result_type: "martingale",
        term: Some(term),
        series,
    })
}

#[instrument(skip(extractor), fields(asset_class = %extractor.asset_class().id))]
pub fn discounted_total_return_index(
    extractor: &mut DataExtractor,
    annualisation_factor: f64,
    confidence_level: f64,
) -> Result<MartingaleResult, EsgError> {
    let tri_parameters = params_from([]);
    let initial_value = extractor
        .asset_class()
        .outputs
        .iter()
        .find(|o| o.output_type == OutputType::TotalReturnIndex && o.parameters == tri_parameters)
        .and_then(|o| o.initial_value)
        .unwrap_or(1.0);

    let paths = extractor
        .paths(OutputType::TotalReturnIndex, &tri_parameters)?
        .clone();

    let (_, steps) = paths.dim();
    let mut series = MartingaleSeries {
        time: Vec::with_capacity(steps),
        sample_mean: Vec::with_capacity(steps),
        lower_confidence_interval: Vec::with_capacity(steps),
        upper_confidence_interval: Vec::with_capacity(steps),
        expected_value: Vec::with_capacity(steps),
    };

    for step in 0..steps {
        let t = step as f64 / annualisation_factor;
        let values: Vec<f64> = paths.column(step).iter().map(|&v| v as f64).collect();
        let (m, lower, upper) = confidence_interval(&values, confidence_level);
        series.time.push(t);
        series.sample_mean.push(m);
        series.lower_confidence_interval.push(lower);
        series.upper_confidence_interval.push(upper);
        series.expected_value.push(initial_value);
    }

    Ok(MartingaleResult {
        asset_class_id: extractor.asset_class().id.clone(),
        analysis_id: AnalysisId::DiscountedTotalReturnIndex,
        result_type: "martingale",
        term: None,
        series,
    })
}

#[instrument(skip(extractor), fields(asset_class = %extractor.asset_class().id))]
pub fn total_return_index_log_return_moments(
    extractor: &mut DataExtractor,
    annualisation_factor: f64,
) -> Result<MomentsResult, EsgError> {
    let paths = extractor
        .paths(OutputType::TotalReturnIndex, &params_from([]))?
        .clone();
    let returns = log_returns(&paths);
    let (_, steps) = returns.dim();

    let mut series = MomentsSeries {
        time: Vec::with_capacity(steps),
        mean: Vec::with_capacity(steps),
        variance: Vec::with_capacity(steps),
        skewness: Vec::with_capacity(steps),
        kurtosis: Vec::with_capacity(steps),
    };

    for step in 0..steps {
        let t = (step + 1) as f64 / annualisation_factor;
        let values: Vec<f64> = returns.column(step).to_vec();
        series.time.push(t);
        series.mean.push(mean(&values) * annualisation_factor);
        series.variance.push(sample_variance(&values) * annualisation_factor);
        series.skewness.push(skewness(&values) * annualisation_factor);
        series.kurtosis.push(kurtosis(&values) * annualisation_factor);
    }

    Ok(MomentsResult {
        asset_class_id: extractor.asset_class().id.clone(),
        analysis_id: AnalysisId::TotalReturnIndexLogReturnMoments,
        result_type: "moments",
        series,
    })
}

/// Dispatches one analysis by id, reading whatever `parameters` it needs
/// (currently only `confidence_level` and `terms`) from `AnalysisParameters`.
pub(crate) fn dispatch(
    analysis_id: AnalysisId,
    extractor: &mut DataExtractor,
    annualisation_factor: f64,
    confidence_level: f64,
    terms: &[f64],
) -> Result<Vec<ValidatorResult>, EsgError> {
    match analysis_id {
        AnalysisId::AverageDiscountFactor => Ok(vec![ValidatorResult::Martingale(
            average_discount_factor(extractor, annualisation_factor, confidence_level)?,
        )]),
        AnalysisId::DiscountedTotalReturnIndex => Ok(vec![ValidatorResult::Martingale(
            discounted_total_return_index(extractor, annualisation_factor, confidence_level)?,
        )]),
        AnalysisId::DiscountedZeroCouponBond => {
            if terms.is_empty() {
                return Err(ValidationError::AnalysisNotSupported(
                    "discounted_zero_coupon_bond requires at least one term".into(),
                )
                .into());
            }
            terms
                .iter()
                .map(|&term| {
                    discounted_zero_coupon_bond(extractor, annualisation_factor, confidence_level, term)
                        .map(ValidatorResult::Martingale)
                })
                .collect()
        }
        AnalysisId::TotalReturnIndexLogReturnMoments => Ok(vec![ValidatorResult::Moments(
            total_return_index_log_return_moments(extractor, annualisation_factor)?,
        )]),
    }
}
