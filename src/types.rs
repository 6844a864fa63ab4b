//! Shared vocabulary: recognised model/output/frequency identifiers and the
//! parameter-mapping type used to key output nodes.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::sorted_vec_map::SortedVecMap;

/// `str -> float` parameter mapping attached to an asset class or output spec.
///
/// Sorted-vector backed: parameter maps are small (a handful of entries) and
/// need structural equality for dependency de-duplication in the output graph
/// (C5's `get_or_create`), which `SortedVecMap`'s derived `PartialEq` gives for free.
pub type Parameters = SortedVecMap<String, OrderedFloat<f64>>;

pub fn param(parameters: &Parameters, key: &str) -> Option<f64> {
    parameters.get(&key.to_string()).map(|v| v.into_inner())
}

pub fn params_from(pairs: impl IntoIterator<Item = (&'static str, f64)>) -> Parameters {
    let mut map = Parameters::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), OrderedFloat(v));
    }
    map
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    HullWhite,
    BlackScholes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    BrownianMotion,
    OuProcess,
    DiscountFactor,
    CashAccount,
    ZeroCouponBond,
    TotalReturnIndex,
    /// Never produced by any model; kept parseable so a config referencing it
    /// reports `OutputNotSupported` rather than failing to parse at all.
    BondIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Annually,
    Monthly,
    Weekly,
}

impl Frequency {
    /// Number of projection steps per calendar year.
    pub fn annualisation_factor(self) -> f64 {
        match self {
            Frequency::Annually => 1.0,
            Frequency::Monthly => 12.0,
            Frequency::Weekly => 52.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisId {
    AverageDiscountFactor,
    DiscountedTotalReturnIndex,
    DiscountedZeroCouponBond,
    TotalReturnIndexLogReturnMoments,
}
