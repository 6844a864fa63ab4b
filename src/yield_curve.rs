//! Piecewise-linear interpolation of continuously-compounded spot rates (C1).

use regex::Regex;
use std::sync::OnceLock;

use crate::error::YieldCurveError;
use crate::types::Parameters;

fn yc_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^yc_(.+)$").expect("static regex"))
}

/// A curve of (term, rate) points, always including the implicit `(0, 0)` point.
///
/// Points may be added in any order. The curve sorts itself lazily on first
/// query and caches the sorted terms plus the min/max range; subsequent
/// `add_point` calls mark it dirty again.
#[derive(Debug, Clone)]
pub struct YieldCurve {
    points: Vec<(f64, f64)>,
    sorted: bool,
    min_term: f64,
    max_term: f64,
}

impl Default for YieldCurve {
    fn default() -> Self {
        Self::new()
    }
}

impl YieldCurve {
    pub fn new() -> Self {
        Self {
            points: vec![(0.0, 0.0)],
            sorted: true,
            min_term: 0.0,
            max_term: 0.0,
        }
    }

    pub fn add_point(&mut self, term: f64, rate: f64) {
        self.points.push((term, rate));
        self.sorted = false;
    }

    fn resort(&mut self) {
        if self.sorted {
            return;
        }
        self.points
            .sort_by(|a, b| a.0.partial_cmp(&b.0).expect("term is not NaN"));
        self.points.dedup_by(|a, b| a.0 == b.0);
        self.min_term = self.points.first().map(|p| p.0).unwrap_or(0.0);
        self.max_term = self.points.last().map(|p| p.0).unwrap_or(0.0);
        self.sorted = true;
    }

    /// Continuously-compounded spot rate at `term`, linearly interpolated
    /// between the two neighbouring stored points.
    pub fn rate(&mut self, term: f64) -> Result<f64, YieldCurveError> {
        if term < 0.0 {
            return Err(YieldCurveError::NegativeTerm(term));
        }
        self.resort();
        if self.points.is_empty() {
            return Err(YieldCurveError::Empty);
        }
        if term < self.min_term || term > self.max_term {
            return Err(YieldCurveError::OutOfRange {
                term,
                min: self.min_term,
                max: self.max_term,
            });
        }
        if term == 0.0 {
            return Ok(0.0);
        }

        let idx = self
            .points
            .partition_point(|&(t, _)| t < term);
        if self.points[idx].0 == term {
            return Ok(self.points[idx].1);
        }
        let (t0, r0) = self.points[idx - 1];
        let (t1, r1) = self.points[idx];
        Ok(r0 + (term - t0) / (t1 - t0) * (r1 - r0))
    }

    /// Zero-coupon bond price `P(term) = exp(-term * rate(term))`.
    pub fn zcb_price(&mut self, term: f64) -> Result<f64, YieldCurveError> {
        Ok((-term * self.rate(term)?).exp())
    }
}

/// Extracts a yield curve from asset-class parameters whose keys match `yc_<term>`.
pub fn extract_yield_curve(parameters: &Parameters) -> Result<YieldCurve, crate::error::ModelError> {
    let mut curve = YieldCurve::new();
    for (key, rate) in parameters.iter() {
        if let Some(caps) = yc_key_regex().captures(key) {
            let term: f64 = caps[1]
                .parse()
                .map_err(|_| crate::error::ModelError::MalformedYieldCurveKey(key.clone()))?;
            curve.add_point(term, rate.into_inner());
        }
    }
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_zero_point_returns_zero_rate() {
        let mut curve = YieldCurve::new();
        curve.add_point(10.0, 0.05);
        assert_eq!(curve.rate(0.0).unwrap(), 0.0);
    }

    #[test]
    fn interpolates_linearly_between_neighbours() {
        let mut curve = YieldCurve::new();
        curve.add_point(10.0, 0.10);
        curve.add_point(20.0, 0.20);
        assert!((curve.rate(15.0).unwrap() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn out_of_order_insertion_is_sorted_lazily() {
        let mut curve = YieldCurve::new();
        curve.add_point(20.0, 0.20);
        curve.add_point(10.0, 0.10);
        assert!((curve.rate(15.0).unwrap() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn query_out_of_range_fails() {
        let mut curve = YieldCurve::new();
        curve.add_point(40.0, 0.03);
        assert!(matches!(
            curve.rate(41.0),
            Err(YieldCurveError::OutOfRange { .. })
        ));
    }

    #[test]
    fn negative_term_fails() {
        let mut curve = YieldCurve::new();
        curve.add_point(10.0, 0.1);
        assert!(matches!(curve.rate(-1.0), Err(YieldCurveError::NegativeTerm(_))));
    }

    #[test]
    fn zcb_price_matches_continuous_compounding() {
        let mut curve = YieldCurve::new();
        curve.add_point(5.0, 0.04);
        let price = curve.zcb_price(5.0).unwrap();
        assert!((price - (-5.0f64 * 0.04).exp()).abs() < 1e-12);
    }

    #[test]
    fn extracts_points_from_prefixed_parameters() {
        let params = crate::types::params_from([("alpha", 0.05), ("yc_5", 0.03), ("yc_10", 0.035)]);
        let mut curve = extract_yield_curve(&params).unwrap();
        assert!((curve.rate(5.0).unwrap() - 0.03).abs() < 1e-12);
        assert!((curve.rate(7.5).unwrap() - 0.0325).abs() < 1e-12);
    }
}
