//! Sample statistics shared by the validators (C8): confidence intervals and
//! annualised log-return moments.

/// Inverse standard-normal CDF (quantile function), Acklam's rational
/// approximation. Accurate to about 1.15e-9 absolute error.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];

    let p_low = 0.02425;
    let p_high = 1.0 - p_low;

    if p <= 0.0 || p >= 1.0 {
        return if p <= 0.0 { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    if p < p_low {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= p_high {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with Bessel's correction (ddof = 1).
pub fn sample_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    let n = values.len() as f64;
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0)
}

pub fn skewness(values: &[f64]) -> f64 {
    let m = mean(values);
    let n = values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let third_moment = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    third_moment / variance.powf(1.5)
}

/// Excess (Fisher) kurtosis: 0 for a normal distribution.
pub fn kurtosis(values: &[f64]) -> f64 {
    let m = mean(values);
    let n = values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let fourth_moment = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;
    fourth_moment / variance.powi(2) - 3.0
}

/// Two-sided `(1 - alpha)` confidence interval for the sample mean, using the
/// normal-approximation `z * stdev / sqrt(n)`.
pub fn confidence_interval(values: &[f64], confidence_level: f64) -> (f64, f64, f64) {
    let m = mean(values);
    let stdev = sample_variance(values).sqrt();
    let z = inverse_normal_cdf(1.0 - (1.0 - confidence_level) / 2.0);
    let half_width = z * stdev / (values.len() as f64).sqrt();
    (m, m - half_width, m + half_width)
}

/// Log returns `ln(path[i+1] / path[i])` along the simulation axis for every path.
pub fn log_returns(paths: &ndarray::Array2<f32>) -> ndarray::Array2<f64> {
    let (s, t) = paths.dim();
    let mut out = ndarray::Array2::<f64>::zeros((s, t - 1));
    for sim in 0..s {
        for step in 0..t - 1 {
            out[[sim, step]] = ((paths[[sim, step + 1]] / paths[[sim, step]]) as f64).ln();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_normal_cdf_at_median_is_zero() {
        assert!(inverse_normal_cdf(0.5).abs() < 1e-9);
    }

    #[test]
    fn inverse_normal_cdf_matches_known_quantile() {
        // 97.5th percentile of the standard normal is ~1.95996
        assert!((inverse_normal_cdf(0.975) - 1.959964).abs() < 1e-5);
    }

    #[test]
    fn confidence_interval_brackets_the_mean() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let (m, lower, upper) = confidence_interval(&values, 0.95);
        assert!(lower < m && m < upper);
    }

    #[test]
    fn variance_of_constant_series_is_zero() {
        assert_eq!(sample_variance(&[2.0, 2.0, 2.0]), 0.0);
    }
}
