//! Analytic terms for the Hull-White one-factor short-rate model, kept as
//! pure functions so they can be tested independent of the output graph.

/// Per-step Brownian increment scale `sqrt(1/f)`.
pub fn brownian_scale(f: f64) -> f64 {
    (1.0 / f).sqrt()
}

/// OU-process mean-reversion decay over one step of length `1/f`.
pub fn ou_decay(alpha: f64, f: f64) -> f64 {
    (-alpha / f).exp()
}

/// OU-process innovation scale over one step of length `1/f`.
pub fn ou_vol(alpha: f64, f: f64) -> f64 {
    ((1.0 - (-2.0 * alpha / f).exp()) / (2.0 * alpha)).sqrt()
}

/// `A(t)` term of the discount-factor formula.
pub fn discount_factor_a(sigma: f64, alpha: f64, t: f64) -> f64 {
    sigma * sigma / (4.0 * alpha.powi(3))
        * (2.0 * alpha * t - 3.0 + 4.0 * (-alpha * t).exp() - (-2.0 * alpha * t).exp())
}

/// `C` coefficient of the discount-factor formula.
pub fn discount_factor_c(sigma: f64, alpha: f64) -> f64 {
    sigma / alpha
}

/// `G(t, tau)` term of the zero-coupon-bond formula.
pub fn zcb_g(sigma: f64, alpha: f64, t: f64, tau: f64) -> f64 {
    sigma * sigma / (4.0 * alpha.powi(3))
        * ((1.0 - (-2.0 * alpha * tau).exp()) * (1.0 - (-2.0 * alpha * t).exp())
            - 4.0 * (1.0 - (-alpha * tau).exp()) * (1.0 - (-alpha * t).exp()))
}

/// Coefficient of `X_s` in the zero-coupon-bond formula.
pub fn zcb_x_coefficient(sigma: f64, alpha: f64, tau: f64) -> f64 {
    sigma / alpha * (1.0 - (-alpha * tau).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_factor_a_term_vanishes_at_t_zero() {
        assert!((discount_factor_a(0.02, 0.05, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn zcb_g_term_vanishes_at_t_zero_and_tau_zero() {
        assert!((zcb_g(0.02, 0.05, 0.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn ou_decay_is_one_at_zero_alpha_limit_step() {
        // f huge => step length ~0 => decay ~1
        assert!((ou_decay(0.05, 1e9) - 1.0).abs() < 1e-6);
    }
}
