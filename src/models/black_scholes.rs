//! Analytic terms for the Black-Scholes total-return-index model.

/// Log-increment of the total return index for one step, given driver `z`.
///
/// Scales `sigma * z` by `1/f` rather than the conventional `sqrt(1/f)`.
/// Preserved from the source model; see the design notes for context.
pub fn tri_log_increment(sigma: f64, z: f64, f: f64) -> f64 {
    -sigma * sigma / (2.0 * f) + sigma * z / f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_increment_is_negative_on_average_for_zero_driver() {
        assert!(tri_log_increment(0.2, 0.0, 12.0) < 0.0);
    }
}
