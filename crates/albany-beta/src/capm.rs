//! Single-window CAPM fit.
//!
//! The only regression the pipeline needs: ordinary least squares of excess
//! return on market excess return with an intercept, of which we keep the
//! slope. `β = Σ(x_i − x̄)(y_i − ȳ) / Σ(x_i − x̄)²`.

use crate::error::{BetaError, Result};
use ndarray::Array1;

/// Variance floor below which the regressor is treated as constant.
/// Excess-return magnitudes are around 1e-2, so genuine cross-window
/// variation sits many orders of magnitude above this.
const VARIANCE_FLOOR: f64 = 1e-12;

/// Fit the OLS slope of `dependent` on `factor` (with intercept).
///
/// # Errors
///
/// `InsufficientData` if fewer than two paired observations are given,
/// `DegenerateWindow` if the factor is constant within the window.
pub fn ols_slope(factor: &Array1<f64>, dependent: &Array1<f64>) -> Result<f64> {
    let n = factor.len();
    if n != dependent.len() {
        return Err(BetaError::MismatchedLengths {
            periods: n,
            dependent: dependent.len(),
            factor: n,
        });
    }
    if n < 2 {
        return Err(BetaError::InsufficientData {
            required: 2,
            actual: n,
        });
    }

    let x_mean = factor.sum() / n as f64;
    let y_mean = dependent.sum() / n as f64;
    let xc = factor.mapv(|x| x - x_mean);
    let yc = dependent.mapv(|y| y - y_mean);

    let sxx = xc.dot(&xc);
    if !sxx.is_finite() || sxx / (n as f64 - 1.0) < VARIANCE_FLOOR {
        return Err(BetaError::DegenerateWindow);
    }

    Ok(xc.dot(&yc) / sxx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_known_slope() {
        // y = 0.002 + 1.5x exactly
        let x = Array1::from_vec(vec![0.01, -0.02, 0.03, 0.005, -0.01]);
        let y = x.mapv(|v| 0.002 + 1.5 * v);
        let beta = ols_slope(&x, &y).unwrap();
        assert_relative_eq!(beta, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn intercept_does_not_bias_slope() {
        let x = Array1::from_vec(vec![0.01, 0.02, 0.03, 0.04]);
        let y = x.mapv(|v| 0.05 + 0.8 * v);
        let shifted = ols_slope(&x, &y).unwrap();
        let centered = ols_slope(&x, &x.mapv(|v| 0.8 * v)).unwrap();
        assert_relative_eq!(shifted, centered, epsilon = 1e-12);
    }

    #[test]
    fn constant_factor_is_degenerate() {
        let x = Array1::from_vec(vec![0.01; 10]);
        let y = Array1::from_vec((0..10).map(|i| i as f64 * 0.01).collect::<Vec<_>>());
        assert!(matches!(ols_slope(&x, &y), Err(BetaError::DegenerateWindow)));
    }

    #[test]
    fn single_observation_is_insufficient() {
        let x = Array1::from_vec(vec![0.01]);
        let y = Array1::from_vec(vec![0.02]);
        assert!(matches!(
            ols_slope(&x, &y),
            Err(BetaError::InsufficientData { required: 2, actual: 1 })
        ));
    }

    #[test]
    fn negative_beta_is_fine() {
        let x = Array1::from_vec(vec![0.01, -0.02, 0.015, -0.005]);
        let y = x.mapv(|v| -0.7 * v);
        let beta = ols_slope(&x, &y).unwrap();
        assert_relative_eq!(beta, -0.7, epsilon = 1e-12);
    }
}
