//! Error metrics and likelihoods over a predicted/target pair (§4.F).
//!
//! Grounded on Operon's `error_metrics/*.hpp`: each metric is a pure
//! reduction over two equal-length spans, with no dependency on the
//! interpreter or a particular tree — the evaluator family (§4.G) is what
//! wires a metric to a tree's predictions.

use symreg_error::{SymregError, SymregResult};

fn check_lengths(predicted: &[f64], target: &[f64]) -> SymregResult<()> {
    if predicted.len() != target.len() {
        return Err(SymregError::invalid_argument(format!(
            "predicted has {} values but target has {}",
            predicted.len(),
            target.len()
        )));
    }
    if predicted.is_empty() {
        return Err(SymregError::invalid_argument("cannot score an empty span"));
    }
    Ok(())
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sum of squared errors.
pub fn sse(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    Ok(predicted
        .iter()
        .zip(target)
        .map(|(p, t)| (p - t) * (p - t))
        .sum())
}

/// Mean squared error.
pub fn mse(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    Ok(sse(predicted, target)? / predicted.len() as f64)
}

/// Root mean squared error.
pub fn rmse(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    Ok(mse(predicted, target)?.sqrt())
}

/// Normalized mean squared error: MSE divided by the target's variance.
/// Scale-invariant, so fitness values are comparable across datasets (§4.F).
pub fn nmse(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    let target_mean = mean(target);
    let variance: f64 = target.iter().map(|t| (t - target_mean) * (t - target_mean)).sum::<f64>()
        / target.len() as f64;
    if variance == 0.0 {
        return Err(SymregError::invalid_argument(
            "target has zero variance; normalized mean squared error is undefined",
        ));
    }
    Ok(mse(predicted, target)? / variance)
}

/// Mean absolute error.
pub fn mae(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    Ok(predicted.iter().zip(target).map(|(p, t)| (p - t).abs()).sum::<f64>()
        / predicted.len() as f64)
}

/// Coefficient of determination: `1 - SS_res / SS_tot`.
pub fn r_squared(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    let target_mean = mean(target);
    let ss_tot: f64 = target.iter().map(|t| (t - target_mean) * (t - target_mean)).sum();
    if ss_tot == 0.0 {
        return Err(SymregError::invalid_argument(
            "target has zero variance; r-squared is undefined",
        ));
    }
    let ss_res = sse(predicted, target)?;
    Ok(1.0 - ss_res / ss_tot)
}

fn check_weighted_lengths(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<()> {
    check_lengths(predicted, target)?;
    if weights.len() != target.len() {
        return Err(SymregError::invalid_argument(format!(
            "weights has {} values but target has {}",
            weights.len(),
            target.len()
        )));
    }
    Ok(())
}

fn weighted_sum(xs: &[f64], weights: &[f64]) -> f64 {
    xs.iter().zip(weights).map(|(x, w)| x * w).sum()
}

fn weight_total(weights: &[f64]) -> SymregResult<f64> {
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return Err(SymregError::invalid_argument("weights must not sum to zero"));
    }
    Ok(total)
}

fn weighted_mean(xs: &[f64], weights: &[f64], total: f64) -> f64 {
    weighted_sum(xs, weights) / total
}

/// Weighted sum of squared errors. Reduces to [`sse`] when every weight is
/// `1.0` (§8 testable property: weighted metrics agree with their unweighted
/// counterpart under uniform weights).
pub fn weighted_sse(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
    check_weighted_lengths(predicted, target, weights)?;
    Ok(predicted
        .iter()
        .zip(target)
        .zip(weights)
        .map(|((p, t), w)| w * (p - t) * (p - t))
        .sum())
}

/// Weighted mean squared error: `sum(w*(p-t)^2) / sum(w)`.
pub fn weighted_mse(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
    let total = weight_total(weights)?;
    Ok(weighted_sse(predicted, target, weights)? / total)
}

/// Weighted root mean squared error.
pub fn weighted_rmse(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
    Ok(weighted_mse(predicted, target, weights)?.sqrt())
}

/// Weighted normalized mean squared error: weighted MSE divided by the
/// weighted variance of `target`.
pub fn weighted_nmse(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
    check_weighted_lengths(predicted, target, weights)?;
    let total = weight_total(weights)?;
    let target_mean = weighted_mean(target, weights, total);
    let variance: f64 = target
        .iter()
        .zip(weights)
        .map(|(t, w)| w * (t - target_mean) * (t - target_mean))
        .sum::<f64>()
        / total;
    if variance == 0.0 {
        return Err(SymregError::invalid_argument(
            "target has zero weighted variance; normalized mean squared error is undefined",
        ));
    }
    Ok(weighted_mse(predicted, target, weights)? / variance)
}

/// Weighted mean absolute error.
pub fn weighted_mae(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
    check_weighted_lengths(predicted, target, weights)?;
    let total = weight_total(weights)?;
    Ok(predicted
        .iter()
        .zip(target)
        .zip(weights)
        .map(|((p, t), w)| w * (p - t).abs())
        .sum::<f64>()
        / total)
}

/// Weighted coefficient of determination.
pub fn weighted_r_squared(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
    check_weighted_lengths(predicted, target, weights)?;
    let total = weight_total(weights)?;
    let target_mean = weighted_mean(target, weights, total);
    let ss_tot: f64 = target
        .iter()
        .zip(weights)
        .map(|(t, w)| w * (t - target_mean) * (t - target_mean))
        .sum();
    if ss_tot == 0.0 {
        return Err(SymregError::invalid_argument(
            "target has zero weighted variance; r-squared is undefined",
        ));
    }
    let ss_res = weighted_sse(predicted, target, weights)?;
    Ok(1.0 - ss_res / ss_tot)
}

/// Weighted squared Pearson correlation coefficient.
pub fn weighted_c_squared(predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
    check_weighted_lengths(predicted, target, weights)?;
    let total = weight_total(weights)?;
    let pm = weighted_mean(predicted, weights, total);
    let tm = weighted_mean(target, weights, total);

    let mut cov = 0.0;
    let mut var_p = 0.0;
    let mut var_t = 0.0;
    for ((&p, &t), &w) in predicted.iter().zip(target).zip(weights) {
        let dp = p - pm;
        let dt = t - tm;
        cov += w * dp * dt;
        var_p += w * dp * dp;
        var_t += w * dt * dt;
    }

    if var_p == 0.0 || var_t == 0.0 {
        return Err(SymregError::invalid_argument(
            "predicted or target has zero weighted variance; c-squared is undefined",
        ));
    }

    let r = cov / (var_p.sqrt() * var_t.sqrt());
    Ok(r * r)
}

/// Squared Pearson correlation coefficient between predicted and target.
pub fn c_squared(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    let pm = mean(predicted);
    let tm = mean(target);

    let mut cov = 0.0;
    let mut var_p = 0.0;
    let mut var_t = 0.0;
    for (&p, &t) in predicted.iter().zip(target) {
        let dp = p - pm;
        let dt = t - tm;
        cov += dp * dt;
        var_p += dp * dp;
        var_t += dt * dt;
    }

    if var_p == 0.0 || var_t == 0.0 {
        return Err(SymregError::invalid_argument(
            "predicted or target has zero variance; c-squared is undefined",
        ));
    }

    let r = cov / (var_p.sqrt() * var_t.sqrt());
    Ok(r * r)
}

/// The scalar error metrics an evaluator (§4.G) can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorMetric {
    Sse,
    Mse,
    Rmse,
    Nmse,
    Mae,
    RSquared,
    CSquared,
}

impl ErrorMetric {
    pub fn score(&self, predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
        match self {
            ErrorMetric::Sse => sse(predicted, target),
            ErrorMetric::Mse => mse(predicted, target),
            ErrorMetric::Rmse => rmse(predicted, target),
            ErrorMetric::Nmse => nmse(predicted, target),
            ErrorMetric::Mae => mae(predicted, target),
            ErrorMetric::RSquared => r_squared(predicted, target),
            ErrorMetric::CSquared => c_squared(predicted, target),
        }
    }

    /// Whether a smaller score is better. `RSquared`/`CSquared` are the
    /// exceptions: both increase toward a perfect fit.
    pub fn lower_is_better(&self) -> bool {
        !matches!(self, ErrorMetric::RSquared | ErrorMetric::CSquared)
    }

    /// Weighted counterpart of [`Self::score`]; agrees with it when every
    /// weight is `1.0`.
    pub fn score_weighted(&self, predicted: &[f64], target: &[f64], weights: &[f64]) -> SymregResult<f64> {
        match self {
            ErrorMetric::Sse => weighted_sse(predicted, target, weights),
            ErrorMetric::Mse => weighted_mse(predicted, target, weights),
            ErrorMetric::Rmse => weighted_rmse(predicted, target, weights),
            ErrorMetric::Nmse => weighted_nmse(predicted, target, weights),
            ErrorMetric::Mae => weighted_mae(predicted, target, weights),
            ErrorMetric::RSquared => weighted_r_squared(predicted, target, weights),
            ErrorMetric::CSquared => weighted_c_squared(predicted, target, weights),
        }
    }
}

/// Negative log-likelihood under a Gaussian noise model with variance
/// `sigma_squared` (§4.F); the nonlinear optimizer (§4.E) minimizes this
/// directly when a likelihood-based objective is configured rather than SSE.
pub fn gaussian_nll(predicted: &[f64], target: &[f64], sigma_squared: f64) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    if sigma_squared <= 0.0 {
        return Err(SymregError::invalid_argument("sigma_squared must be positive"));
    }
    let n = predicted.len() as f64;
    let residual_sq = sse(predicted, target)?;
    Ok(0.5 * (n * (2.0 * std::f64::consts::PI * sigma_squared).ln() + residual_sq / sigma_squared))
}

/// Negative log-likelihood under a Poisson model with the log link:
/// `predicted` is read as the linear predictor `eta`, with the rate itself
/// `exp(eta)` (§4.F). Grounded on Operon's `PoissonLikelihood` log-link form:
/// `exp(eta) - y*eta + log Gamma(y+1)`, keeping the `log(target!)` term since
/// it's the same normalizing constant [`poisson_nll_identity`] keeps. Unlike
/// the identity link, `eta` may be any finite real number — the exponential
/// keeps the implied rate positive regardless of sign.
pub fn poisson_nll(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    let mut nll = 0.0;
    for (&eta, &y) in predicted.iter().zip(target) {
        nll += eta.exp() - y * eta + ln_gamma(y + 1.0);
    }
    Ok(nll)
}

/// Lanczos approximation to `ln(Gamma(x))` (g=7, n=9), accurate to about 15
/// significant digits for `x > 0`. No dependency in the workspace exposes a
/// gamma function, and both Poisson likelihoods need
/// `log(target!) = ln_gamma(target + 1)`.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula, for completeness; targets are non-negative
        // counts in practice so this branch is rarely hit.
        let pi = std::f64::consts::PI;
        (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut a = COEFFICIENTS[0];
        let t = x + G + 0.5;
        for (i, c) in COEFFICIENTS.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
    }
}

/// Negative log-likelihood under a Poisson model with the identity link:
/// `predicted` is read directly as the rate `mu`, which must stay strictly
/// positive (§4.F): `mu - y*log(mu) + log Gamma(y+1)`. Unlike [`poisson_nll`]'s
/// log link, nothing here keeps the rate positive on its own, so a tree
/// producing a non-positive prediction is rejected rather than silently
/// scored.
pub fn poisson_nll_identity(predicted: &[f64], target: &[f64]) -> SymregResult<f64> {
    check_lengths(predicted, target)?;
    let mut nll = 0.0;
    for (&mu, &y) in predicted.iter().zip(target) {
        if mu <= 0.0 {
            return Err(SymregError::invalid_argument(
                "predicted rate must be strictly positive under a Poisson model",
            ));
        }
        nll += mu - y * mu.ln() + ln_gamma(y + 1.0);
    }
    Ok(nll)
}

/// Diagonal-free Fisher information matrix for a Gaussian likelihood with the
/// tree's jacobian `j` (rows x cols, row-major) and noise variance
/// `sigma_squared`: `F = J^T J / sigma_squared` (§4.F). Used by the optimizer
/// to report asymptotic coefficient uncertainty once it converges.
pub fn fisher_information(
    jacobian: &[f64],
    rows: usize,
    cols: usize,
    sigma_squared: f64,
) -> SymregResult<Vec<f64>> {
    if jacobian.len() != rows * cols {
        return Err(SymregError::invalid_argument(format!(
            "jacobian has {} entries, expected {rows} x {cols}",
            jacobian.len()
        )));
    }
    if sigma_squared <= 0.0 {
        return Err(SymregError::invalid_argument("sigma_squared must be positive"));
    }

    let mut fisher = vec![0.0; cols * cols];
    for a in 0..cols {
        for b in 0..cols {
            let mut acc = 0.0;
            for r in 0..rows {
                acc += jacobian[r * cols + a] * jacobian[r * cols + b];
            }
            fisher[a * cols + b] = acc / sigma_squared;
        }
    }
    Ok(fisher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_fit_gives_zero_error_and_unit_r_squared() {
        let p = vec![1.0, 2.0, 3.0, 4.0];
        let t = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(sse(&p, &t).unwrap(), 0.0);
        assert_eq!(r_squared(&p, &t).unwrap(), 1.0);
        assert!((c_squared(&p, &t).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn nmse_is_scale_invariant() {
        let t = vec![0.0, 2.0, 4.0, 6.0];
        let p_a = vec![1.0, 1.0, 5.0, 5.0];
        let p_b: Vec<f64> = p_a.iter().map(|v| v * 10.0).collect();
        let t_b: Vec<f64> = t.iter().map(|v| v * 10.0).collect();
        let a = nmse(&p_a, &t).unwrap();
        let b = nmse(&p_b, &t_b).unwrap();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn zero_variance_target_rejects_r_squared_and_nmse() {
        let p = vec![1.0, 2.0];
        let t = vec![5.0, 5.0];
        assert!(r_squared(&p, &t).is_err());
        assert!(nmse(&p, &t).is_err());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(sse(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn gaussian_nll_decreases_as_residual_shrinks() {
        let t = vec![1.0, 2.0, 3.0];
        let far = vec![10.0, 20.0, 30.0];
        let close = vec![1.1, 2.1, 2.9];
        assert!(gaussian_nll(&close, &t, 1.0).unwrap() < gaussian_nll(&far, &t, 1.0).unwrap());
    }

    #[test]
    fn poisson_nll_identity_rejects_nonpositive_rate() {
        assert!(poisson_nll_identity(&[0.0], &[1.0]).is_err());
    }

    #[test]
    fn poisson_nll_log_link_accepts_nonpositive_linear_predictor() {
        // eta == 0.0 implies a rate of exp(0.0) == 1.0, which is valid.
        assert!(poisson_nll(&[0.0], &[1.0]).is_ok());
    }

    #[test]
    fn fisher_information_is_symmetric() {
        // 3 rows, 2 coefficient columns.
        let j = vec![1.0, 0.5, 2.0, 1.0, 0.0, 3.0];
        let f = fisher_information(&j, 3, 2, 1.0).unwrap();
        assert!((f[1] - f[2]).abs() < 1e-12);
    }

    #[test]
    fn weighted_metrics_agree_with_unweighted_under_uniform_weights() {
        let p = vec![1.0, 2.5, 3.0, 8.0];
        let t = vec![1.1, 2.0, 3.4, 7.0];
        let ones = vec![1.0; p.len()];

        for metric in [
            ErrorMetric::Sse,
            ErrorMetric::Mse,
            ErrorMetric::Rmse,
            ErrorMetric::Nmse,
            ErrorMetric::Mae,
            ErrorMetric::RSquared,
            ErrorMetric::CSquared,
        ] {
            let unweighted = metric.score(&p, &t).unwrap();
            let weighted = metric.score_weighted(&p, &t, &ones).unwrap();
            assert!((unweighted - weighted).abs() < 1e-9, "{metric:?} disagreed under uniform weights");
        }
    }

    #[test]
    fn poisson_log_link_agrees_with_identity_link_at_the_matching_rate() {
        // eta = ln(mu) is the linear predictor that implies the same rate mu
        // the identity link reads directly, so the two should agree exactly.
        let mu = vec![2.0, 3.0];
        let eta: Vec<f64> = mu.iter().map(|m| m.ln()).collect();
        let t = vec![1.0, 4.0];
        let log_link = poisson_nll(&eta, &t).unwrap();
        let identity_link = poisson_nll_identity(&mu, &t).unwrap();
        assert!((identity_link - log_link).abs() < 1e-9);
    }

    #[test]
    fn error_metric_dispatches_to_the_right_scorer() {
        let p = vec![1.0, 2.0];
        let t = vec![1.0, 2.0];
        assert_eq!(ErrorMetric::Sse.score(&p, &t).unwrap(), 0.0);
        assert!(ErrorMetric::RSquared.lower_is_better() == false);
        assert!(ErrorMetric::Mse.lower_is_better());
    }
}
