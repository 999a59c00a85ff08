//! ARIMA(p,d,q) fitted by exact maximum likelihood.
//!
//! The window is differenced `d` times, then an ARMA(p,q) model (with a mean
//! term when `d = 0`) is cast in state-space form and its exact Gaussian
//! likelihood is evaluated with a Kalman filter started from the stationary
//! state covariance. The innovation variance is concentrated out. AR and MA
//! coefficients are optimized through a partial-autocorrelation transform so
//! every trial point is stationary and invertible. Forecasts are integrated
//! back to the price scale before they are returned.

use crate::domain::differencing::{difference, integrate, tail_anchors};
use crate::domain::engine::{FitStatistics, FittedModel, ForecastEngine, IntervalForecast};
use crate::domain::error::ArimaTraderError;
use crate::domain::optimize::{nelder_mead, NelderMeadOptions};
use crate::domain::regression::ols;
use crate::domain::series::{ModelOrder, PriceSeries};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use std::fmt;

/// Fits [`ArimaModel`]s. Stateless apart from optimizer settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArimaEngine {
    pub options: NelderMeadOptions,
}

impl ArimaEngine {
    /// Observations a window needs before `order` can be fitted.
    pub fn min_window(order: ModelOrder) -> usize {
        let mean = usize::from(order.d == 0);
        order.d + order.p + order.q + mean + 1
    }
}

/// Result of fitting one order to one window.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ModelOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    mean: f64,
    sigma2: f64,
    log_likelihood: f64,
    observations: usize,
    parameters: usize,
    state: DVector<f64>,
    anchors: Vec<f64>,
}

impl ArimaModel {
    pub fn ar(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma(&self) -> &[f64] {
        &self.ma
    }

    /// Mean of the differenced series; zero when `d > 0`.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn aic(&self) -> f64 {
        self.statistics().aic()
    }

    /// MA(infinity) weights of the integrated model, `psi[0] = 1`.
    fn psi_weights(&self, count: usize) -> Vec<f64> {
        // (1 - sum ar_i B^i) * (1 - B)^d as polynomial coefficients
        let mut poly = vec![1.0];
        poly.extend(self.ar.iter().map(|a| -a));
        for _ in 0..self.order.d {
            let mut next = vec![0.0; poly.len() + 1];
            for (i, c) in poly.iter().enumerate() {
                next[i] += c;
                next[i + 1] -= c;
            }
            poly = next;
        }
        let phi: Vec<f64> = poly[1..].iter().map(|c| -c).collect();

        let mut psi = Vec::with_capacity(count);
        for j in 0..count {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = self.ma.get(j - 1).copied().unwrap_or(0.0);
            for i in 1..=j.min(phi.len()) {
                value += phi[i - 1] * psi[j - i];
            }
            psi.push(value);
        }
        psi
    }
}

impl fmt::Display for ArimaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.order)?;
        for (i, a) in self.ar.iter().enumerate() {
            write!(f, " ar{}={:.4}", i + 1, a)?;
        }
        for (i, m) in self.ma.iter().enumerate() {
            write!(f, " ma{}={:.4}", i + 1, m)?;
        }
        if self.order.d == 0 {
            write!(f, " mean={:.4}", self.mean)?;
        }
        write!(f, " sigma2={:.6} loglik={:.2} aic={:.2}", self.sigma2, self.log_likelihood, self.aic())
    }
}

impl FittedModel for ArimaModel {
    fn order(&self) -> ModelOrder {
        self.order
    }

    fn statistics(&self) -> FitStatistics {
        FitStatistics {
            log_likelihood: self.log_likelihood,
            parameters: self.parameters,
            observations: self.observations,
        }
    }

    fn forecast(&self, horizon: usize) -> Result<Vec<f64>, ArimaTraderError> {
        check_horizon(horizon)?;
        let model = StateSpace::new(&self.ar, &self.ma);
        let mut state = self.state.clone();
        let mut diffs = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            diffs.push(state[0] + self.mean);
            state = &model.transition * state;
        }
        Ok(integrate(&diffs, &self.anchors))
    }

    fn forecast_intervals(
        &self,
        horizon: usize,
        level: f64,
    ) -> Result<Vec<IntervalForecast>, ArimaTraderError> {
        if !(level > 0.0 && level < 1.0) {
            return Err(ArimaTraderError::ConfigInvalid {
                section: "forecast".into(),
                key: "level".into(),
                reason: format!("{} is outside (0, 1)", level),
            });
        }
        let points = self.forecast(horizon)?;
        let normal = Normal::new(0.0, 1.0).map_err(|e| ArimaTraderError::Degenerate {
            context: "prediction interval".into(),
            reason: e.to_string(),
        })?;
        let z = normal.inverse_cdf(0.5 + level / 2.0);

        let psi = self.psi_weights(horizon);
        let mut cumulative = 0.0;
        Ok(points
            .into_iter()
            .zip(psi)
            .map(|(point, weight)| {
                cumulative += weight * weight;
                let half_width = z * (self.sigma2 * cumulative).sqrt();
                IntervalForecast {
                    point,
                    lower: point - half_width,
                    upper: point + half_width,
                }
            })
            .collect())
    }
}

fn check_horizon(horizon: usize) -> Result<(), ArimaTraderError> {
    if horizon == 0 {
        return Err(ArimaTraderError::Degenerate {
            context: "forecast".into(),
            reason: "horizon must be positive".into(),
        });
    }
    Ok(())
}

impl ForecastEngine for ArimaEngine {
    type Model = ArimaModel;

    fn fit(&self, window: &PriceSeries, order: ModelOrder) -> Result<ArimaModel, ArimaTraderError> {
        let values = window.values();
        let window_end = window.last_date();
        let need = Self::min_window(order);
        if values.len() < need {
            return Err(ArimaTraderError::InsufficientData {
                context: format!(
                    "fitting {} on window ending {}",
                    order,
                    window_end.map(|d| d.to_string()).unwrap_or_default()
                ),
                have: values.len(),
                need,
            });
        }

        let convergence = |reason: String| ArimaTraderError::Convergence {
            order,
            window_end,
            window_len: values.len(),
            reason,
        };

        let w = difference(&values, order.d);
        let include_mean = order.d == 0;
        let n = w.len();
        let sample_mean = w.iter().sum::<f64>() / n as f64;
        let centre = if include_mean { sample_mean } else { 0.0 };
        let spread: f64 = w.iter().map(|v| (v - centre).powi(2)).sum();
        let scale: f64 = 1.0 + w.iter().map(|v| v * v).sum::<f64>();
        if spread <= 1e-20 * scale {
            return Err(convergence("differenced series has no variation".into()));
        }

        let (p, q) = (order.p, order.q);
        let mut start = vec![0.0; p + q];
        if let Some(raw) = ar_start(&w, sample_mean, p) {
            start[..p].copy_from_slice(&raw);
        }
        let mut steps = vec![0.1; p + q];
        if include_mean {
            start.push(sample_mean);
            steps.push(0.1 * (spread / n as f64).sqrt());
        }

        let objective = |raw: &[f64]| -> f64 {
            let (ar, ma, mean) = unpack(raw, p, q, include_mean);
            match exact_likelihood(&w, &ar, &ma, mean) {
                Some(fit) => -fit.log_likelihood,
                None => f64::INFINITY,
            }
        };

        let minimum = nelder_mead(objective, &start, &steps, self.options);
        if !minimum.converged {
            return Err(convergence(format!(
                "optimizer stopped after {} iterations without converging",
                minimum.iterations
            )));
        }

        let (ar, ma, mean) = unpack(&minimum.x, p, q, include_mean);
        let fit = exact_likelihood(&w, &ar, &ma, mean)
            .ok_or_else(|| convergence("likelihood not finite at optimum".into()))?;
        if !(fit.sigma2 > 0.0) || !fit.log_likelihood.is_finite() {
            return Err(convergence("degenerate innovation variance".into()));
        }

        tracing::trace!(%order, loglik = fit.log_likelihood, iterations = minimum.iterations, "fitted");

        Ok(ArimaModel {
            order,
            ar,
            ma,
            mean,
            sigma2: fit.sigma2,
            log_likelihood: fit.log_likelihood,
            observations: n,
            parameters: p + q + usize::from(include_mean) + 1,
            state: fit.state,
            anchors: tail_anchors(&values, order.d),
        })
    }
}

fn unpack(raw: &[f64], p: usize, q: usize, include_mean: bool) -> (Vec<f64>, Vec<f64>, f64) {
    let ar = partrans(&raw[..p]);
    let ma = partrans(&raw[p..p + q]).into_iter().map(|c| -c).collect();
    let mean = if include_mean { raw[p + q] } else { 0.0 };
    (ar, ma, mean)
}

/// Least-squares AR(p) start values, mapped into the unconstrained space.
fn ar_start(w: &[f64], mean: f64, p: usize) -> Option<Vec<f64>> {
    if p == 0 || w.len() <= 2 * p + 1 {
        return None;
    }
    let centred: Vec<f64> = w.iter().map(|v| v - mean).collect();
    let rows: Vec<Vec<f64>> = (p..centred.len())
        .map(|t| (1..=p).map(|i| centred[t - i]).collect())
        .collect();
    let fit = ols(&rows, &centred[p..])?;
    inverse_partrans(&fit.coefficients)
}

/// Maps unconstrained values to the coefficients of a stationary AR
/// polynomial via partial autocorrelations `tanh(raw)`.
pub fn partrans(raw: &[f64]) -> Vec<f64> {
    let mut phi: Vec<f64> = raw.iter().map(|r| r.tanh()).collect();
    let mut work = phi.clone();
    for j in 1..phi.len() {
        let a = phi[j];
        for k in 0..j {
            work[k] -= a * phi[j - k - 1];
        }
        phi[..j].copy_from_slice(&work[..j]);
    }
    phi
}

/// Inverse of [`partrans`]; `None` if `phi` is not stationary.
pub fn inverse_partrans(phi: &[f64]) -> Option<Vec<f64>> {
    let mut current = phi.to_vec();
    let mut raw = vec![0.0; phi.len()];
    for j in (0..phi.len()).rev() {
        let a = current[j];
        if !(a.abs() < 1.0) {
            return None;
        }
        raw[j] = a.atanh();
        let denom = 1.0 - a * a;
        let previous: Vec<f64> = (0..j)
            .map(|k| (current[k] + a * current[j - k - 1]) / denom)
            .collect();
        current[..j].copy_from_slice(&previous);
    }
    Some(raw)
}

/// ARMA(p,q) in state-space form with state dimension `max(p, q + 1)`.
struct StateSpace {
    transition: DMatrix<f64>,
    noise: DMatrix<f64>,
}

impl StateSpace {
    fn new(ar: &[f64], ma: &[f64]) -> Self {
        let r = ar.len().max(ma.len() + 1);
        let mut transition = DMatrix::<f64>::zeros(r, r);
        for (i, a) in ar.iter().enumerate() {
            transition[(i, 0)] = *a;
        }
        for i in 0..r - 1 {
            transition[(i, i + 1)] = 1.0;
        }
        let mut loading = DVector::<f64>::zeros(r);
        loading[0] = 1.0;
        for (i, m) in ma.iter().enumerate() {
            loading[i + 1] = *m;
        }
        let noise = &loading * loading.transpose();
        Self { transition, noise }
    }

    /// Solves `P = T P T' + R R'` for the stationary state covariance.
    fn stationary_covariance(&self) -> Option<DMatrix<f64>> {
        let r = self.transition.nrows();
        let system = DMatrix::<f64>::identity(r * r, r * r) - self.transition.kronecker(&self.transition);
        let rhs = DVector::from_column_slice(self.noise.as_slice());
        let solution = system.lu().solve(&rhs)?;
        let p = DMatrix::from_column_slice(r, r, solution.as_slice());
        Some((&p + p.transpose()) * 0.5)
    }
}

struct LikelihoodFit {
    log_likelihood: f64,
    sigma2: f64,
    /// One-step-ahead predicted state after the last observation.
    state: DVector<f64>,
}

/// Exact concentrated Gaussian log-likelihood of `w - mean` under ARMA(ar, ma).
fn exact_likelihood(w: &[f64], ar: &[f64], ma: &[f64], mean: f64) -> Option<LikelihoodFit> {
    let model = StateSpace::new(ar, ma);
    let r = model.transition.nrows();
    let mut state = DVector::<f64>::zeros(r);
    let mut cov = model.stationary_covariance()?;
    let transition_t = model.transition.transpose();

    let mut sum_sq = 0.0;
    let mut sum_log = 0.0;
    for &obs in w {
        let f = cov[(0, 0)];
        if !(f > 0.0) || !f.is_finite() {
            return None;
        }
        let v = obs - mean - state[0];
        sum_sq += v * v / f;
        sum_log += f.ln();

        let gain = cov.column(0) / f;
        let updated_state = &state + &gain * v;
        let updated_cov = &cov - &gain * cov.row(0);

        state = &model.transition * updated_state;
        cov = &model.transition * updated_cov * &transition_t + &model.noise;
    }

    let n = w.len() as f64;
    let sigma2 = sum_sq / n;
    if !(sigma2 > 0.0) || !sigma2.is_finite() {
        return None;
    }
    let log_likelihood = -0.5 * (n * ((2.0 * PI * sigma2).ln() + 1.0) + sum_log);
    log_likelihood.is_finite().then_some(LikelihoodFit {
        log_likelihood,
        sigma2,
        state,
    })
}
