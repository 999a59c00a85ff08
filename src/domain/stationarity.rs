//! Augmented Dickey-Fuller unit-root test and the differencing decision.
//!
//! The test regresses `Δy_t` on a constant, a linear trend, the lagged level
//! `y_{t-1}` and `k - 1` lagged differences. The t-statistic of the level
//! coefficient is mapped to a p-value by interpolating the Dickey-Fuller
//! critical-value table (constant + trend case); p-values are clamped to
//! [0.01, 0.99]. Null hypothesis: the series has a unit root.

use crate::domain::differencing::difference;
use crate::domain::error::ArimaTraderError;
use crate::domain::regression::ols;

const TABLE_SIZES: [f64; 6] = [25.0, 50.0, 100.0, 250.0, 500.0, 100_000.0];
const TABLE_PROBS: [f64; 8] = [0.01, 0.025, 0.05, 0.10, 0.90, 0.95, 0.975, 0.99];
const TABLE: [[f64; 6]; 8] = [
    [-4.38, -4.15, -4.04, -3.99, -3.98, -3.96],
    [-3.95, -3.80, -3.73, -3.69, -3.68, -3.66],
    [-3.60, -3.50, -3.45, -3.43, -3.42, -3.41],
    [-3.24, -3.18, -3.15, -3.13, -3.13, -3.12],
    [-1.14, -1.19, -1.22, -1.23, -1.24, -1.25],
    [-0.80, -0.87, -0.90, -0.92, -0.93, -0.94],
    [-0.50, -0.58, -0.62, -0.64, -0.65, -0.66],
    [-0.15, -0.24, -0.28, -0.31, -0.32, -0.33],
];

#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Number of lagged differences in the regression.
    pub lags: usize,
    pub observations: usize,
}

/// Default lag order `trunc((n - 1)^(1/3))`.
pub fn default_lags(n: usize) -> usize {
    (n.saturating_sub(1) as f64).powf(1.0 / 3.0).trunc() as usize
}

/// Smallest series length the test accepts for `lags` lagged differences.
pub fn min_observations(lags: usize) -> usize {
    // rows (n - 1 - lags) must exceed regressors (lags + 3)
    2 * lags + 5
}

pub fn adf_test(values: &[f64], lags: Option<usize>) -> Result<AdfResult, ArimaTraderError> {
    let n = values.len();
    let lags = lags.unwrap_or_else(|| default_lags(n));
    let need = min_observations(lags);
    if n < need {
        return Err(ArimaTraderError::InsufficientData {
            context: format!("unit-root test with {} lags", lags),
            have: n,
            need,
        });
    }

    let dy = difference(values, 1);
    let k = lags + 1;
    let mut rows = Vec::with_capacity(dy.len() + 1 - k);
    let mut y = Vec::with_capacity(dy.len() + 1 - k);
    for t in (k - 1)..dy.len() {
        let mut row = Vec::with_capacity(lags + 3);
        row.push(1.0);
        row.push(values[t]);
        row.push((t + 1) as f64);
        for j in 1..=lags {
            row.push(dy[t - j]);
        }
        rows.push(row);
        y.push(dy[t]);
    }

    let fit = ols(&rows, &y).ok_or_else(|| ArimaTraderError::Degenerate {
        context: "unit-root regression".into(),
        reason: "singular design or zero residual variance".into(),
    })?;

    let statistic = fit.t_stat(1);
    let p_value = p_value(statistic, dy.len());

    Ok(AdfResult {
        statistic,
        p_value,
        lags,
        observations: n,
    })
}

fn p_value(statistic: f64, n: usize) -> f64 {
    let critical: Vec<f64> = TABLE
        .iter()
        .map(|row| interpolate(&TABLE_SIZES, row, n as f64))
        .collect();
    interpolate(&critical, &TABLE_PROBS, statistic)
}

/// Linear interpolation over ascending `xs`, clamped at both ends.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    if x <= xs[0] {
        return ys[0];
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return ys[last];
    }
    let i = xs.windows(2).position(|w| x >= w[0] && x <= w[1]).unwrap_or(last - 1);
    let (x0, x1, y0, y1) = (xs[i], xs[i + 1], ys[i], ys[i + 1]);
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Outcome of the differencing search.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferencingDecision {
    pub d: usize,
    /// One test per degree tried, starting at `d = 0`.
    pub tests: Vec<AdfResult>,
    /// False when `max_d` was reached without rejecting the unit root.
    pub stationary: bool,
}

/// Runs the unit-root test and decides the differencing degree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationarityTester {
    pub significance: f64,
    pub max_d: usize,
}

impl Default for StationarityTester {
    fn default() -> Self {
        Self {
            significance: 0.05,
            max_d: 1,
        }
    }
}

impl StationarityTester {
    pub fn new(significance: f64, max_d: usize) -> Self {
        Self { significance, max_d }
    }

    /// p-value of the unit-root test on `values`.
    pub fn test(&self, values: &[f64]) -> Result<f64, ArimaTraderError> {
        adf_test(values, None).map(|r| r.p_value)
    }

    pub fn is_stationary(&self, p_value: f64) -> bool {
        p_value < self.significance
    }

    /// Tests `d = 0, 1, ..` up to `max_d` and returns the first degree whose
    /// differenced series rejects the unit root. When none does, `max_d` is
    /// returned with `stationary = false`.
    pub fn choose_differencing(
        &self,
        values: &[f64],
    ) -> Result<DifferencingDecision, ArimaTraderError> {
        let mut tests = Vec::with_capacity(self.max_d + 1);
        for d in 0..=self.max_d {
            let result = adf_test(&difference(values, d), None)?;
            let stationary = self.is_stationary(result.p_value);
            tracing::debug!(
                d,
                statistic = result.statistic,
                p_value = result.p_value,
                stationary,
                "unit-root test"
            );
            tests.push(result);
            if stationary {
                return Ok(DifferencingDecision {
                    d,
                    tests,
                    stationary: true,
                });
            }
        }
        tracing::warn!(
            max_d = self.max_d,
            "series still has a unit root at the maximum differencing degree"
        );
        Ok(DifferencingDecision {
            d: self.max_d,
            tests,
            stationary: false,
        })
    }
}
