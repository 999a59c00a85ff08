//! Model-fitting seam used by order selection and the rolling forecaster.

use crate::domain::error::ArimaTraderError;
use crate::domain::series::{ModelOrder, PriceSeries};

/// Goodness-of-fit figures an information criterion is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitStatistics {
    pub log_likelihood: f64,
    /// Estimated parameters, innovation variance included.
    pub parameters: usize,
    pub observations: usize,
}

impl FitStatistics {
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood + 2.0 * self.parameters as f64
    }

    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood + self.parameters as f64 * (self.observations as f64).ln()
    }
}

/// Point forecast with a symmetric prediction interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalForecast {
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A model fitted to one window. Created per window and dropped after use.
pub trait FittedModel {
    fn order(&self) -> ModelOrder;

    fn statistics(&self) -> FitStatistics;

    /// Point forecasts for the next `horizon` periods, on the price scale.
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>, ArimaTraderError>;

    /// Forecasts with prediction intervals at confidence `level` in (0, 1).
    fn forecast_intervals(
        &self,
        horizon: usize,
        level: f64,
    ) -> Result<Vec<IntervalForecast>, ArimaTraderError>;
}

/// Fits models of a fixed order to a price window.
pub trait ForecastEngine {
    type Model: FittedModel;

    fn fit(&self, window: &PriceSeries, order: ModelOrder) -> Result<Self::Model, ArimaTraderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn criteria_from_statistics() {
        let stats = FitStatistics {
            log_likelihood: -100.0,
            parameters: 3,
            observations: 100,
        };
        assert_relative_eq!(stats.aic(), 206.0);
        assert_relative_eq!(stats.bic(), 200.0 + 3.0 * 100f64.ln());
    }
}
