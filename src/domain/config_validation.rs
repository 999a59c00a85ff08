//! Configuration validation and typed pipeline settings.
//!
//! Every key is checked before any data is loaded. Absent keys fall back to
//! their defaults; present keys must parse and lie in range.

use crate::domain::error::ArimaTraderError;
use crate::domain::metrics::DEFAULT_ANNUALIZATION_FACTOR;
use crate::domain::order_selection::{Criterion, SearchStrategy};
use crate::domain::resample::Frequency;
use crate::domain::rolling::ConvergencePolicy;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

/// Upper bound on `max_d`; higher integration orders are not meaningful for prices.
pub const MAX_DIFFERENCING: usize = 2;
/// Upper bound on `max_p` and `max_q`.
pub const MAX_ARMA_ORDER: usize = 10;

/// Typed settings for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub frequency: Frequency,
    pub train_fraction: f64,
    pub max_p: usize,
    pub max_q: usize,
    pub max_d: usize,
    pub differencing_significance: f64,
    pub criterion: Criterion,
    pub search: SearchStrategy,
    pub parallel: bool,
    pub convergence_policy: ConvergencePolicy,
    pub annualization_factor: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Weekly,
            train_fraction: 0.8,
            max_p: 5,
            max_q: 5,
            max_d: 1,
            differencing_significance: 0.05,
            criterion: Criterion::Aic,
            search: SearchStrategy::Stepwise,
            parallel: true,
            convergence_policy: ConvergencePolicy::Abort,
            annualization_factor: DEFAULT_ANNUALIZATION_FACTOR,
        }
    }
}

impl PipelineConfig {
    /// Validates `config` and builds the typed settings, with defaults for absent keys.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ArimaTraderError> {
        validate_config(config)?;
        let defaults = Self::default();
        let stepwise = config.get_bool("model", "stepwise", true);

        Ok(Self {
            frequency: parse_key(config, "data", "frequency")?.unwrap_or(defaults.frequency),
            train_fraction: parse_key(config, "model", "train_fraction")?
                .unwrap_or(defaults.train_fraction),
            max_p: parse_key(config, "model", "max_p")?.unwrap_or(defaults.max_p),
            max_q: parse_key(config, "model", "max_q")?.unwrap_or(defaults.max_q),
            max_d: parse_key(config, "model", "max_d")?.unwrap_or(defaults.max_d),
            differencing_significance: parse_key(config, "model", "differencing_significance")?
                .unwrap_or(defaults.differencing_significance),
            criterion: parse_key(config, "model", "criterion")?.unwrap_or(defaults.criterion),
            search: if stepwise {
                SearchStrategy::Stepwise
            } else {
                SearchStrategy::Exhaustive
            },
            parallel: config.get_bool("model", "parallel", defaults.parallel),
            convergence_policy: parse_key(config, "model", "on_convergence_failure")?
                .unwrap_or(defaults.convergence_policy),
            annualization_factor: parse_key(config, "evaluation", "annualization_factor")?
                .unwrap_or(defaults.annualization_factor),
        })
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    validate_data_config(config)?;
    validate_model_config(config)?;
    validate_evaluation_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    validate_frequency(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_model_config(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    validate_train_fraction(config)?;
    validate_seasonal(config)?;
    validate_order_bounds(config)?;
    validate_differencing_significance(config)?;
    validate_criterion(config)?;
    validate_bools(config)?;
    validate_convergence_policy(config)?;
    Ok(())
}

pub fn validate_evaluation_config(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    validate_annualization_factor(config)?;
    Ok(())
}

/// Parses `[section] key` when present. A value that does not parse is
/// `ConfigInvalid`, never silently defaulted.
fn parse_key<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, ArimaTraderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(section, key, format!("cannot parse '{}': {}", raw.trim(), e))),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ArimaTraderError {
    ArimaTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_frequency(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    parse_key::<Frequency>(config, "data", "frequency")?;
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid("data", "start_date", "start_date must be before end_date"));
        }
    }
    Ok(())
}

pub fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, ArimaTraderError> {
    match config.get_string("data", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid("data", key, format!("invalid {} format, expected YYYY-MM-DD", key))),
    }
}

fn validate_train_fraction(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    if let Some(value) = parse_key::<f64>(config, "model", "train_fraction")? {
        if !(value > 0.0 && value < 1.0) {
            return Err(invalid("model", "train_fraction", "train_fraction must be between 0 and 1"));
        }
    }
    Ok(())
}

fn validate_seasonal(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    match config.get_string("model", "seasonal") {
        None => Ok(()),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "false" | "no" | "0" => Ok(()),
            "true" | "yes" | "1" => Err(invalid("model", "seasonal", "seasonal models are not supported")),
            other => Err(invalid("model", "seasonal", format!("'{}' is not a boolean", other))),
        },
    }
}

fn validate_order_bounds(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    for key in ["max_p", "max_q"] {
        if let Some(value) = parse_key::<usize>(config, "model", key)? {
            if value > MAX_ARMA_ORDER {
                return Err(invalid(
                    "model",
                    key,
                    format!("{} must be at most {}", key, MAX_ARMA_ORDER),
                ));
            }
        }
    }
    if let Some(value) = parse_key::<usize>(config, "model", "max_d")? {
        if value > MAX_DIFFERENCING {
            return Err(invalid(
                "model",
                "max_d",
                format!("max_d must be at most {}", MAX_DIFFERENCING),
            ));
        }
    }
    Ok(())
}

fn validate_differencing_significance(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    if let Some(value) = parse_key::<f64>(config, "model", "differencing_significance")? {
        if !(value > 0.0 && value < 1.0) {
            return Err(invalid(
                "model",
                "differencing_significance",
                "differencing_significance must be between 0 and 1",
            ));
        }
    }
    Ok(())
}

fn validate_criterion(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    parse_key::<Criterion>(config, "model", "criterion")?;
    Ok(())
}

fn validate_bools(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    for key in ["stepwise", "parallel"] {
        if let Some(raw) = config.get_string("model", key) {
            let known = matches!(
                raw.trim().to_lowercase().as_str(),
                "true" | "yes" | "1" | "false" | "no" | "0"
            );
            if !known {
                return Err(invalid("model", key, format!("'{}' is not a boolean", raw.trim())));
            }
        }
    }
    Ok(())
}

fn validate_convergence_policy(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    parse_key::<ConvergencePolicy>(config, "model", "on_convergence_failure")?;
    Ok(())
}

fn validate_annualization_factor(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    if let Some(value) = parse_key::<u32>(config, "evaluation", "annualization_factor")? {
        if value == 0 {
            return Err(invalid(
                "evaluation",
                "annualization_factor",
                "annualization_factor must be positive",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(content: &str) -> String {
        match validate_config(&make_config(content)).unwrap_err() {
            ArimaTraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn valid_full_config_passes() {
        let config = make_config(
            r#"
[data]
directory = ./data
symbol = SPY
start_date = 2015-01-01
end_date = 2020-12-31
frequency = weekly

[model]
train_fraction = 0.8
seasonal = false
max_p = 5
max_q = 5
max_d = 1
differencing_significance = 0.05
criterion = bic
stepwise = false
parallel = no
on_convergence_failure = carry_forward

[evaluation]
annualization_factor = 52
"#,
        );
        let parsed = PipelineConfig::from_config(&config).unwrap();
        assert_eq!(parsed.criterion, Criterion::Bic);
        assert_eq!(parsed.search, SearchStrategy::Exhaustive);
        assert!(!parsed.parallel);
        assert_eq!(parsed.convergence_policy, ConvergencePolicy::CarryForward);
        assert_eq!(parsed.annualization_factor, 52);
        assert_eq!(parsed.frequency, Frequency::Weekly);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let parsed = PipelineConfig::from_config(&make_config("[model]\n")).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
        assert!((parsed.train_fraction - 0.8).abs() < f64::EPSILON);
        assert_eq!(parsed.annualization_factor, 252);
        assert_eq!(parsed.max_d, 1);
    }

    #[test]
    fn train_fraction_out_of_range_fails() {
        assert_eq!(invalid_key("[model]\ntrain_fraction = 1.0\n"), "train_fraction");
        assert_eq!(invalid_key("[model]\ntrain_fraction = 0\n"), "train_fraction");
    }

    #[test]
    fn unparseable_number_fails() {
        assert_eq!(invalid_key("[model]\nmax_p = three\n"), "max_p");
        assert_eq!(invalid_key("[model]\nmax_q = -1\n"), "max_q");
    }

    #[test]
    fn seasonal_true_is_rejected() {
        assert_eq!(invalid_key("[model]\nseasonal = true\n"), "seasonal");
    }

    #[test]
    fn max_d_is_bounded() {
        assert_eq!(invalid_key("[model]\nmax_d = 3\n"), "max_d");
        assert!(validate_config(&make_config("[model]\nmax_d = 2\n")).is_ok());
    }

    #[test]
    fn significance_out_of_range_fails() {
        assert_eq!(
            invalid_key("[model]\ndifferencing_significance = 1.5\n"),
            "differencing_significance"
        );
    }

    #[test]
    fn unknown_criterion_fails() {
        assert_eq!(invalid_key("[model]\ncriterion = hqic\n"), "criterion");
    }

    #[test]
    fn unknown_policy_fails() {
        assert_eq!(
            invalid_key("[model]\non_convergence_failure = skip\n"),
            "on_convergence_failure"
        );
    }

    #[test]
    fn non_boolean_stepwise_fails() {
        assert_eq!(invalid_key("[model]\nstepwise = maybe\n"), "stepwise");
    }

    #[test]
    fn zero_annualization_fails() {
        assert_eq!(
            invalid_key("[evaluation]\nannualization_factor = 0\n"),
            "annualization_factor"
        );
    }

    #[test]
    fn unknown_frequency_fails() {
        assert_eq!(invalid_key("[data]\nfrequency = hourly\n"), "frequency");
    }

    #[test]
    fn bad_date_format_fails() {
        assert_eq!(invalid_key("[data]\nstart_date = 2020/01/01\n"), "start_date");
    }

    #[test]
    fn start_after_end_fails() {
        assert_eq!(
            invalid_key("[data]\nstart_date = 2024-12-31\nend_date = 2020-01-01\n"),
            "start_date"
        );
    }
}
