//! Price series, model order, and missing-value sanitization.
//!
//! A [`PriceSeries`] is immutable once built: appending a point produces a new
//! series, which keeps every rolling-forecast window a snapshot.

use crate::domain::error::ArimaTraderError;
use chrono::NaiveDate;
use std::fmt;

/// A single observed (timestamp, value) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// A raw observation as delivered by a price source; `value` is `None` for gaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// (p, d, q) order of an ARIMA model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ModelOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Number of AR plus MA coefficients.
    pub fn arma_params(&self) -> usize {
        self.p + self.q
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Ordered adjusted-close prices with strictly increasing, unique dates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    points: Vec<TimePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<TimePoint>) -> Result<Self, ArimaTraderError> {
        check_increasing(points.iter().map(|p| p.date))?;
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(ArimaTraderError::InvalidSeries {
                reason: format!("non-finite value at {}", bad.date),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    /// Returns a new series with `point` appended. Fails if `point` does not
    /// come strictly after the current last date.
    pub fn appended(&self, point: TimePoint) -> Result<Self, ArimaTraderError> {
        if let Some(last) = self.last_date() {
            if point.date <= last {
                return Err(ArimaTraderError::InvalidSeries {
                    reason: format!("cannot append {} after {}", point.date, last),
                });
            }
        }
        let mut points = Vec::with_capacity(self.points.len() + 1);
        points.extend_from_slice(&self.points);
        points.push(point);
        Ok(Self { points })
    }

    /// Splits into (train, test) with `floor(len * fraction)` training points.
    pub fn split_at_fraction(&self, fraction: f64) -> Result<(Self, Self), ArimaTraderError> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ArimaTraderError::ConfigInvalid {
                section: "model".into(),
                key: "train_fraction".into(),
                reason: format!("{} is outside (0, 1)", fraction),
            });
        }
        let cut = (self.points.len() as f64 * fraction).floor() as usize;
        if cut == 0 || cut >= self.points.len() {
            return Err(ArimaTraderError::InsufficientData {
                context: format!("train/test split at fraction {}", fraction),
                have: self.points.len(),
                need: 2,
            });
        }
        Ok((
            Self {
                points: self.points[..cut].to_vec(),
            },
            Self {
                points: self.points[cut..].to_vec(),
            },
        ))
    }
}

fn check_increasing(dates: impl Iterator<Item = NaiveDate>) -> Result<(), ArimaTraderError> {
    let mut prev: Option<NaiveDate> = None;
    for date in dates {
        if let Some(p) = prev {
            if date <= p {
                return Err(ArimaTraderError::InvalidSeries {
                    reason: format!("date {} does not follow {}", date, p),
                });
            }
        }
        prev = Some(date);
    }
    Ok(())
}

/// Outcome of [`sanitize`]: the complete series plus how many gaps were filled.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub series: PriceSeries,
    pub filled: usize,
}

/// Forward-fills gaps in a raw series. A missing leading value cannot be filled.
pub fn sanitize(raw: &[RawPoint]) -> Result<Sanitized, ArimaTraderError> {
    check_increasing(raw.iter().map(|p| p.date))?;

    let first = raw.first().ok_or_else(|| ArimaTraderError::InsufficientData {
        context: "sanitizing an empty series".into(),
        have: 0,
        need: 1,
    })?;
    let mut last = match first.value.filter(|v| v.is_finite()) {
        Some(v) => v,
        None => {
            return Err(ArimaTraderError::InsufficientData {
                context: format!("forward-filling leading gap at {}", first.date),
                have: 0,
                need: 1,
            });
        }
    };

    let mut filled = 0usize;
    let mut points = Vec::with_capacity(raw.len());
    for point in raw {
        let value = match point.value.filter(|v| v.is_finite()) {
            Some(v) => {
                last = v;
                v
            }
            None => {
                filled += 1;
                last
            }
        };
        points.push(TimePoint::new(point.date, value));
    }

    if filled > 0 {
        tracing::debug!(filled, total = raw.len(), "forward-filled missing prices");
    }

    Ok(Sanitized {
        series: PriceSeries { points },
        filled,
    })
}
