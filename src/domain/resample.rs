//! Resampling of raw observations to a coarser frequency.
//!
//! Each period keeps its last non-missing observation, dated at the last
//! trading date seen in that period.

use crate::domain::series::RawPoint;
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frequency {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl Frequency {
    fn period_key(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            Frequency::Daily => (date.year(), date.ordinal()),
            Frequency::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Frequency::Monthly => (date.year(), date.month()),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "d" => Ok(Frequency::Daily),
            "weekly" | "w" => Ok(Frequency::Weekly),
            "monthly" | "m" => Ok(Frequency::Monthly),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

/// Input must be sorted by date.
pub fn resample(points: &[RawPoint], frequency: Frequency) -> Vec<RawPoint> {
    if frequency == Frequency::Daily {
        return points.to_vec();
    }

    let mut out: Vec<RawPoint> = Vec::new();
    let mut current_key: Option<(i32, u32)> = None;

    for point in points {
        let key = frequency.period_key(point.date);
        if current_key == Some(key) {
            if let Some(last) = out.last_mut() {
                last.date = point.date;
                if point.value.is_some() {
                    last.value = point.value;
                }
            }
        } else {
            out.push(*point);
            current_key = Some(key);
        }
    }

    out
}
