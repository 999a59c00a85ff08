//! Price source port trait.

use crate::domain::error::ArimaTraderError;
use crate::domain::series::RawPoint;
use chrono::NaiveDate;

/// Supplies ordered (date, adjusted close) observations for a symbol.
/// Gaps are returned as `RawPoint { value: None, .. }`; bounds are inclusive.
pub trait DataPort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<RawPoint>, ArimaTraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, ArimaTraderError>;
}
