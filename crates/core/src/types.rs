use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Lookback window accepted by the historical data endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[default]
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 11] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
        Period::TenYears,
        Period::YearToDate,
        Period::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .iter()
            .copied()
            .find(|period| period.as_str() == value)
            .ok_or_else(|| anyhow!("unsupported period: {value}"))
    }
}

/// Descriptive info mapping returned by the data provider for a symbol.
///
/// Numbers are kept as [`Number`] so integer values stay integers when re-serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInfo {
    pub current_price: Option<Number>,
    pub volume: Option<Number>,
    pub market_cap: Option<Number>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<Number>,
    pub dividend_yield: Option<Number>,
}

/// One daily OHLCV bar as returned by the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub price: Option<Number>,
    pub volume: Option<Number>,
    pub market_cap: Option<Number>,
    pub pe_ratio: Option<Number>,
    pub dividend_yield: Option<Number>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl From<PriceBar> for HistoryPoint {
    fn from(bar: PriceBar) -> Self {
        Self {
            date: bar.date.format("%Y-%m-%d").to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}
