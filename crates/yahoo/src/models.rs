//! Yahoo Finance response payloads and their mapping onto the provider records.
//!
//! Both `quoteSummary` and `chart` wrap their payload in the same
//! `{ result: [...], error: {...} }` envelope.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use finance_core::{PriceBar, QuoteInfo};
use serde::Deserialize;
use serde_json::Number;

use crate::error::YahooError;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub result: Option<Vec<T>>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl<T> ApiEnvelope<T> {
    /// Return the first result, or the API error the envelope carries.
    pub fn into_first(self, endpoint: &str) -> Result<T, YahooError> {
        if let Some(error) = self.error {
            return Err(YahooError::Api {
                code: error.code,
                description: error.description,
            });
        }

        self.result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| YahooError::EmptyResponse(endpoint.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResponse {
    pub quote_summary: ApiEnvelope<QuoteSummaryResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ApiEnvelope<ChartResult>,
}

/// Yahoo reports figures as `{"raw": 123.4, "fmt": "123.40"}`, or `{}` when unavailable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawValue {
    #[serde(default)]
    pub raw: Option<Number>,
}

fn raw(value: Option<RawValue>) -> Option<Number> {
    value.and_then(|value| value.raw)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResult {
    pub financial_data: Option<FinancialData>,
    pub summary_detail: Option<SummaryDetail>,
    pub default_key_statistics: Option<KeyStatistics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    pub current_price: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDetail {
    pub volume: Option<RawValue>,
    pub market_cap: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<RawValue>,
    pub dividend_yield: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyStatistics {
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<RawValue>,
}

impl QuoteSummaryResult {
    pub fn into_quote_info(self) -> QuoteInfo {
        let financial = self.financial_data.unwrap_or_default();
        let detail = self.summary_detail.unwrap_or_default();
        let statistics = self.default_key_statistics.unwrap_or_default();

        QuoteInfo {
            current_price: raw(financial.current_price),
            volume: raw(detail.volume),
            market_cap: raw(detail.market_cap),
            forward_pe: raw(detail.forward_pe).or_else(|| raw(statistics.forward_pe)),
            dividend_yield: raw(detail.dividend_yield),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default)]
    pub indicators: ChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    /// IANA zone of the exchange, e.g. `America/New_York`.
    pub exchange_timezone_name: Option<String>,
    /// Exchange offset from UTC in seconds at query time.
    #[serde(default)]
    pub gmtoffset: i64,
}

/// Zone used to turn bar timestamps into exchange-local dates.
#[derive(Debug, Clone, Copy)]
enum ExchangeZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl ExchangeZone {
    /// Prefer the named zone so each bar gets the offset in force on its own date;
    /// `gmtoffset` only describes the moment of the query.
    fn from_meta(meta: &ChartMeta) -> Result<Self, YahooError> {
        if let Some(tz) = meta
            .exchange_timezone_name
            .as_deref()
            .and_then(|name| name.parse::<Tz>().ok())
        {
            return Ok(ExchangeZone::Named(tz));
        }

        i32::try_from(meta.gmtoffset)
            .ok()
            .and_then(FixedOffset::east_opt)
            .map(ExchangeZone::Fixed)
            .ok_or_else(|| YahooError::InvalidPayload(format!("invalid gmtoffset {}", meta.gmtoffset)))
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            ExchangeZone::Named(tz) => instant.with_timezone(tz).date_naive(),
            ExchangeZone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartIndicators {
    #[serde(default)]
    pub quote: Vec<ChartQuote>,
    #[serde(default)]
    pub adjclose: Vec<ChartAdjClose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartAdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

impl ChartResult {
    /// Convert the column-oriented chart payload into daily bars dated in exchange time.
    ///
    /// Rows with a missing price are skipped, a missing volume counts as zero, and prices
    /// are scaled by the adjusted close when Yahoo supplies one.
    pub fn into_price_bars(self) -> Result<Vec<PriceBar>, YahooError> {
        let zone = ExchangeZone::from_meta(&self.meta)?;

        let Some(quote) = self.indicators.quote.into_iter().next() else {
            return Ok(Vec::new());
        };
        let adjclose = self
            .indicators
            .adjclose
            .into_iter()
            .next()
            .map(|series| series.adjclose)
            .unwrap_or_default();

        let mut bars: Vec<PriceBar> = Vec::with_capacity(self.timestamp.len());
        for (index, ts) in self.timestamp.iter().copied().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close)) = (
                value_at(&quote.open, index),
                value_at(&quote.high, index),
                value_at(&quote.low, index),
                value_at(&quote.close, index),
            ) else {
                continue;
            };

            let instant = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                YahooError::InvalidPayload(format!("timestamp {ts} at row {index} out of range"))
            })?;
            let date = zone.local_date(instant);

            let volume = value_at(&quote.volume, index)
                .map(|value| value.max(0.0).round() as u64)
                .unwrap_or(0);

            let (open, high, low, close) = match value_at(&adjclose, index) {
                Some(adjusted) if close != 0.0 => {
                    let ratio = adjusted / close;
                    (open * ratio, high * ratio, low * ratio, adjusted)
                }
                _ => (open, high, low, close),
            };

            let bar = PriceBar {
                date,
                open,
                high,
                low,
                close,
                volume,
            };

            // a live intraday bar can repeat the last session's date
            match bars.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => bars.push(bar),
            }
        }

        Ok(bars)
    }
}
