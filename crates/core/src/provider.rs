use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Period, PriceBar, QuoteInfo};

/// Upstream source of market data.
///
/// Implementations report every failure (unknown symbol, network, rate limiting)
/// as a plain [`anyhow::Error`]; callers do not distinguish between them.
#[async_trait]
pub trait StockDataProvider: Send + Sync {
    /// Descriptive info for `symbol` (price, volume, valuation figures).
    async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo>;

    /// Daily bars for `symbol` over `period`, oldest first.
    async fn history(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>>;
}
