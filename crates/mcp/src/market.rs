use anyhow::Result;
use chrono::Utc;
use finance_core::{HistoryPoint, Period, QuoteSnapshot, StockDataProvider};
use tracing::debug;

/// Current quote for `symbol`, stamped with the retrieval time.
pub async fn fetch_stock_info(
    provider: &dyn StockDataProvider,
    symbol: &str,
) -> Result<QuoteSnapshot> {
    let info = provider.quote_info(symbol).await?;

    Ok(QuoteSnapshot {
        symbol: symbol.to_string(),
        price: info.current_price,
        volume: info.volume,
        market_cap: info.market_cap,
        pe_ratio: info.forward_pe,
        dividend_yield: info.dividend_yield,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Daily OHLCV points for `symbol` over `period`, in the order the provider returned them.
pub async fn fetch_historical_data(
    provider: &dyn StockDataProvider,
    symbol: &str,
    period: Period,
) -> Result<Vec<HistoryPoint>> {
    let bars = provider.history(symbol, period).await?;
    debug!(symbol, %period, bars = bars.len(), "fetched history");
    Ok(bars.into_iter().map(HistoryPoint::from).collect())
}
