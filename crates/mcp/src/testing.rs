use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use finance_core::{Period, PriceBar, QuoteInfo, StockDataProvider};

/// Canned provider that records every call it receives.
#[derive(Default)]
pub struct StubProvider {
    info: QuoteInfo,
    bars: Vec<PriceBar>,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn with_info(info: QuoteInfo) -> Self {
        Self {
            info,
            ..Self::default()
        }
    }

    pub fn with_bars(bars: Vec<PriceBar>) -> Self {
        Self {
            bars,
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match &self.failure {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StockDataProvider for StubProvider {
    async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo> {
        self.record(format!("quote_info:{symbol}"))?;
        Ok(self.info.clone())
    }

    async fn history(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>> {
        self.record(format!("history:{symbol}:{period}"))?;
        Ok(self.bars.clone())
    }
}
