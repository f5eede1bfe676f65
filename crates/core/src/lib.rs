pub mod config;
pub mod provider;
pub mod types;

pub use config::AppConfig;
pub use provider::StockDataProvider;
pub use types::{HistoryPoint, Period, PriceBar, QuoteInfo, QuoteSnapshot};
