use std::sync::Arc;

use anyhow::{Context, Result};
use finance_core::AppConfig;
use finance_mcp::FinanceServer;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, EnvFilter};
use yahoo::YahooRestClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_from_env()?;
    init_tracing(&config)?;

    let client = YahooRestClient::from_config(&config)?;
    info!(default_symbol = %config.default_symbol, "starting finance MCP server on stdio");

    FinanceServer::new(Arc::new(client), config.default_symbol)
        .serve_stdio()
        .await
}

// stdout carries the protocol, so logs go to stderr and a rolling file
fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("finance-mcp-server")
        .build(&config.log_dir)
        .with_context(|| format!("failed to create log directory {}", config.log_dir.display()))?;

    let writer = std::io::stderr
        .with_max_level(tracing::Level::DEBUG)
        .and(file_appender);

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
