use anyhow::Result;
use clap::{Parser, Subcommand};
use finance_core::{AppConfig, Period, StockDataProvider};
use tracing_subscriber::EnvFilter;
use yahoo::YahooRestClient;

#[derive(Parser, Debug)]
#[command(name = "yahoo-cli", about = "Standalone Yahoo Finance connectivity check", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print price, volume and valuation figures for a symbol
    Quote {
        /// Ticker symbol, e.g. AAPL
        #[arg(long, short = 's')]
        symbol: String,
    },
    /// Print daily bars for a symbol
    History {
        /// Ticker symbol, e.g. AAPL
        #[arg(long, short = 's')]
        symbol: String,
        /// Lookback window: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max
        #[arg(long, short = 'p', default_value = "1mo")]
        period: Period,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load_from_env()?;
    let client = YahooRestClient::from_config(&config)?;

    match cli.command {
        Command::Quote { symbol } => {
            let info = client.quote_info(&symbol).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::History { symbol, period } => {
            let bars = client.history(&symbol, period).await?;
            eprintln!("Retrieved {} bars", bars.len());
            println!("{}", serde_json::to_string_pretty(&bars)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    );
}
