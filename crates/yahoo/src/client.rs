use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use finance_core::config::{AppConfig, ProxyConfig, YahooConfig};
use finance_core::{Period, PriceBar, QuoteInfo, StockDataProvider};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

use crate::error::YahooError;
use crate::models::{ChartResponse, QuoteSummaryResponse, QuoteSummaryResult};

const QUOTE_SUMMARY_MODULES: &str = "financialData,summaryDetail,defaultKeyStatistics";
const DAILY_INTERVAL: &str = "1d";

/// Cookie and crumb pair required by the `quoteSummary` endpoint.
#[derive(Debug, Clone)]
struct YahooSession {
    cookie: String,
    crumb: String,
}

#[derive(Debug, Clone)]
pub struct YahooRestClient {
    http: Client,
    base_url: String,
    cookie_url: String,
    session: Arc<RwLock<Option<YahooSession>>>,
}

impl YahooRestClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let YahooConfig {
            base_url,
            cookie_url,
            user_agent,
            proxy,
        } = &config.yahoo;

        Self::new_with_proxy(base_url.clone(), cookie_url.clone(), user_agent, proxy)
    }

    pub fn new(base_url: impl Into<String>, cookie_url: impl Into<String>) -> Result<Self> {
        Self::new_with_proxy(
            base_url,
            cookie_url,
            &YahooConfig::default().user_agent,
            &ProxyConfig::default(),
        )
    }

    pub fn new_with_proxy(
        base_url: impl Into<String>,
        cookie_url: impl Into<String>,
        user_agent: &str,
        proxy: &ProxyConfig,
    ) -> Result<Self> {
        let mut builder = Client::builder().user_agent(user_agent);

        if let Some(ref http_proxy) = proxy.http {
            tracing::info!("configuring HTTP proxy {}", http_proxy);
            let http = reqwest::Proxy::http(http_proxy)?;
            builder = builder.proxy(http);
        }

        if let Some(ref https_proxy) = proxy.https {
            tracing::info!("configuring HTTPS proxy {}", https_proxy);
            let https = reqwest::Proxy::https(https_proxy)?;
            builder = builder.proxy(https);
        }

        let http = builder.build().map_err(YahooError::from)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            cookie_url: cookie_url.into(),
            session: Arc::new(RwLock::new(None)),
        })
    }

    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn get_quote_summary(&self, symbol: &str) -> Result<QuoteSummaryResult> {
        let session = self.ensure_session().await?;
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url,
            encode(symbol)
        );

        tracing::info!("Yahoo GET quoteSummary {}", symbol);
        let builder = self
            .http
            .get(url)
            .query(&[
                ("modules", QUOTE_SUMMARY_MODULES),
                ("crumb", session.crumb.as_str()),
            ])
            .header(COOKIE, session.cookie.as_str());

        let response: QuoteSummaryResponse = match self.execute(builder).await {
            Err(YahooError::Unauthorized) => {
                self.clear_session().await;
                return Err(YahooError::Unauthorized.into());
            }
            other => other?,
        };

        Ok(response.quote_summary.into_first("quoteSummary")?)
    }

    #[instrument(skip(self), fields(symbol = %symbol, period = %period))]
    pub async fn get_daily_chart(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, encode(symbol));

        tracing::info!("Yahoo GET chart {} range={}", symbol, period);
        let builder = self.http.get(url).query(&[
            ("range", period.as_str()),
            ("interval", DAILY_INTERVAL),
            ("events", "div,splits"),
        ]);

        let response: ChartResponse = self.execute(builder).await?;
        let bars = response.chart.into_first("chart")?.into_price_bars()?;
        debug!(bars = bars.len(), "parsed chart");
        Ok(bars)
    }

    async fn ensure_session(&self) -> Result<YahooSession, YahooError> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        let session = self.fetch_session().await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Obtain a consent cookie, then trade it for a crumb.
    async fn fetch_session(&self) -> Result<YahooSession, YahooError> {
        debug!("requesting Yahoo session cookie from {}", self.cookie_url);
        // fc.yahoo.com answers 404 but still sets the cookie
        let response = self.http.get(&self.cookie_url).send().await?;

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| YahooError::Session("missing Set-Cookie header".into()))?;

        let response = self
            .http
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .header(COOKIE, cookie.as_str())
            .send()
            .await?;

        let status = response.status();
        let crumb = response.text().await?;
        if !status.is_success() || crumb.trim().is_empty() {
            return Err(YahooError::Session(format!(
                "crumb request failed with status {status}"
            )));
        }

        Ok(YahooSession {
            cookie,
            crumb: crumb.trim().to_string(),
        })
    }

    async fn clear_session(&self) {
        warn!("Yahoo rejected the cached crumb, dropping session");
        *self.session.write().await = None;
    }

    async fn execute<T>(&self, builder: RequestBuilder) -> Result<T, YahooError>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(YahooError::Unauthorized);
        }

        match serde_json::from_str::<T>(&body) {
            Ok(payload) => Ok(payload),
            // Yahoo pairs 4xx statuses with an `{ "error": ... }` envelope, which the
            // caller turns into `YahooError::Api`.
            Err(_) if !status.is_success() => Err(YahooError::HttpStatus { status, body }),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl StockDataProvider for YahooRestClient {
    async fn quote_info(&self, symbol: &str) -> Result<QuoteInfo> {
        Ok(self.get_quote_summary(symbol).await?.into_quote_info())
    }

    async fn history(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>> {
        self.get_daily_chart(symbol, period).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Reply = (u16, Vec<(&'static str, String)>, String);

    /// Minimal HTTP/1.1 server that answers each request from `route` and
    /// records the lower-cased request head.
    struct StubServer {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        async fn start<F>(route: F) -> Self
        where
            F: Fn(&str) -> Reply + Send + Sync + 'static,
        {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let route = Arc::new(route);

            let recorded = requests.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        break;
                    };
                    let route = route.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let mut head = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => head.extend_from_slice(&chunk[..n]),
                            }
                        }

                        let head = String::from_utf8_lossy(&head).to_lowercase();
                        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                        recorded.lock().unwrap().push(head);

                        let (status, headers, body) = route(&path);
                        let mut response = format!(
                            "HTTP/1.1 {status} STUB\r\ncontent-length: {}\r\nconnection: close\r\n",
                            body.len()
                        );
                        for (name, value) in headers {
                            response.push_str(&format!("{name}: {value}\r\n"));
                        }
                        response.push_str("\r\n");
                        response.push_str(&body);
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            Self { base_url, requests }
        }

        fn client(&self) -> YahooRestClient {
            YahooRestClient::new(self.base_url.clone(), format!("{}/cookie", self.base_url))
                .unwrap()
        }

        fn hits(&self, prefix: &str) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|head| {
                    head.split_whitespace()
                        .nth(1)
                        .is_some_and(|path| path.starts_with(prefix))
                })
                .cloned()
                .collect()
        }
    }

    fn session_routes(path: &str) -> Option<Reply> {
        if path.starts_with("/cookie") {
            return Some((
                404,
                vec![("set-cookie", "A3=abc; Domain=.yahoo.com; Path=/".to_string())],
                String::new(),
            ));
        }
        if path.starts_with("/v1/test/getcrumb") {
            return Some((200, Vec::new(), "crumb123".to_string()));
        }
        None
    }

    fn quote_summary_body() -> String {
        json!({
            "quoteSummary": {
                "result": [{
                    "financialData": { "currentPrice": { "raw": 300, "fmt": "300.00" } },
                    "summaryDetail": { "volume": { "raw": 1000, "fmt": "1k" } }
                }],
                "error": null
            }
        })
        .to_string()
    }

    fn yahoo_error(err: &anyhow::Error) -> &YahooError {
        err.downcast_ref::<YahooError>().unwrap()
    }

    #[tokio::test]
    async fn quote_summary_sends_cookie_and_crumb_and_reuses_session() {
        let server = StubServer::start(|path| {
            session_routes(path).unwrap_or_else(|| (200, Vec::new(), quote_summary_body()))
        })
        .await;
        let client = server.client();

        let info = client.quote_info("AAPL").await.unwrap();
        assert_eq!(info.current_price, Some(serde_json::Number::from(300)));
        assert_eq!(info.volume, Some(serde_json::Number::from(1000)));
        client.quote_info("AAPL").await.unwrap();

        assert_eq!(server.hits("/cookie").len(), 1);
        assert_eq!(server.hits("/v1/test/getcrumb").len(), 1);
        assert!(server.hits("/v1/test/getcrumb")[0].contains("cookie: a3=abc"));

        let summaries = server.hits("/v10/finance/quotesummary/aapl");
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].contains("crumb=crumb123"));
        assert!(summaries[0].contains("cookie: a3=abc"));
    }

    #[tokio::test]
    async fn unauthorized_drops_session_without_retry() {
        let server = StubServer::start(|path| {
            session_routes(path).unwrap_or_else(|| (401, Vec::new(), "Unauthorized".to_string()))
        })
        .await;
        let client = server.client();

        let err = client.get_quote_summary("AAPL").await.unwrap_err();
        assert!(matches!(yahoo_error(&err), YahooError::Unauthorized));
        assert_eq!(server.hits("/v10/finance/quotesummary").len(), 1);

        client.get_quote_summary("AAPL").await.unwrap_err();
        assert_eq!(server.hits("/cookie").len(), 2);
        assert_eq!(server.hits("/v10/finance/quotesummary").len(), 2);
    }

    #[tokio::test]
    async fn missing_cookie_is_a_session_error() {
        let server = StubServer::start(|_| (404, Vec::new(), String::new())).await;

        let err = server.client().get_quote_summary("AAPL").await.unwrap_err();
        assert!(matches!(yahoo_error(&err), YahooError::Session(_)));
        assert!(server.hits("/v10/finance/quotesummary").is_empty());
    }

    #[tokio::test]
    async fn error_envelope_on_4xx_becomes_api_error() {
        let server = StubServer::start(|_| {
            let body = json!({
                "chart": {
                    "result": null,
                    "error": {
                        "code": "Not Found",
                        "description": "No data found, symbol may be delisted"
                    }
                }
            });
            (404, Vec::new(), body.to_string())
        })
        .await;

        let err = server
            .client()
            .get_daily_chart("ZZZZ", Period::FiveDays)
            .await
            .unwrap_err();
        match yahoo_error(&err) {
            YahooError::Api { code, description } => {
                assert_eq!(code, "Not Found");
                assert_eq!(description, "No data found, symbol may be delisted");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let charts = server.hits("/v8/finance/chart/zzzz");
        assert_eq!(charts.len(), 1);
        assert!(charts[0].contains("range=5d"));
        assert!(charts[0].contains("interval=1d"));
    }

    #[tokio::test]
    async fn non_json_error_becomes_http_status() {
        let server =
            StubServer::start(|_| (429, Vec::new(), "Too Many Requests".to_string())).await;

        let err = server
            .client()
            .get_daily_chart("AAPL", Period::OneMonth)
            .await
            .unwrap_err();
        match yahoo_error(&err) {
            YahooError::HttpStatus { status, body } => {
                assert_eq!(*status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(body, "Too Many Requests");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chart_payload_maps_to_bars() {
        let server = StubServer::start(|_| {
            let body = json!({
                "chart": {
                    "result": [{
                        "meta": { "exchangeTimezoneName": "America/New_York", "gmtoffset": -18000 },
                        "timestamp": [1704205800],
                        "indicators": {
                            "quote": [{
                                "open": [100.0],
                                "high": [101.0],
                                "low": [99.0],
                                "close": [100.5],
                                "volume": [5000]
                            }]
                        }
                    }],
                    "error": null
                }
            });
            (200, Vec::new(), body.to_string())
        })
        .await;

        let bars = server.client().history("AAPL", Period::FiveDays).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date.to_string(), "2024-01-02");
        assert_eq!(bars[0].close, 100.5);
        assert_eq!(bars[0].volume, 5000);
    }
}
