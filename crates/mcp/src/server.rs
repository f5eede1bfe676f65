use std::sync::Arc;

use anyhow::{anyhow, Result};
use finance_core::{Period, StockDataProvider};
use rmcp::{
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject,
        ListResourcesResult, ListToolsResult, PaginatedRequestParam, ProtocolVersion, RawResource,
        ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

use crate::error::FinanceError;
use crate::market::{fetch_historical_data, fetch_stock_info};
use crate::resource::{info_uri, parse_symbol};

pub const HISTORICAL_DATA_TOOL: &str = "get_historical_data";

#[derive(Debug, Deserialize)]
struct HistoricalDataArgs {
    symbol: String,
    #[serde(default)]
    period: Option<Period>,
}

/// MCP server exposing quote snapshots as resources and daily history as a tool.
///
/// Built once at startup and handed to the stdio transport; it holds no mutable state.
#[derive(Clone)]
pub struct FinanceServer {
    provider: Arc<dyn StockDataProvider>,
    default_symbol: String,
}

impl FinanceServer {
    pub fn new(provider: Arc<dyn StockDataProvider>, default_symbol: impl Into<String>) -> Self {
        Self {
            provider,
            default_symbol: default_symbol.into(),
        }
    }

    /// The single advertised resource: quote info for the default symbol.
    pub fn resources(&self) -> Vec<Resource> {
        let mut resource = RawResource::new(
            info_uri(&self.default_symbol),
            format!("Current stock information for {}", self.default_symbol),
        );
        resource.description = Some("Real-time stock market data".into());
        resource.mime_type = Some("application/json".into());
        vec![resource.no_annotation()]
    }

    /// Resolve a `finance://<SYMBOL>/info` locator to a pretty-printed quote snapshot.
    #[instrument(skip(self))]
    pub async fn read_quote(&self, uri: &str) -> Result<String, FinanceError> {
        let symbol = parse_symbol(uri)?;
        debug!(symbol, "reading quote resource");

        let snapshot = fetch_stock_info(self.provider.as_ref(), symbol)
            .await
            .map_err(|err| {
                warn!(error = ?err, symbol, "quote fetch failed");
                FinanceError::stock_api(&err)
            })?;

        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    pub fn tools(&self) -> Vec<Tool> {
        vec![Tool::new(
            HISTORICAL_DATA_TOOL,
            "Get historical stock data for a symbol",
            historical_data_schema(),
        )]
    }

    /// Dispatch a tool call and return its JSON text payload.
    #[instrument(skip(self, arguments))]
    pub async fn run_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<String, FinanceError> {
        if name != HISTORICAL_DATA_TOOL {
            return Err(FinanceError::UnknownTool(name.to_string()));
        }

        let args = parse_historical_args(arguments)?;
        let period = args.period.unwrap_or_default();
        debug!(symbol = %args.symbol, %period, "running historical data tool");

        let points = fetch_historical_data(self.provider.as_ref(), &args.symbol, period)
            .await
            .map_err(|err| {
                error!("Stock API error: {err:#}");
                FinanceError::stock_api(&err)
            })?;

        Ok(serde_json::to_string_pretty(&points)?)
    }

    /// Run the server over stdio transport and wait until the peer disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|err| anyhow!(err))?;

        service.waiting().await.map_err(|err| anyhow!(err))?;

        Ok(())
    }
}

fn parse_historical_args(arguments: Option<Value>) -> Result<HistoricalDataArgs, FinanceError> {
    let map = match arguments {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(FinanceError::InvalidArguments(
                "expected an object with a `symbol` field".into(),
            ))
        }
    };

    if !map.contains_key("symbol") {
        return Err(FinanceError::InvalidArguments("missing `symbol`".into()));
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|err| FinanceError::InvalidArguments(err.to_string()))
}

fn historical_data_schema() -> JsonObject {
    let codes: Vec<&str> = Period::ALL.iter().map(Period::as_str).collect();

    JsonObject::from_iter([
        ("type".to_string(), json!("object")),
        (
            "properties".to_string(),
            json!({
                "symbol": {
                    "type": "string",
                    "description": "Stock symbol"
                },
                "period": {
                    "type": "string",
                    "description": format!("Time period ({})", codes.join(", ")),
                    "enum": codes
                }
            }),
        ),
        ("required".to_string(), json!(["symbol"])),
    ])
}

impl ServerHandler for FinanceServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = env!("CARGO_PKG_NAME").into();
        server_info.version = env!("CARGO_PKG_VERSION").into();

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info,
            instructions: Some(
                "Stock market data. Read `finance://<SYMBOL>/info` for a quote snapshot; call \
                 `get_historical_data` with a symbol and optional period for daily OHLCV bars."
                    .into(),
            ),
            ..ServerInfo::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.resources(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri, .. }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.read_quote(&uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        CallToolRequestParam {
            name, arguments, ..
        }: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let text = self.run_tool(&name, arguments.map(Value::Object)).await?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}
