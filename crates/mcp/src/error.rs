use rmcp::ErrorData as McpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinanceError {
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Stock API error: {0}")]
    StockApi(String),
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FinanceError {
    /// Flatten a provider failure, keeping its full context chain as text.
    pub fn stock_api(err: &anyhow::Error) -> Self {
        FinanceError::StockApi(format!("{err:#}"))
    }

    /// True for mistakes in the request itself, as opposed to upstream failures.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FinanceError::UnknownResource(_)
                | FinanceError::UnknownTool(_)
                | FinanceError::InvalidArguments(_)
        )
    }
}

impl From<FinanceError> for McpError {
    fn from(err: FinanceError) -> Self {
        let message = err.to_string();
        match err {
            FinanceError::UnknownResource(_) => McpError::resource_not_found(message, None),
            FinanceError::UnknownTool(_) | FinanceError::InvalidArguments(_) => {
                McpError::invalid_params(message, None)
            }
            FinanceError::StockApi(_) | FinanceError::Serialize(_) => {
                McpError::internal_error(message, None)
            }
        }
    }
}
