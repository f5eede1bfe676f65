use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum YahooError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("failed to deserialize payload: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("{description} ({code})")]
    Api { code: String, description: String },
    #[error("empty response from {0}")]
    EmptyResponse(String),
    #[error("yahoo session error: {0}")]
    Session(String),
    #[error("yahoo rejected the session crumb")]
    Unauthorized,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
