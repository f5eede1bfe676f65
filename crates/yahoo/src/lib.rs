pub mod client;
pub mod error;
pub mod models;

pub use client::YahooRestClient;
pub use error::YahooError;
