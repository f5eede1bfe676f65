pub mod error;
pub mod market;
pub mod resource;
pub mod server;

#[cfg(test)]
mod testing;

pub use error::FinanceError;
pub use server::FinanceServer;
