use crate::error::FinanceError;

pub const RESOURCE_SCHEME: &str = "finance://";
pub const INFO_SUFFIX: &str = "/info";

/// Locator of the quote resource for `symbol`.
pub fn info_uri(symbol: &str) -> String {
    format!("{RESOURCE_SCHEME}{symbol}{INFO_SUFFIX}")
}

/// Extract the ticker from a `finance://<SYMBOL>/info` locator.
///
/// The symbol is the path segment right before `/info`, so `finance://a/MSFT/info`
/// yields `MSFT`. Anything else, including an empty segment, is an unknown resource.
pub fn parse_symbol(uri: &str) -> Result<&str, FinanceError> {
    if !uri.starts_with(RESOURCE_SCHEME) || !uri.ends_with(INFO_SUFFIX) {
        return Err(FinanceError::UnknownResource(uri.to_string()));
    }

    let head = &uri[..uri.len() - INFO_SUFFIX.len()];
    match head.rsplit('/').next() {
        Some(symbol) if !symbol.is_empty() => Ok(symbol),
        _ => Err(FinanceError::UnknownResource(uri.to_string())),
    }
}
