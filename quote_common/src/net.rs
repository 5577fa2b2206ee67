//! Feed endpoint constants and URL helpers.

use url::Url;

use crate::error::QuoteError;
use crate::result::Result;

/// Streaming endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "wss://ws.finnhub.io";
/// Query-string parameter that carries the feed credential.
pub const TOKEN_PARAM: &str = "token";

/// Builds the dial URL `endpoint?token=<token>`.
///
/// Only `ws` and `wss` endpoints are accepted. Existing query parameters on the
/// endpoint are preserved and the credential is percent-encoded.
pub fn feed_url(endpoint: &str, token: &str) -> Result<String> {
    let mut url = Url::parse(endpoint.trim())
        .map_err(|e| QuoteError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(QuoteError::InvalidEndpoint(format!(
                "{}: unsupported scheme {:?}",
                endpoint, other
            )));
        }
    }
    url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_token() {
        let url = feed_url(DEFAULT_ENDPOINT, "abc123").unwrap();
        assert_eq!(url, "wss://ws.finnhub.io/?token=abc123");
    }

    #[test]
    fn keeps_existing_query_and_encodes() {
        let url = feed_url("ws://127.0.0.1:9001/feed?v=2", "a b&c").unwrap();
        assert_eq!(url, "ws://127.0.0.1:9001/feed?v=2&token=a+b%26c");
    }

    #[test]
    fn rejects_non_websocket_schemes() {
        assert!(matches!(
            feed_url("https://finnhub.io", "t"),
            Err(QuoteError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            feed_url("not a url", "t"),
            Err(QuoteError::InvalidEndpoint(_))
        ));
    }
}
