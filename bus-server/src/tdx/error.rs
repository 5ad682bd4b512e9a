//! TDX client error types.

/// Errors from the TDX HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum TdxError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization failed
    #[error("JSON parse error: {message}{}", body_suffix(.body))]
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Access token rejected
    #[error("unauthorized: check TDX_CLIENT_ID and TDX_CLIENT_SECRET")]
    Unauthorized,

    /// Rate limited by the API
    #[error("rate limited by TDX API")]
    RateLimited,

    /// Token endpoint failed
    #[error("token request failed: {0}")]
    Token(String),
}

fn body_suffix(body: &Option<String>) -> String {
    body.as_ref()
        .map(|b| format!(" (body: {b})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TdxError::Api {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");

        let err = TdxError::Json {
            message: "expected string".into(),
            body: Some("{}".into()),
        };
        assert_eq!(err.to_string(), "JSON parse error: expected string (body: {})");

        let err = TdxError::Json {
            message: "eof".into(),
            body: None,
        };
        assert_eq!(err.to_string(), "JSON parse error: eof");

        assert_eq!(TdxError::RateLimited.to_string(), "rate limited by TDX API");
    }
}
