use thiserror::Error;

/// Errors raised while talking to the remote ledger or the local cache.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network or TLS failure, or a non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered 2xx but reported a failure in its body.
    #[error("ledger endpoint reported an error: {0}")]
    Remote(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid ledger endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("local cache error at {path}: {source}")]
    Cache {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode ledger: {0}")]
    Encode(#[source] serde_json::Error),
}
