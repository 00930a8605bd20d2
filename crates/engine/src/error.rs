/// Errors from the remote workflow-engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The addressed workflow or execution does not exist.
    #[error("Engine resource not found: {0}")]
    NotFound(String),

    /// The engine returned a non-2xx status code.
    #[error("Engine API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Engine request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A long-running operation finished with an error or never finished.
    #[error("Engine operation failed: {0}")]
    Operation(String),

    #[error("Unexpected engine response: {0}")]
    InvalidResponse(String),

    /// No bearer token could be obtained.
    #[error("Failed to obtain access token: {0}")]
    Token(String),
}

impl EngineError {
    /// Whether the error means the resource is already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_) | EngineError::Api { status: 404, .. }
        )
    }
}
