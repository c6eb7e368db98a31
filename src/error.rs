/// Errors raised at the network and cache seam.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FetchError {
    /// Short reason suitable for a one-line report.
    pub fn reason(&self) -> String {
        match self {
            FetchError::Status { status, .. } => format!("HTTP {}", status),
            FetchError::Http(e) => format!("Request failed: {}", e),
            other => other.to_string(),
        }
    }
}
