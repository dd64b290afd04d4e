use thiserror::Error;

pub type Result<T> = std::result::Result<T, SupabaseError>;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Auth error: {0}")]
    Auth(String),
}

impl SupabaseError {
    /// Human-readable message without the transport prefix.
    pub fn message(&self) -> &str {
        match self {
            SupabaseError::Network(m)
            | SupabaseError::Parse(m)
            | SupabaseError::Auth(m)
            | SupabaseError::Api { message: m, .. } => m,
        }
    }
}

impl From<reqwest::Error> for SupabaseError {
    fn from(err: reqwest::Error) -> Self {
        SupabaseError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SupabaseError {
    fn from(err: serde_json::Error) -> Self {
        SupabaseError::Parse(err.to_string())
    }
}
