use thiserror::Error;

/// Shown for any transport-level failure.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection and try again.";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx response. `message` is the server's `{message}` when it sent one.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{}", NETWORK_ERROR_MESSAGE)]
    Network(#[source] reqwest::Error),

    #[error("Unexpected response from server: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}
