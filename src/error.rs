use node_plugin::static_data::StaticDataError;
use thiserror::Error;

/// Everything that can go wrong while talking to Chat Data on behalf of a node.
#[derive(Debug, Error)]
pub enum ChatDataError {
    /// Credentials or configuration are missing; raised before any request.
    #[error("{0}")]
    Configuration(String),

    /// The API answered with `status: "error"`.
    #[error("{message}")]
    Remote { message: String, status: Option<u16> },

    /// A response lacked the field an operation depends on.
    #[error("{0}")]
    Shape(String),

    /// Node parameters that cannot be turned into a request.
    #[error("{0}")]
    Validation(String),

    /// The HTTP client could not complete the exchange.
    #[error("{0}")]
    Transport(String),

    #[error("node storage failed: {0}")]
    Storage(#[from] StaticDataError),
}

impl ChatDataError {
    pub fn remote(message: impl Into<String>, status: Option<u16>) -> Self {
        ChatDataError::Remote { message: message.into(), status }
    }

    /// HTTP status reported alongside an error item; the API signals errors
    /// in-band so 500 stands in when the transport had nothing better.
    pub fn status_code(&self) -> u16 {
        match self {
            ChatDataError::Remote { status: Some(status), .. } if *status >= 400 => *status,
            _ => 500,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ChatDataError::Configuration(_))
    }

    /// Same kind and status, message reads `"{prefix}: {message}"`.
    pub fn prefixed(self, prefix: &str) -> Self {
        let with = |message: String| format!("{prefix}: {message}");
        match self {
            ChatDataError::Configuration(m) => ChatDataError::Configuration(with(m)),
            ChatDataError::Remote { message, status } => {
                ChatDataError::Remote { message: with(message), status }
            }
            ChatDataError::Shape(m) => ChatDataError::Shape(with(m)),
            ChatDataError::Validation(m) => ChatDataError::Validation(with(m)),
            ChatDataError::Transport(m) => ChatDataError::Transport(with(m)),
            storage @ ChatDataError::Storage(_) => storage,
        }
    }
}

impl From<reqwest::Error> for ChatDataError {
    fn from(err: reqwest::Error) -> Self {
        ChatDataError::Transport(format!("request to Chat Data failed: {err}"))
    }
}
