use std::fmt;

#[derive(Debug)]
pub enum CommonError {
    Http {
        status: reqwest::StatusCode,
        message: String,
    },
    Network(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Csv(csv::Error),
    Configuration(String),
    Authentication(String),
    Other(String),
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommonError::Http { status, message } if message.is_empty() => {
                write!(f, "HTTP {status}")
            }
            CommonError::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            CommonError::Network(msg) => write!(f, "Network error: {msg}"),
            CommonError::Io(err) => write!(f, "IO error: {err}"),
            CommonError::Serialization(err) => write!(f, "Serialization error: {err}"),
            CommonError::Csv(err) => write!(f, "CSV error: {err}"),
            CommonError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            CommonError::Authentication(msg) => write!(f, "Authentication error: {msg}"),
            CommonError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CommonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommonError::Io(err) => Some(err),
            CommonError::Serialization(err) => Some(err),
            CommonError::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        CommonError::Io(err)
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        CommonError::Serialization(err)
    }
}

impl From<csv::Error> for CommonError {
    fn from(err: csv::Error) -> Self {
        CommonError::Csv(err)
    }
}

impl From<reqwest::Error> for CommonError {
    fn from(err: reqwest::Error) -> Self {
        CommonError::Network(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for CommonError {
    fn from(err: reqwest_middleware::Error) -> Self {
        CommonError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for CommonError {
    fn from(err: anyhow::Error) -> Self {
        CommonError::Other(err.to_string())
    }
}

impl CommonError {
    /// True for errors raised before any remote call could be attempted.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CommonError::Configuration(_))
    }
}

// Common result type alias
pub type CommonResult<T> = Result<T, CommonError>;
