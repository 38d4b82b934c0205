use thiserror::Error;

/// A failure inside a page driver (browser or offline markup).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("invalid selector \"{selector}\"")]
    InvalidSelector { selector: String },

    #[error("{0} is not supported by this driver")]
    Unsupported(&'static str),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session file {path} is not valid storage-state JSON: {source}")]
    SessionParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
