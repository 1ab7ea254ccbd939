use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

impl ScanError {
    /// Short machine-friendly name of the failure class, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Transport(_) => "transport",
            ScanError::HttpStatus { .. } => "http_status",
            ScanError::Parse(_) => "parse",
            ScanError::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
