#[derive(Debug, thiserror::Error)]
pub enum ShadowdiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Unknown log file format: {0}")]
    UnknownLogFormat(String),

    #[error("Unknown report: {0}")]
    UnknownReport(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
