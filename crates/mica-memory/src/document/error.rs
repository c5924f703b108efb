#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown segmentation strategy: {0}")]
    UnknownStrategy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),
}
