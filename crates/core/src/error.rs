use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("ingest error: {0}")]
    Ingest(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
