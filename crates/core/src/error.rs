use thiserror::Error;

#[derive(Error, Debug)]
pub enum StewardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for StewardError {
    fn from(e: serde_json::Error) -> Self {
        StewardError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StewardError>;
