use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Cannot read draw file {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Empty group: no draws to summarize for {context}")]
    EmptyGroup { context: String },

    #[error("{kind} '{key}' not found in geographic reference")]
    MappingNotFound { kind: &'static str, key: String },

    #[error("Draw alignment error for {dataset} (state={state}, demographic={demographic}): {details}")]
    Alignment {
        dataset:     String,
        state:       String,
        demographic: String,
        details:     String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SummaryResult<T> = Result<T, SummaryError>;
