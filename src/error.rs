use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("insufficient data for {what}: need {needed}, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("series share no common timestamps, cannot compute {0}")]
    EmptyOverlap(&'static str),

    #[error("series error: {0}")]
    Series(String),

    #[error("store write failed for key '{key}': {source}")]
    Persistence {
        key: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store connection error: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("CSV error in {path}: {message}")]
    Csv { path: String, message: String },

    #[error("chart error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Wrap a row-level store failure with the offending key for diagnosis.
    pub fn persistence(key: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Persistence {
            key: key.into(),
            source,
        }
    }
}
