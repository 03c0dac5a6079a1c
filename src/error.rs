use thiserror::Error;

#[derive(Error, Debug)]
pub enum DealEngineError {
    #[error("Deal input must be an array of records, got {0}")]
    InputNotArray(String),

    #[error("Could not load deals: {0}")]
    LoadFailed(String),

    #[error("Invalid severity thresholds: warning ({warning_days}d) must be non-negative and below critical ({critical_days}d)")]
    InvalidThresholds {
        critical_days: i64,
        warning_days: i64,
    },

    #[error("Invalid months back {0}: must be between 1 and 120")]
    InvalidMonthsBack(u32),

    #[error("Invalid monthly goal {0}: must be a finite number")]
    InvalidGoal(f64),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DealEngineError>;
