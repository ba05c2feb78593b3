use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No checkpoint given for test run '{tag}' (set test_from_ckpt)")]
    MissingCheckpoint { tag: String },

    #[error("Confidence interval needs at least 2 samples, got {0}")]
    InsufficientSamples(usize),

    #[error("Confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("Could not install interrupt handler: {0}")]
    SignalHandler(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Sweep cancelled")]
    Cancelled,

    #[error("Shutdown by user")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, SweepError>;
