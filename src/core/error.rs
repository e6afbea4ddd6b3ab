use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sample rate must be within (0.0, 1.0], got {0}")]
    InvalidSampleRate(f64),

    #[error("combination_count must be at least 2, got {0}")]
    CombinationCount(usize),

    #[error("Quota {quota} exceeds population {population} for type group {group}")]
    QuotaExceedsPopulation {
        group: usize,
        quota: usize,
        population: usize,
    },

    #[error("Optimization failed: {0}")]
    Optimization(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Invalid span data: {0}")]
    InvalidSpan(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for sampler operations
pub type Result<T> = std::result::Result<T, SamplerError>;

impl SamplerError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new optimization error
    pub fn optimization<S: Into<String>>(msg: S) -> Self {
        Self::Optimization(msg.into())
    }

    /// Creates a new export error
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Creates a new invalid span error
    pub fn invalid_span<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSpan(msg.into())
    }

    /// Returns true if batch processing can continue past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Optimization(_) | Self::Export(_) | Self::QuotaExceedsPopulation { .. }
        )
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_)
            | Self::InvalidSampleRate(_)
            | Self::CombinationCount(_)
            | Self::QuotaExceedsPopulation { .. } => "config",
            Self::Optimization(_) => "optimization",
            Self::Export(_) => "export",
            Self::InvalidSpan(_) => "validation",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Join(_) => "async",
        }
    }
}
