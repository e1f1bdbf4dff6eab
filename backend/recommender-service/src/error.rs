use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Low confidence: {0}")]
    LowConfidence(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Failures that end in an empty result instead of an error response.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData(_) | EngineError::LowConfidence(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ModelLoad(_) => "model_load",
            EngineError::InsufficientData(_) => "insufficient_data",
            EngineError::UnknownStrategy(_) => "unknown_strategy",
            EngineError::LowConfidence(_) => "low_confidence",
            EngineError::ServiceUnavailable(_) => "service_unavailable",
            EngineError::InvalidInput(_) => "invalid_input",
        }
    }

    /// HTTP-style status for callers that front the engine with a transport.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::UnknownStrategy(_) | EngineError::InvalidInput(_) => 400,
            EngineError::InsufficientData(_) | EngineError::LowConfidence(_) => 422,
            EngineError::ServiceUnavailable(_) => 503,
            EngineError::ModelLoad(_) => 500,
        }
    }
}

// Asset decoding failures all surface as load errors
impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ModelLoad(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::ModelLoad(err.to_string())
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::ModelLoad(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}
