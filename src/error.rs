use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutfitCheckError {
    #[error("API key not set. Configure the client with a credential first.")]
    NotConfigured,

    #[error("Failed to encode image: {0}")]
    Encoding(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited by the API after {attempts} attempts: {body}")]
    RateLimited { attempts: u32, body: String },

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("An analysis is already in flight for this request token")]
    AnalysisInFlight,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<OutfitCheckError> for String {
    fn from(err: OutfitCheckError) -> Self {
        err.to_string()
    }
}
