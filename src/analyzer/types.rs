use serde::{Deserialize, Serialize};

/// A base64 image payload tagged with its media type, ready to embed in a
/// request body. `data` carries raw base64 only, never a data-URL envelope.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub media_type: String,
    pub data: String,
}

/// Caller-tunable knobs for one analyze call. Every field falls back to a
/// fixed default when unset.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Text prompt sent alongside the image.
    pub user_prompt: Option<String>,
    /// Extra instructions appended to the fixed system prompt.
    pub additional_instructions: Option<String>,
    /// Logical token for the in-flight guard; overlapping calls with the
    /// same token are rejected rather than raced.
    pub request_token: Option<String>,
}

/// Shaped API response: the critique text plus the raw body kept opaque for
/// callers that want the full metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text: String,
    pub raw: serde_json::Value,
}
