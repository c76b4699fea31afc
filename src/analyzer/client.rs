//! Client for the hosted vision-language API.
//!
//! Owns the session credential, builds one outbound request per outfit
//! check, and retries rate-limited responses with a bounded linear backoff.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::image_prep;
use super::prompts::{build_system_prompt, DEFAULT_USER_PROMPT};
use super::types::{AnalysisOptions, AnalysisResult, EncodedImage};
use crate::error::OutfitCheckError;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Retry budget for rate-limited responses: at most 2 retries, 3 attempts
/// total, waiting `RETRY_DELAY * attempt_number` between attempts.
pub const MAX_RETRIES: u32 = 2;
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_URL_ENV: &str = "ANTHROPIC_API_URL";
const API_VERSION_ENV: &str = "ANTHROPIC_API_VERSION";

const DEFAULT_REQUEST_TOKEN: &str = "local";

/// Connection settings resolved once at startup. Construct directly to
/// inject a custom endpoint or credential; `from_env` reads the process
/// environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_version: String,
    pub api_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty());
        if api_key.is_none() {
            warn!("No API key found in environment; the client starts unconfigured");
        }
        Self {
            api_url: std::env::var(API_URL_ENV)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_version: std::env::var(API_VERSION_ENV)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            api_key,
        }
    }
}

/// Outcome of one network attempt, separated so the retry loop can be
/// exercised without a live endpoint.
enum AttemptOutcome {
    Success(Value),
    RateLimited(String),
}

pub struct AnalysisClient {
    http: reqwest::Client,
    api_url: String,
    api_version: String,
    /// Session-scoped credential cache. Last `configure` call wins; never
    /// persisted.
    api_key: Mutex<Option<String>>,
    in_flight: Mutex<HashSet<String>>,
}

impl AnalysisClient {
    /// Build a client from the process environment. Intended to be called
    /// once at startup and handed by reference to all consumers.
    pub fn new() -> Result<Self, OutfitCheckError> {
        Self::with_config(ClientConfig::from_env())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, OutfitCheckError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                OutfitCheckError::Transport(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            http,
            api_url: config.api_url,
            api_version: config.api_version,
            api_key: Mutex::new(config.api_key),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Activate a credential for the rest of the session. Passing `None`
    /// keeps whatever is already cached; the client stays unconfigured if
    /// nothing was cached.
    pub fn configure(&self, api_key: Option<&str>) {
        let mut slot = self.api_key.lock().unwrap();
        match api_key {
            Some(key) if !key.is_empty() => {
                info!("API credential updated for this session");
                *slot = Some(key.to_string());
            }
            _ => {
                if slot.is_none() {
                    warn!("No API credential supplied and none cached");
                }
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.lock().unwrap().is_some()
    }

    /// Analyze an outfit photo and return the shaped critique.
    ///
    /// Checks the credential before touching the filesystem or network, so
    /// an unconfigured client performs zero attempts. A second call with the
    /// same request token while one is outstanding is rejected with
    /// `AnalysisInFlight` rather than raced.
    pub async fn analyze(
        &self,
        image: &Path,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, OutfitCheckError> {
        let api_key = self
            .api_key
            .lock()
            .unwrap()
            .clone()
            .ok_or(OutfitCheckError::NotConfigured)?;

        let token = options
            .request_token
            .clone()
            .unwrap_or_else(|| DEFAULT_REQUEST_TOKEN.to_string());
        let _guard = InFlightGuard::acquire(&self.in_flight, token)?;

        let encoded = image_prep::encode_image(image).await?;
        let payload = build_payload(&encoded, options);

        info!(
            "Requesting outfit analysis (model: {})",
            payload["model"].as_str().unwrap_or(DEFAULT_MODEL)
        );

        let raw = send_with_retry(|_attempt| {
            let request = self
                .http
                .post(&self.api_url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", &self.api_version)
                .header("content-type", "application/json")
                .json(&payload);
            dispatch(request)
        })
        .await?;

        shape_result(raw)
    }
}

/// Assemble the request body: model knobs, the fixed system prompt plus any
/// extra instructions, and a two-part user message of image then text.
fn build_payload(encoded: &EncodedImage, options: &AnalysisOptions) -> Value {
    json!({
        "model": options.model.as_deref().unwrap_or(DEFAULT_MODEL),
        "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "temperature": options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        "system": build_system_prompt(options.additional_instructions.as_deref()),
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": encoded.media_type,
                            "data": encoded.data,
                        }
                    },
                    {
                        "type": "text",
                        "text": options.user_prompt.as_deref().unwrap_or(DEFAULT_USER_PROMPT),
                    }
                ]
            }
        ]
    })
}

/// Issue one attempt and classify the outcome. 429 is recoverable; every
/// other failure aborts the retry loop.
async fn dispatch(request: reqwest::RequestBuilder) -> Result<AttemptOutcome, OutfitCheckError> {
    let response = request.send().await.map_err(|e| {
        let msg = if e.is_timeout() {
            "API request timed out after 60s".to_string()
        } else {
            format!("API request failed: {}", e)
        };
        error!("{}", msg);
        OutfitCheckError::Transport(msg)
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let body = response.text().await.unwrap_or_default();
        warn!("API returned 429 (rate limited)");
        return Ok(AttemptOutcome::RateLimited(body));
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        let msg = format!("API error: {} - {}", status, truncate_body(body));
        error!("{}", msg);
        return Err(OutfitCheckError::Transport(msg));
    }

    let value = response.json::<Value>().await.map_err(|e| {
        OutfitCheckError::AnalysisFailed(format!("Failed to parse API response: {}", e))
    })?;
    Ok(AttemptOutcome::Success(value))
}

/// Cap an error body at roughly 1 KiB for the surfaced message, backing up
/// to a char boundary so multibyte content can't split.
fn truncate_body(body: String) -> String {
    const MAX_BODY: usize = 1024;
    if body.len() <= MAX_BODY {
        return body;
    }
    let mut end = MAX_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Run attempts until success, a non-recoverable error, or the retry budget
/// is spent. On a 429, wait `RETRY_DELAY * attempt_number` before the next
/// attempt; the final 429 is surfaced, not swallowed.
async fn send_with_retry<F, Fut>(mut attempt_fn: F) -> Result<Value, OutfitCheckError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<AttemptOutcome, OutfitCheckError>>,
{
    let mut attempt = 1u32;
    loop {
        match attempt_fn(attempt).await? {
            AttemptOutcome::Success(value) => return Ok(value),
            AttemptOutcome::RateLimited(body) => {
                if attempt > MAX_RETRIES {
                    error!("Still rate limited after {} attempts; giving up", attempt);
                    return Err(OutfitCheckError::RateLimited {
                        attempts: attempt,
                        body,
                    });
                }
                let delay = RETRY_DELAY * attempt;
                info!("Rate limited; retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Extract the primary text block; the rest of the body stays opaque.
fn shape_result(raw: Value) -> Result<AnalysisResult, OutfitCheckError> {
    let text = raw["content"][0]["text"]
        .as_str()
        .ok_or_else(|| {
            OutfitCheckError::AnalysisFailed("No text content in API response".to_string())
        })?
        .to_string();
    Ok(AnalysisResult { text, raw })
}

/// Marks one logical request token as busy; released on drop, including the
/// failure paths.
struct InFlightGuard<'a> {
    tokens: &'a Mutex<HashSet<String>>,
    token: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(
        tokens: &'a Mutex<HashSet<String>>,
        token: String,
    ) -> Result<Self, OutfitCheckError> {
        let mut set = tokens.lock().unwrap();
        if !set.insert(token.clone()) {
            warn!("Rejecting overlapping analyze call for token '{}'", token);
            return Err(OutfitCheckError::AnalysisInFlight);
        }
        Ok(Self { tokens, token })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tokens.lock().unwrap().remove(&self.token);
    }
}
