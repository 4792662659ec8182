//! Run feedback from a generative language model.
//!
//! Given a run's distance, duration and steps, asks the model for a short
//! motivating summary. The call is never on the tracking path and never
//! fails from the caller's point of view: an empty answer and any error are
//! both replaced by fixed messages.
//!
//! The FFI layer runs requests on a background thread and polls for the
//! result, the same way activity fetches are handled.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use stridetrack::RunRecord;

use crate::error::FeedbackError;

/// Returned when the service answers with no text.
pub const EMPTY_FALLBACK: &str = "Great run! Keep pushing your limits.";

/// Returned when the request fails for any reason.
pub const FAILURE_FALLBACK: &str = "Amazing effort today! Your consistency is your superpower.";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// Never serialized; comes from the environment or the host app.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            temperature: 0.7,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl FeedbackConfig {
    /// Defaults, with the API key read from `API_KEY` if set.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// The figures a summary is based on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummaryRequest {
    pub distance_meters: f64,
    pub duration_seconds: u64,
    pub steps: u64,
}

impl From<&RunRecord> for RunSummaryRequest {
    fn from(run: &RunRecord) -> Self {
        Self {
            distance_meters: run.distance_meters,
            duration_seconds: run.duration_seconds,
            steps: run.steps,
        }
    }
}

/// The prompt sent to the model.
pub fn build_prompt(req: &RunSummaryRequest) -> String {
    let pace = (req.duration_seconds as f64 / 60.0) / (req.distance_meters / 1000.0);
    let pace = if pace.is_finite() {
        format!("{:.2}", pace)
    } else {
        "unknown".to_string()
    };
    format!(
        "Analyze this run: Distance: {:.0}m, Duration: {}s, Steps: {}, Pace: {} min/km. \
         Provide a brief, motivating analysis (max 3 sentences). \
         Format: One sentence of praise, one insight about pace/cadence, \
         and one tip for next time.",
        req.distance_meters, req.duration_seconds, req.steps, pace
    )
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, all parts joined.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

pub struct FeedbackClient {
    config: FeedbackConfig,
    http: Client,
}

impl FeedbackClient {
    pub fn new(config: FeedbackConfig) -> Result<Self, FeedbackError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Ask for a summary, surfacing every failure.
    pub async fn request(&self, req: &RunSummaryRequest) -> Result<String, FeedbackError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(FeedbackError::MissingApiKey)?;

        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(req) }] }],
            "generationConfig": { "temperature": self.config.temperature },
        });

        let start = Instant::now();
        let response = self
            .http
            .post(self.config.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedbackError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        debug!(
            "[Feedback] Response in {} ms",
            start.elapsed().as_millis()
        );
        parsed.text().ok_or(FeedbackError::EmptyResponse)
    }

    /// Ask for a summary, substituting the fixed fallbacks on failure.
    pub async fn summarize(&self, req: &RunSummaryRequest) -> String {
        match self.request(req).await {
            Ok(text) => text,
            Err(FeedbackError::EmptyResponse) => {
                info!("[Feedback] Empty response");
                EMPTY_FALLBACK.to_string()
            }
            Err(e) => {
                warn!("[Feedback] Request failed: {}", e);
                FAILURE_FALLBACK.to_string()
            }
        }
    }

    /// Blocking wrapper around [`FeedbackClient::summarize`] for callers
    /// without a runtime.
    pub fn summarize_blocking(&self, req: &RunSummaryRequest) -> String {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt.block_on(self.summarize(req)),
            Err(e) => {
                warn!("[Feedback] Failed to create runtime: {}", e);
                FAILURE_FALLBACK.to_string()
            }
        }
    }
}

// ============================================================================
// Background requests
// ============================================================================

static FEEDBACK_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

static FEEDBACK_RESULT: Lazy<StdMutex<Option<String>>> = Lazy::new(|| StdMutex::new(None));

/// Start a feedback request on a background thread and return immediately.
/// Returns false if a request is already running.
/// Poll [`take_feedback`] for the result.
pub fn start_background_feedback(config: FeedbackConfig, req: RunSummaryRequest) -> bool {
    if FEEDBACK_IN_FLIGHT.swap(true, Ordering::AcqRel) {
        debug!("[Feedback] Request already in flight");
        return false;
    }
    if let Ok(mut result) = FEEDBACK_RESULT.lock() {
        *result = None;
    }

    std::thread::spawn(move || {
        let summary = match FeedbackClient::new(config) {
            Ok(client) => client.summarize_blocking(&req),
            Err(e) => {
                warn!("[Feedback] Failed to create HTTP client: {}", e);
                FAILURE_FALLBACK.to_string()
            }
        };
        if let Ok(mut result) = FEEDBACK_RESULT.lock() {
            *result = Some(summary);
        }
        FEEDBACK_IN_FLIGHT.store(false, Ordering::Release);
        info!("[Feedback] Background request complete");
    });
    true
}

/// Take the finished summary, if any. Clears it.
pub fn take_feedback() -> Option<String> {
    FEEDBACK_RESULT.lock().ok().and_then(|mut r| r.take())
}

pub fn feedback_in_flight() -> bool {
    FEEDBACK_IN_FLIGHT.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> RunSummaryRequest {
        RunSummaryRequest {
            distance_meters: 5012.4,
            duration_seconds: 1500,
            steps: 6100,
        }
    }

    #[test]
    fn test_prompt() {
        let prompt = build_prompt(&req());
        assert!(prompt.starts_with(
            "Analyze this run: Distance: 5012m, Duration: 1500s, Steps: 6100, Pace: 4.99 min/km."
        ));
        assert!(prompt.contains("max 3 sentences"));

        let idle = RunSummaryRequest {
            distance_meters: 0.0,
            ..req()
        };
        assert!(build_prompt(&idle).contains("Pace: unknown min/km"));
    }

    #[test]
    fn test_response_text() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Nice "},{"text":"work."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Nice work."));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(empty.text(), None);
        let blank: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#)
                .unwrap();
        assert_eq!(blank.text(), None);
    }

    #[test]
    fn test_endpoint() {
        let config = FeedbackConfig {
            base_url: "http://localhost:9000/".into(),
            model: "m".into(),
            ..FeedbackConfig::default()
        };
        assert_eq!(config.endpoint(), "http://localhost:9000/models/m:generateContent");
    }

    #[test]
    fn test_api_key_never_serialized() {
        let config = FeedbackConfig::default().with_api_key("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[tokio::test]
    async fn test_missing_key_falls_back() {
        let client = FeedbackClient::new(FeedbackConfig::default()).unwrap();
        assert!(matches!(
            client.request(&req()).await,
            Err(FeedbackError::MissingApiKey)
        ));
        assert_eq!(client.summarize(&req()).await, FAILURE_FALLBACK);
    }
}
