//! AI analysis of a comparison result.
//!
//! One request per call to one of three vendors, chosen by
//! [`Settings::selected_model`]:
//!
//! | Model id | Vendor | Auth | Reply path |
//! |----------|--------|------|------------|
//! | `gpt-3.5`, `gpt-4` | OpenAI chat completions | `Authorization: Bearer` | `choices[0].message.content` |
//! | `gemini` | Google `generateContent` | `Authorization: Bearer` | `candidates[0].content.parts[0].text` |
//! | `claude` | Anthropic messages | `x-api-key` + `anthropic-version` | `content[0].text` |
//!
//! [`AnalysisClient::analyze`] never fails: every error becomes an
//! [`AiAnalysisResult`] with empty lists and `error` set. There are no
//! retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};

use crate::config::AiConfig;
use crate::models::{AiAnalysisResult, SimilarSegment};
use crate::settings::Settings;

/// Characters of each document included in the prompt.
pub const PROMPT_TEXT_CHARS: usize = 1000;
/// Segments included in the prompt.
pub const PROMPT_SEGMENTS: usize = 3;

const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 1000;
const ANTHROPIC_VERSION: &str = "2023-06-01";
const SUGGESTION_MARKER: &str = "suggestion:";

const INSTRUCTION: &str = "You are a professional document comparison assistant. \
Analyze the comparison result below in depth and give a summary, the key findings \
and concrete improvement suggestions. Write each finding on its own line starting \
with \"- \" and each suggestion on its own line starting with \"Suggestion:\".";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("API key is not configured; set one with `dcmp settings set apiKey <key>`")]
    MissingApiKey,
    #[error("unsupported AI model: {0}")]
    UnsupportedModel(String),
    #[error("API request failed: {status} {reason} - {body}")]
    Http {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("unexpected {0} response: reply text not found")]
    Response(&'static str),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiModel {
    Gpt35,
    Gpt4,
    Gemini,
    Claude,
}

impl AiModel {
    pub fn from_id(id: &str) -> Result<Self, AnalysisError> {
        match id {
            "gpt-3.5" => Ok(AiModel::Gpt35),
            "gpt-4" => Ok(AiModel::Gpt4),
            "gemini" => Ok(AiModel::Gemini),
            "claude" => Ok(AiModel::Claude),
            other => Err(AnalysisError::UnsupportedModel(other.to_string())),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            AiModel::Gpt35 => "gpt-3.5",
            AiModel::Gpt4 => "gpt-4",
            AiModel::Gemini => "gemini",
            AiModel::Claude => "claude",
        }
    }

    /// Model name sent on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            AiModel::Gpt35 => "gpt-3.5-turbo",
            AiModel::Gpt4 => "gpt-4",
            AiModel::Gemini => "gemini-pro",
            AiModel::Claude => "claude-3-opus-20240229",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            AiModel::Gpt35 | AiModel::Gpt4 => "https://api.openai.com/v1/chat/completions",
            AiModel::Gemini => {
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
            }
            AiModel::Claude => "https://api.anthropic.com/v1/messages",
        }
    }

    fn vendor(self) -> &'static str {
        match self {
            AiModel::Gpt35 | AiModel::Gpt4 => "OpenAI",
            AiModel::Gemini => "Gemini",
            AiModel::Claude => "Anthropic",
        }
    }

    /// Auth headers only; the JSON body sets `Content-Type` itself.
    fn headers(self, api_key: &str) -> Vec<(&'static str, String)> {
        match self {
            AiModel::Gpt35 | AiModel::Gpt4 | AiModel::Gemini => {
                vec![("Authorization", format!("Bearer {}", api_key))]
            }
            AiModel::Claude => vec![
                ("x-api-key", api_key.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
        }
    }

    fn body(self, prompt: &str) -> Value {
        match self {
            AiModel::Gpt35 | AiModel::Gpt4 => json!({
                "model": self.wire_name(),
                "messages": [
                    { "role": "system", "content": INSTRUCTION },
                    { "role": "user", "content": prompt },
                ],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
            }),
            AiModel::Gemini => json!({
                "contents": [
                    { "parts": [ { "text": format!("{}\n\n{}", INSTRUCTION, prompt) } ] }
                ],
                "generationConfig": {
                    "temperature": TEMPERATURE,
                    "maxOutputTokens": MAX_TOKENS,
                },
            }),
            AiModel::Claude => json!({
                "model": self.wire_name(),
                "messages": [
                    { "role": "user", "content": format!("{}\n\n{}", INSTRUCTION, prompt) },
                ],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
            }),
        }
    }

    fn reply_pointer(self) -> &'static str {
        match self {
            AiModel::Gpt35 | AiModel::Gpt4 => "/choices/0/message/content",
            AiModel::Gemini => "/candidates/0/content/parts/0/text",
            AiModel::Claude => "/content/0/text",
        }
    }

    /// Pulls the reply text out of the vendor's response envelope.
    pub fn extract_reply(self, response: &Value) -> Result<String, AnalysisError> {
        response
            .pointer(self.reply_pointer())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(AnalysisError::Response(self.vendor()))
    }
}

/// Everything needed for the single POST.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub model: AiModel,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

/// Validates settings and builds the vendor request. Fails before any
/// network activity on a missing key or an unknown model.
pub fn build_request(
    settings: &Settings,
    left: &str,
    right: &str,
    similarity: &str,
    segments: &[SimilarSegment],
) -> Result<PreparedRequest, AnalysisError> {
    let api_key = settings.api_key.trim();
    if api_key.is_empty() {
        return Err(AnalysisError::MissingApiKey);
    }
    let model = AiModel::from_id(&settings.selected_model)?;

    let url = if settings.api_endpoint.trim().is_empty() {
        model.default_endpoint().to_string()
    } else {
        settings.api_endpoint.trim().to_string()
    };

    let prompt = build_prompt(left, right, similarity, segments);
    Ok(PreparedRequest {
        model,
        url,
        headers: model.headers(api_key),
        body: model.body(&prompt),
    })
}

fn build_prompt(left: &str, right: &str, similarity: &str, segments: &[SimilarSegment]) -> String {
    let head = &segments[..segments.len().min(PROMPT_SEGMENTS)];
    let segments_json = serde_json::to_string(head).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Comparison result:\n\nSimilarity: {}\n\nSimilar segments: {}\n\n\
         Left file content: {}...\n\nRight file content: {}...\n\n\
         Similar segment samples: {}",
        similarity,
        segments.len(),
        truncate_chars(left, PROMPT_TEXT_CHARS),
        truncate_chars(right, PROMPT_TEXT_CHARS),
        segments_json
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Splits a reply into findings and suggestions. The summary is the reply
/// verbatim.
pub fn parse_reply(reply: &str) -> AiAnalysisResult {
    let mut insights = Vec::new();
    let mut suggestions = Vec::new();

    for line in reply.lines() {
        if let Some(rest) = line.strip_prefix('-') {
            insights.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if line
            .get(..SUGGESTION_MARKER.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(SUGGESTION_MARKER))
        {
            suggestions.push(line[SUGGESTION_MARKER.len()..].trim().to_string());
        }
    }

    AiAnalysisResult {
        summary: reply.to_string(),
        insights,
        suggestions,
        error: None,
    }
}

/// HTTP client plus the observable loading flag and last-result slot.
///
/// Concurrent `analyze` calls are not serialized; whichever finishes last
/// owns the slot.
pub struct AnalysisClient {
    http: reqwest::Client,
    loading: AtomicBool,
    last: RwLock<AiAnalysisResult>,
}

impl AnalysisClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            loading: AtomicBool::new(false),
            last: RwLock::new(AiAnalysisResult::default()),
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self> {
        Self::new(Duration::from_secs(config.timeout_secs))
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn last_result(&self) -> AiAnalysisResult {
        self.last
            .read()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn store(&self, result: AiAnalysisResult) {
        match self.last.write() {
            Ok(mut slot) => *slot = result,
            Err(poisoned) => *poisoned.into_inner() = result,
        }
    }

    pub async fn analyze(
        &self,
        settings: &Settings,
        left: &str,
        right: &str,
        similarity: &str,
        segments: &[SimilarSegment],
    ) -> AiAnalysisResult {
        self.loading.store(true, Ordering::SeqCst);
        self.store(AiAnalysisResult::default());

        let result = match self.request(settings, left, right, similarity, segments).await {
            Ok(reply) => parse_reply(&reply),
            Err(e) => {
                tracing::warn!(model = %settings.selected_model, error = %e, "AI analysis failed");
                AiAnalysisResult::failed(e.to_string())
            }
        };

        self.store(result.clone());
        self.loading.store(false, Ordering::SeqCst);
        result
    }

    async fn request(
        &self,
        settings: &Settings,
        left: &str,
        right: &str,
        similarity: &str,
        segments: &[SimilarSegment],
    ) -> Result<String, AnalysisError> {
        let prepared = build_request(settings, left, right, similarity, segments)?;
        tracing::debug!(model = prepared.model.id(), url = %prepared.url, "sending analysis request");

        let mut req = self.http.post(&prepared.url).json(&prepared.body);
        for (name, value) in &prepared.headers {
            req = req.header(*name, value);
        }
        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or_else(|_| json!({}));
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                body: body.to_string(),
            });
        }

        let json: Value = response.json().await?;
        prepared.model.extract_reply(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    type Seen = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

    /// Fake vendor answering every POST with `status` and `reply`.
    fn assert_single_json_content_type(headers: &HeaderMap) {
        let values: Vec<_> = headers.get_all("content-type").iter().collect();
        assert_eq!(values.len(), 1, "content-type sent {} times", values.len());
        assert_eq!(values[0], "application/json");
    }

    async fn spawn_vendor(status: StatusCode, reply: Value) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/v1/endpoint",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = recorder.clone();
                let reply = reply.clone();
                async move {
                    recorder.lock().unwrap().push((headers, body));
                    (status, Json(reply))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/endpoint", addr), seen)
    }

    fn settings(model: &str, key: &str, endpoint: &str) -> Settings {
        Settings {
            selected_model: model.to_string(),
            api_key: key.to_string(),
            api_endpoint: endpoint.to_string(),
            ..Settings::default()
        }
    }

    fn client() -> AnalysisClient {
        AnalysisClient::new(Duration::from_secs(5)).unwrap()
    }

    const REPLY: &str = "Overall the files overlap heavily.\n- Section 2 is copied\n-Tables match\nSuggestion: cite the source\nsuggestion:   rephrase section 2 \nunrelated line";

    #[test]
    fn reply_lines_are_split() {
        let res = parse_reply(REPLY);
        assert_eq!(res.summary, REPLY);
        assert_eq!(res.insights, vec!["Section 2 is copied", "Tables match"]);
        assert_eq!(res.suggestions, vec!["cite the source", "rephrase section 2"]);
        assert_eq!(res.error, None);
    }

    #[test]
    fn prompt_is_truncated_on_char_boundaries() {
        let left = "é".repeat(1500);
        let req = build_request(&settings("claude", "k", ""), &left, "short", "50.0%", &[]).unwrap();
        let content = req.body["messages"][0]["content"].as_str().unwrap();
        assert!(content.contains(&"é".repeat(PROMPT_TEXT_CHARS)));
        assert!(!content.contains(&"é".repeat(PROMPT_TEXT_CHARS + 1)));
        assert_eq!(req.url, AiModel::Claude.default_endpoint());
    }

    #[test]
    fn only_first_segments_are_sent() {
        let seg = |id| SimilarSegment {
            id,
            similarity: "100.0%".into(),
            similarity_value: 100.0,
            left_content: format!("segment-{}", id),
            right_content: format!("segment-{}", id),
            left_page: "word 1".into(),
            right_page: "word 1".into(),
            level: crate::models::SegmentLevel::High,
        };
        let segments: Vec<_> = (1..=5).map(seg).collect();
        let req = build_request(&settings("gpt-4", "k", ""), "l", "r", "9.0%", &segments).unwrap();
        let user = req.body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("Similar segments: 5"));
        assert!(user.contains("segment-3"));
        assert!(!user.contains("segment-4"));
        assert_eq!(req.body["model"], "gpt-4");
    }

    #[test]
    fn unsupported_model_fails_at_build() {
        let err = build_request(&settings("llama", "k", ""), "l", "r", "0.0%", &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedModel(ref m) if m == "llama"));
    }

    #[tokio::test]
    async fn missing_key_sends_nothing() {
        let (url, seen) = spawn_vendor(StatusCode::OK, json!({})).await;
        let client = client();
        let res = client
            .analyze(&settings("gpt-3.5", "   ", &url), "l", "r", "0.0%", &[])
            .await;
        assert!(res.insights.is_empty() && res.suggestions.is_empty());
        assert!(res.error.unwrap().contains("API key is not configured"));
        assert!(seen.lock().unwrap().is_empty());
        assert!(!client.is_loading());
    }

    #[tokio::test]
    async fn unsupported_model_sends_nothing() {
        let (url, seen) = spawn_vendor(StatusCode::OK, json!({})).await;
        let res = client()
            .analyze(&settings("mistral", "key", &url), "l", "r", "0.0%", &[])
            .await;
        assert_eq!(res.summary, "AI analysis failed");
        assert!(res.error.unwrap().contains("unsupported AI model"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn openai_round_trip() {
        let (url, seen) = spawn_vendor(
            StatusCode::OK,
            json!({ "choices": [ { "message": { "content": REPLY } } ] }),
        )
        .await;
        let client = client();
        let res = client
            .analyze(&settings("gpt-3.5", "sk-test", &url), "left", "right", "80.0%", &[])
            .await;
        assert_eq!(res.insights.len(), 2);
        assert_eq!(client.last_result(), res);

        let seen = seen.lock().unwrap();
        let (headers, body) = &seen[0];
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_single_json_content_type(headers);
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[tokio::test]
    async fn gemini_round_trip() {
        let (url, seen) = spawn_vendor(
            StatusCode::OK,
            json!({ "candidates": [ { "content": { "parts": [ { "text": "- one" } ] } } ] }),
        )
        .await;
        let res = client()
            .analyze(&settings("gemini", "g-key", &url), "l", "r", "1.0%", &[])
            .await;
        assert_eq!(res.insights, vec!["one"]);

        let seen = seen.lock().unwrap();
        let (headers, body) = &seen[0];
        assert_eq!(headers["authorization"], "Bearer g-key");
        assert_single_json_content_type(headers);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1000);
        assert!(body["contents"][0]["parts"][0]["text"].is_string());
    }

    #[tokio::test]
    async fn claude_round_trip() {
        let (url, seen) = spawn_vendor(
            StatusCode::OK,
            json!({ "content": [ { "type": "text", "text": "Suggestion: shorten" } ] }),
        )
        .await;
        let res = client()
            .analyze(&settings("claude", "c-key", &url), "l", "r", "1.0%", &[])
            .await;
        assert_eq!(res.suggestions, vec!["shorten"]);

        let seen = seen.lock().unwrap();
        let (headers, body) = &seen[0];
        assert_eq!(headers["x-api-key"], "c-key");
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
        assert!(headers.get("authorization").is_none());
        assert_single_json_content_type(headers);
        assert_eq!(body["model"], "claude-3-opus-20240229");
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let (url, _) = spawn_vendor(StatusCode::UNAUTHORIZED, json!({ "error": "bad key" })).await;
        let res = client()
            .analyze(&settings("gpt-4", "nope", &url), "l", "r", "1.0%", &[])
            .await;
        assert_eq!(
            res.error.as_deref(),
            Some(r#"API request failed: 401 Unauthorized - {"error":"bad key"}"#)
        );
        assert!(res.insights.is_empty());
    }

    #[tokio::test]
    async fn malformed_envelope_is_error() {
        let (url, _) = spawn_vendor(StatusCode::OK, json!({ "choices": [] })).await;
        let res = client()
            .analyze(&settings("gpt-4", "k", &url), "l", "r", "1.0%", &[])
            .await;
        assert!(res.error.unwrap().contains("OpenAI"));
    }
}
