//! OpenAI-compatible `chat/completions` client.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use brainstorm_shared::{BrainstormError, InvokeError, ModelConfig, Persona, Result, TokenUsage};

use super::{Invocation, ModelInvoker};

/// Default timeout in seconds for one completion request.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("brainstorm/", env!("CARGO_PKG_VERSION"));

/// How much of an error body to quote back in messages.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Per-persona call spacing
// ---------------------------------------------------------------------------

/// Spaces successive calls for the same persona by `60s / max_rpm`.
#[derive(Debug, Default)]
struct Throttle {
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl Throttle {
    /// Reserve the next call slot for `key` and return how long to wait for it.
    fn reserve(&self, key: &str, max_rpm: u32, now: Instant) -> Duration {
        if max_rpm == 0 {
            return Duration::ZERO;
        }
        let interval = Duration::from_secs(60) / max_rpm;
        let mut slots = self
            .next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = slots
            .get(key)
            .copied()
            .filter(|s| *s > now)
            .unwrap_or(now);
        slots.insert(key.to_string(), slot + interval);
        slot - now
    }
}

// ---------------------------------------------------------------------------
// Invoker
// ---------------------------------------------------------------------------

/// Calls `{base_url}/chat/completions` with bearer auth. Performs no retries.
#[derive(Debug)]
pub struct HttpModelInvoker {
    client: Client,
    throttle: Throttle,
}

impl HttpModelInvoker {
    /// Invoker with the default request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| BrainstormError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            throttle: Throttle::default(),
        })
    }
}

#[async_trait]
impl ModelInvoker for HttpModelInvoker {
    #[instrument(skip_all, fields(persona = %persona.name, model = %model.model_id))]
    async fn invoke(
        &self,
        persona: &Persona,
        payload: &str,
        model: &ModelConfig,
    ) -> std::result::Result<Invocation, InvokeError> {
        let wait = self
            .throttle
            .reserve(&persona.key, persona.constraints.max_rpm, Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "respecting persona rate ceiling");
            tokio::time::sleep(wait).await;
        }

        let url = format!(
            "{}/chat/completions",
            model.base_url.as_str().trim_end_matches('/')
        );
        let system = persona.system_prompt();
        let request = ChatRequest {
            model: &model.model_id,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: payload,
                },
            ],
            temperature: model.temperature,
            top_p: model.top_p,
        };

        debug!(%url, payload_len = payload.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&model.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| InvokeError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InvokeError::Transport(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            InvokeError::Transport(format!("invalid completion response: {e} (got: {})", preview(&body)))
        })?;

        let output_text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InvokeError::Transport("completion response had no choices".into()))?
            .message
            .content
            .unwrap_or_default();
        let usage = parsed.usage.unwrap_or_default();

        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "completion received"
        );

        Ok(Invocation { output_text, usage })
    }
}

/// Map a non-success HTTP status to an invoker error class.
fn classify_status(status: StatusCode, body: &str) -> InvokeError {
    let detail = format!("HTTP {status}: {}", preview(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InvokeError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => InvokeError::RateLimit(detail),
        s if s.is_client_error() => InvokeError::Validation(detail),
        _ => InvokeError::Transport(detail),
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
