//! Core types and the rate-limited chat-completion sampler

use crate::error::{MgsmEvalError, Result};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Default base URL for the completion API
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Fallback wait when a rate-limit message cannot be parsed
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Floor for any rate-limit wait
const MIN_WAIT: Duration = Duration::from_secs(1);

/// Image reference in a content part
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multi-part message content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: &str) -> Self {
        ContentPart::Text {
            text: text.to_string(),
        }
    }

    /// Wrap an already-encoded image as a data URL part
    pub fn image(encoded: &str, format: &str, encoding: &str) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/{};{},{}", format, encoding, encoded),
            },
        }
    }
}

/// Message content: plain text or tagged parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Chat message in the OpenAI wire format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: &str, content: MessageContent) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new("user", MessageContent::Text(text.to_string()))
    }

    pub fn system(text: &str) -> Self {
        Self::new("system", MessageContent::Text(text.to_string()))
    }

    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self::new("user", MessageContent::Parts(parts))
    }
}

/// Bounded retry policy for the sampler
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Sampler configuration, bound at construction and never mutated
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub retry: RetryPolicy,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.5,
            max_tokens: 7999,
            api_key: None,
            timeout_seconds: 120,
            retry: RetryPolicy::default(),
        }
    }
}

impl SamplerConfig {
    /// Default config with the API key taken from the environment.
    /// Absence is not validated here; it surfaces as an auth failure
    /// on the first call.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok(),
            ..Self::default()
        }
    }
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

/// Chat completion response body
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Extract a structured retry-after duration from a 429 response body.
///
/// The body (or the `error.message` field of the JSON error object inside
/// it) carries a human-readable "...Please try again in <float>s...."
/// message. Returns `None` when the marker is absent or the number is
/// malformed or negative.
pub fn retry_after_from_body(body: &str) -> Option<Duration> {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.to_string());

    let tail = message.split("Please try again in ").nth(1)?;
    let seconds: f64 = tail.split("s.").next()?.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

/// Wait to apply for a rate-limited response: parsed retry-after,
/// 60s fallback, floored at 1s.
pub fn rate_limit_wait(body: &str) -> Duration {
    retry_after_from_body(body)
        .unwrap_or(DEFAULT_RETRY_AFTER)
        .max(MIN_WAIT)
}

fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..=1.0);
    delay.mul_f64(factor)
}

/// Sampler wrapping a remote chat-completion call with bounded retry on
/// rate-limit and transient errors.
pub struct ChatCompletionSampler {
    client: Client,
    config: SamplerConfig,
    url: String,
}

impl ChatCompletionSampler {
    pub fn new(config: SamplerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );

        Ok(Self {
            client,
            config,
            url,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Send the message sequence and return the first choice's text.
    ///
    /// Rate-limited responses sleep for the server-suggested duration and
    /// retry; other failures retry after an exponential backoff with
    /// jitter. After `retry.max_attempts` failures the last error is
    /// surfaced as `RetriesExhausted`.
    pub async fn sample(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut backoff = self.config.retry.base_delay;
        let mut wait: Option<Duration> = None;
        let mut last_error = String::new();

        for attempt in 1..=self.config.retry.max_attempts {
            if let Some(delay) = wait.take() {
                sleep(delay).await;
            }

            let mut req = self.client.post(&self.url).json(&request);
            if let Some(ref api_key) = self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatCompletionResponse = response.json().await?;
                        return body
                            .choices
                            .into_iter()
                            .next()
                            .map(|choice| choice.message.content)
                            .ok_or_else(|| {
                                MgsmEvalError::ApiError("No choices in response".to_string())
                            });
                    }

                    let body = response.text().await.unwrap_or_default();

                    if status.as_u16() == 429 {
                        let delay = rate_limit_wait(&body);
                        warn!(
                            attempt,
                            wait_seconds = delay.as_secs_f64(),
                            "Rate limit reached, waiting before retrying"
                        );
                        last_error = format!("HTTP 429: {}", body);
                        wait = Some(delay);
                        continue;
                    }

                    last_error = format!("HTTP {}: {}", status, body);
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            error!(attempt, error = %last_error, "Unexpected completion error");
            wait = Some(jittered(backoff));
            backoff = std::cmp::min(backoff * 2, self.config.retry.max_delay);
        }

        Err(MgsmEvalError::RetriesExhausted(
            self.config.retry.max_attempts,
            last_error,
        ))
    }
}

/// One scored example from an eval run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSample {
    pub language: String,
    pub prompt: String,
    pub response: String,
    pub extracted_answer: String,
    pub target: String,
    pub correct: bool,
}

/// Result from running one (sampler, eval) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub score: f64,
    pub metrics: BTreeMap<String, f64>,
    pub samples: Vec<ScoredSample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_from_plain_message() {
        let wait = retry_after_from_body("Rate limit exceeded. Please try again in 12.5s. Bye.");
        assert_eq!(wait, Some(Duration::from_secs_f64(12.5)));
    }

    #[test]
    fn test_retry_after_from_json_error_body() {
        let body = serde_json::json!({
            "error": {
                "message": "Rate limit reached for model. Please try again in 7.66s. Visit the docs.",
                "type": "tokens",
                "code": "rate_limit_exceeded"
            }
        })
        .to_string();
        let wait = retry_after_from_body(&body);
        assert_eq!(wait, Some(Duration::from_secs_f64(7.66)));
    }

    #[test]
    fn test_retry_after_missing_marker() {
        assert_eq!(retry_after_from_body("Too many requests"), None);
        assert_eq!(retry_after_from_body(""), None);
    }

    #[test]
    fn test_retry_after_malformed_number() {
        assert_eq!(
            retry_after_from_body("Please try again in soons. Thanks."),
            None
        );
        assert_eq!(
            retry_after_from_body("Please try again in -5s."),
            None
        );
    }

    #[test]
    fn test_rate_limit_wait_defaults_to_sixty() {
        assert_eq!(rate_limit_wait("no marker here"), Duration::from_secs(60));
    }

    #[test]
    fn test_rate_limit_wait_clamped_to_minimum() {
        assert_eq!(
            rate_limit_wait("Please try again in 0.3s."),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_rate_limit_wait_passes_through_parsed_value() {
        assert_eq!(
            rate_limit_wait("Please try again in 2.5s."),
            Duration::from_secs_f64(2.5)
        );
    }

    #[test]
    fn test_jittered_stays_in_range() {
        let delay = Duration::from_secs(4);
        for _ in 0..100 {
            let j = jittered(delay);
            assert!(j >= Duration::from_secs(2));
            assert!(j <= delay);
        }
    }

    #[test]
    fn test_plain_text_message_serialization() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn test_multipart_message_serialization() {
        let msg = ChatMessage::user_with_parts(vec![
            ContentPart::text("describe this"),
            ContentPart::image("abc123", "png", "base64"),
        ]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "describe this");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/png;base64,abc123"
        );
    }

    #[test]
    fn test_sampler_config_defaults() {
        let config = SamplerConfig::default();
        assert_eq!(config.model, "llama-3.1-8b-instant");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 7999);
        assert_eq!(config.retry.max_attempts, 8);
    }

    #[test]
    fn test_sampler_url_strips_trailing_slash() {
        let config = SamplerConfig {
            base_url: "http://localhost:9999/v1/".to_string(),
            ..SamplerConfig::default()
        };
        let sampler = ChatCompletionSampler::new(config).unwrap();
        assert_eq!(sampler.url, "http://localhost:9999/v1/chat/completions");
    }
}
