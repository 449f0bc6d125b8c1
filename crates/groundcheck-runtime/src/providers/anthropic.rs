//! Anthropic Claude provider implementation.
//!
//! Rate-limited and transiently-failed requests are retried with
//! exponential backoff before the error reaches the circuit breaker.
//!
//! ## Security
//!
//! The API key lives in an [`ApiCredential`] and is exposed only at the
//! point where the HTTP header is set.

use super::{
    factory::ProviderFactory,
    secrets::ApiCredential,
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

impl AnthropicProvider {
    /// Create from an API key (stored securely, never logged).
    pub fn new(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: build_client(),
        }
    }

    /// Create from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Ok(Self::new(credential))
    }

    /// Create from JSON configuration with environment fallback.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        Ok(Self {
            credential,
            base_url,
            client: build_client(),
        })
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn complete_once(
        &self,
        request: &AnthropicRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, ProviderError> {
        // Credential exposed only here, at the point of use.
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let error_body = response
                .json::<AnthropicError>()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))?;

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_body.error.message,
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
                cache_creation_tokens: body.usage.cache_creation_input_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }
}

fn is_retryable(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::RateLimited { .. }
            | ProviderError::HttpError(_)
            | ProviderError::ApiError { status: 500..=599, .. }
    )
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    type_: String,
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    #[serde(rename = "type")]
    #[allow(dead_code)] // Required for deserialization, not read directly
    type_: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    #[allow(dead_code)] // Required for deserialization, not read directly
    type_: String,
    message: String,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let (system_msg, user_messages): (Option<String>, Vec<ChatMessage>) = {
            let mut system = None;
            let mut others = Vec::new();
            for msg in messages {
                if msg.role == "system" {
                    system = Some(msg.content);
                } else {
                    others.push(msg);
                }
            }
            (system, others)
        };

        let api_messages: Vec<AnthropicMessage> = user_messages
            .into_iter()
            .map(|msg| AnthropicMessage {
                role: msg.role,
                content: vec![ContentBlock::Text {
                    text: msg.content,
                    cache_control: if config.prompt_caching {
                        Some(CacheControl {
                            type_: "ephemeral".to_string(),
                        })
                    } else {
                        None
                    },
                }],
            })
            .collect();

        let request = AnthropicRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system: system_msg,
            messages: api_messages,
            temperature: if config.temperature == 0.0 {
                None
            } else {
                Some(config.temperature)
            },
        };

        (|| async { self.complete_once(&request, config.timeout).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(250))
                    .with_max_times(3),
            )
            .when(is_retryable)
            .notify(|err, dur| {
                tracing::warn!(error = %err, backoff = ?dur, "Retrying Anthropic request");
            })
            .await
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Factory for creating Anthropic providers from configuration.
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let provider = AnthropicProvider::from_config(config)?;
        Ok(Arc::new(provider))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": "claude-sonnet-4-5-20250514",
            "prompt_caching": true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::secrets::CredentialSource;

    fn provider_with_key(key: &str) -> AnthropicProvider {
        AnthropicProvider::new(ApiCredential::new(
            key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    #[test]
    fn test_provider_creation() {
        let provider = provider_with_key("test-key");
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-ant-REDACTED";
        let provider = provider_with_key(secret_key);

        let debug_output = format!("{:?}", provider);
        assert!(
            !debug_output.contains(secret_key),
            "API key was exposed in Debug output!"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_nonempty_key() {
        assert!(provider_with_key("sk-key").health_check().await);
        assert!(!provider_with_key("").health_check().await);
    }

    #[test]
    fn test_from_config_with_api_key() {
        let config = serde_json::json!({
            "api_key": "config-api-key",
            "base_url": "https://custom.api.com/v1"
        });

        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://custom.api.com/v1");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let factory = AnthropicProviderFactory;
        let config = serde_json::json!({
            "api_key": "test-key",
            "base_url": "invalid-url"
        });
        assert!(factory.validate_config(&config).is_err());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&ProviderError::RateLimited { retry_after: None }));
        assert!(is_retryable(&ProviderError::ApiError {
            status: 503,
            message: "overloaded".into()
        }));
        assert!(!is_retryable(&ProviderError::ApiError {
            status: 401,
            message: "bad key".into()
        }));
        assert!(!is_retryable(&ProviderError::ParseError("x".into())));
    }
}
