//! Model invocation: send the extraction prompt and return the reply text.
//!
//! The client is a sum type: [`ModelClient::Ready`] wraps a text generator,
//! [`ModelClient::Unconfigured`] records why none could be built (usually a
//! missing API key). Analysis still runs in the unconfigured case; it just
//! ends in an error-tagged result instead of a network call.
//!
//! ## Retry Strategy
//!
//! Provider errors (429, 503, timeouts) are usually transient. The client
//! makes up to `max_attempts` calls; after failed attempt `k` it sleeps
//! `backoff_unit_ms * 2^(k-1)` before the next one, so the defaults
//! (3 attempts, 1 s unit) wait 1 s then 2 s. The sleep is
//! `tokio::time::sleep` and holds only the calling request.

use crate::config::AnalyzerConfig;
use crate::error::BeawareError;
use crate::progress::{AnalysisProgress, NoopProgress};
use crate::prompts::CONNECTION_TEST_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Per-call model options. Each field defaults from [`AnalyzerConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    pub backoff_unit_ms: u64,
}

impl InvocationOptions {
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
            max_attempts: config.max_retries.max(1),
            backoff_unit_ms: config.retry_backoff_ms,
        }
    }
}

/// One prompt in, one reply out. The seam between retry logic and the
/// provider SDK; tests substitute scripted generators.
pub trait TextGenerator: Send + Sync {
    /// Run one attempt. The error is a human-readable provider message.
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a InvocationOptions,
    ) -> BoxFuture<'a, Result<String, String>>;
}

/// [`TextGenerator`] backed by an `edgequake_llm` provider.
pub struct LlmGenerator {
    provider_name: String,
    default_model: String,
    provider: Arc<dyn LLMProvider>,
}

impl LlmGenerator {
    pub fn new(
        provider_name: impl Into<String>,
        default_model: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            default_model: default_model.into(),
            provider,
        }
    }

    /// The provider for `model`; a per-call override builds a fresh one.
    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, String> {
        if model == self.default_model {
            return Ok(Arc::clone(&self.provider));
        }
        ProviderFactory::create_llm_provider(&self.provider_name, model).map_err(|e| e.to_string())
    }
}

impl TextGenerator for LlmGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a InvocationOptions,
    ) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let provider = self.provider_for(&options.model)?;
            let messages = vec![ChatMessage::user(prompt)];
            let completion = CompletionOptions {
                temperature: Some(options.temperature),
                max_tokens: Some(options.max_tokens),
                ..Default::default()
            };

            let call = provider.chat(&messages, Some(&completion));
            match timeout(Duration::from_secs(options.timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    Ok(response.content)
                }
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("request timed out after {}s", options.timeout_secs)),
            }
        })
    }
}

/// Model client shared by every request.
#[derive(Clone)]
pub enum ModelClient {
    Ready {
        generator: Arc<dyn TextGenerator>,
        defaults: InvocationOptions,
    },
    Unconfigured {
        provider: String,
        hint: String,
    },
}

/// Outcome of [`ModelClient::test_connection`].
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelClient {
    /// Build the client from configuration.
    ///
    /// Resolution order:
    /// 1. `config.provider` (pre-constructed, e.g. in tests)
    /// 2. `config.provider_name`, if its credential variable is set
    ///
    /// Never fails: a missing credential yields [`ModelClient::Unconfigured`].
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let defaults = InvocationOptions::from_config(config);

        if let Some(ref provider) = config.provider {
            let generator = LlmGenerator::new(
                config.provider_name.clone(),
                config.model.clone(),
                Arc::clone(provider),
            );
            return Self::ready(Arc::new(generator), defaults);
        }

        let name = config.provider_name.as_str();
        if let Some(var) = credential_var(name) {
            let present = std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false);
            if !present {
                warn!("{} not set. LLM calls will fail until configured.", var);
                return Self::Unconfigured {
                    provider: name.to_string(),
                    hint: format!("Set {var} in environment."),
                };
            }
        }

        match ProviderFactory::create_llm_provider(name, &config.model) {
            Ok(provider) => {
                info!("LLM client configured: {}/{}", name, config.model);
                let generator = LlmGenerator::new(name, config.model.clone(), provider);
                Self::ready(Arc::new(generator), defaults)
            }
            Err(e) => {
                warn!("Failed to configure LLM provider '{}': {}", name, e);
                Self::Unconfigured {
                    provider: name.to_string(),
                    hint: e.to_string(),
                }
            }
        }
    }

    pub fn ready(generator: Arc<dyn TextGenerator>, defaults: InvocationOptions) -> Self {
        Self::Ready {
            generator,
            defaults,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Default options, if configured.
    pub fn defaults(&self) -> Option<&InvocationOptions> {
        match self {
            Self::Ready { defaults, .. } => Some(defaults),
            Self::Unconfigured { .. } => None,
        }
    }

    /// Invoke with the configured defaults.
    pub async fn invoke(
        &self,
        prompt: &str,
        progress: &dyn AnalysisProgress,
    ) -> Result<String, BeawareError> {
        match self {
            Self::Ready { defaults, .. } => self.invoke_with(prompt, defaults, progress).await,
            Self::Unconfigured { provider, hint } => Err(BeawareError::ModelUnavailable {
                provider: provider.clone(),
                hint: hint.clone(),
            }),
        }
    }

    /// Invoke with explicit options, retrying with exponential backoff.
    ///
    /// Returns the trimmed reply of the first successful attempt.
    pub async fn invoke_with(
        &self,
        prompt: &str,
        options: &InvocationOptions,
        progress: &dyn AnalysisProgress,
    ) -> Result<String, BeawareError> {
        let generator = match self {
            Self::Ready { generator, .. } => generator,
            Self::Unconfigured { provider, hint } => {
                return Err(BeawareError::ModelUnavailable {
                    provider: provider.clone(),
                    hint: hint.clone(),
                })
            }
        };

        let max_attempts = options.max_attempts.max(1);
        let start = Instant::now();
        let mut last_err = String::from("Unknown error");

        for attempt in 1..=max_attempts {
            info!(
                "LLM request (attempt {}/{}) model={}",
                attempt, max_attempts, options.model
            );
            progress.on_model_attempt(attempt, max_attempts);

            match generator.generate(prompt, options).await {
                Ok(text) => {
                    let text = text.trim().to_string();
                    info!(
                        "LLM returned result (length={}, {:?})",
                        text.chars().count(),
                        start.elapsed()
                    );
                    return Ok(text);
                }
                Err(e) => {
                    warn!("LLM attempt {} failed: {}", attempt, e);
                    last_err = e;
                }
            }

            if attempt < max_attempts {
                let wait = backoff_delay(options.backoff_unit_ms, attempt);
                debug!("Waiting {:?} before retry", wait);
                sleep(wait).await;
            }
        }

        Err(BeawareError::ModelCallFailed {
            attempts: max_attempts,
            last_error: last_err,
        })
    }

    /// Send a trivial prompt and report whether the model answered.
    pub async fn test_connection(&self) -> ConnectionTest {
        let Self::Ready { defaults, .. } = self else {
            return ConnectionTest {
                success: false,
                response: None,
                error: Some("LLM client not configured".to_string()),
            };
        };

        let options = InvocationOptions {
            max_tokens: 50,
            timeout_secs: 10,
            ..defaults.clone()
        };
        match self
            .invoke_with(CONNECTION_TEST_PROMPT, &options, &NoopProgress)
            .await
        {
            Ok(response) => ConnectionTest {
                success: true,
                response: Some(response),
                error: None,
            },
            Err(e) => ConnectionTest {
                success: false,
                response: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Sleep before attempt `attempt + 1`, given 1-indexed failed `attempt`.
pub fn backoff_delay(unit_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(unit_ms.saturating_mul(factor))
}

/// Environment variable holding the API key for a provider, if it needs one.
pub fn credential_var(provider: &str) -> Option<&'static str> {
    match provider {
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        _ => None,
    }
}
