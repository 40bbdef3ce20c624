//! Hosted chat-completion backends for SOAP note generation.
//!
//! The provider set is a closed enum; each variant maps to one backend
//! adapter satisfying [`GenerationBackend`]. Credentials are injected at
//! backend construction, so tests can substitute a fake backend without
//! touching the process environment. Transport and auth failures are never
//! retried: they propagate and abort the run.

use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::prompt::render_prompt;

const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Provider {
    Openai,
    Anthropic,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl FromStr for Provider {
    type Err = BackendError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(BackendError::UnsupportedProvider {
                provider: other.to_string(),
            }),
        }
    }
}

/// Generation settings, constructed once per run and shared read-only
/// across all per-example calls.
#[derive(Debug, Clone)]
pub struct GenConfig {
    pub provider: Provider,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("missing credential: environment variable {variable} is not set")]
    MissingCredential { variable: &'static str },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: ureq::Error,
    },

    #[error("{provider} returned a malformed response: {reason}")]
    MalformedResponse {
        provider: &'static str,
        reason: String,
    },
}

/// One synchronous chat-style completion call.
pub trait GenerationBackend {
    fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, BackendError>;
}

/// Build the backend adapter for the configured provider, reading its API
/// key from the environment.
pub fn backend_from_env(cfg: &GenConfig) -> Result<Box<dyn GenerationBackend>, BackendError> {
    match cfg.provider {
        Provider::Openai => Ok(Box::new(OpenAiBackend::from_env(&cfg.model)?)),
        Provider::Anthropic => Ok(Box::new(AnthropicBackend::from_env(&cfg.model)?)),
    }
}

/// Render the prompt for `dialogue` and issue one completion call.
pub fn generate_note(
    dialogue: &str,
    cfg: &GenConfig,
    backend: &dyn GenerationBackend,
) -> Result<String, BackendError> {
    let prompt = render_prompt(dialogue);
    backend.complete(&prompt.system, &prompt.user, cfg.temperature, cfg.max_tokens)
}

pub struct OpenAiBackend {
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env(model: &str) -> Result<Self, BackendError> {
        let api_key =
            std::env::var(OPENAI_API_KEY_VAR).map_err(|_| BackendError::MissingCredential {
                variable: OPENAI_API_KEY_VAR,
            })?;
        Ok(Self::new(model, api_key))
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

impl GenerationBackend for OpenAiBackend {
    fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, BackendError> {
        let request = OpenAiChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        debug!(model = %self.model, "sending openai chat completion");
        let mut response = ureq::post(OPENAI_CHAT_COMPLETIONS_URL)
            .header("authorization", &format!("Bearer {}", self.api_key))
            .send_json(&request)
            .map_err(|source| BackendError::Transport {
                provider: "openai",
                source,
            })?;

        let parsed: OpenAiChatResponse =
            response
                .body_mut()
                .read_json()
                .map_err(|source| BackendError::Transport {
                    provider: "openai",
                    source,
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::MalformedResponse {
                provider: "openai",
                reason: "missing choices[0].message.content".to_string(),
            })
    }
}

pub struct AnthropicBackend {
    model: String,
    api_key: String,
}

impl AnthropicBackend {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env(model: &str) -> Result<Self, BackendError> {
        let api_key =
            std::env::var(ANTHROPIC_API_KEY_VAR).map_err(|_| BackendError::MissingCredential {
                variable: ANTHROPIC_API_KEY_VAR,
            })?;
        Ok(Self::new(model, api_key))
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessagesResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

impl GenerationBackend for AnthropicBackend {
    fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, BackendError> {
        let request = AnthropicMessagesRequest {
            model: &self.model,
            max_tokens,
            temperature,
            system,
            messages: vec![ChatMessage {
                role: "user",
                content: user,
            }],
        };

        debug!(model = %self.model, "sending anthropic message request");
        let mut response = ureq::post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send_json(&request)
            .map_err(|source| BackendError::Transport {
                provider: "anthropic",
                source,
            })?;

        let parsed: AnthropicMessagesResponse =
            response
                .body_mut()
                .read_json()
                .map_err(|source| BackendError::Transport {
                    provider: "anthropic",
                    source,
                })?;

        // The API returns a sequence of content blocks; concatenate the
        // text ones into a plain string.
        Ok(concat_text_blocks(&parsed.content))
    }
}

fn concat_text_blocks(blocks: &[AnthropicContentBlock]) -> String {
    blocks
        .iter()
        .filter(|block| block.kind.as_deref().unwrap_or("text") == "text")
        .filter_map(|block| block.text.as_deref())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_recognized_values() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::Openai);
        assert_eq!(
            "anthropic".parse::<Provider>().unwrap(),
            Provider::Anthropic
        );
    }

    #[test]
    fn provider_rejects_unrecognized_values() {
        let err = "cohere".parse::<Provider>().unwrap_err();
        assert!(matches!(
            err,
            BackendError::UnsupportedProvider { provider } if provider == "cohere"
        ));
    }

    #[test]
    fn openai_request_carries_both_messages() {
        let request = OpenAiChatRequest {
            model: "gpt-4o-mini",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "usr",
                },
            ],
            temperature: 0.2,
            max_tokens: 512,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "usr");
        assert_eq!(value["max_tokens"], 512);
    }

    #[test]
    fn anthropic_request_puts_system_at_top_level() {
        let request = AnthropicMessagesRequest {
            model: "claude-3-5-sonnet-latest",
            max_tokens: 512,
            temperature: 0.2,
            system: "sys",
            messages: vec![ChatMessage {
                role: "user",
                content: "usr",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system"], "sys");
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn anthropic_text_blocks_are_concatenated() {
        let parsed: AnthropicMessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"S: chest pain\n"},{"type":"tool_use"},{"type":"text","text":"O: afebrile"}]}"#,
        )
        .unwrap();
        assert_eq!(
            concat_text_blocks(&parsed.content),
            "S: chest pain\nO: afebrile"
        );
    }
}
