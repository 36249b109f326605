use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::generator::TextGenerator;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Base url of an OpenAI compatible api, without the `/chat/completions` suffix.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    /// `None` keeps the http client's default behaviour.
    pub timeout: Option<Duration>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            timeout: None,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize, Debug)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for a hosted chat-completions model.
pub struct ChatCompletions {
    agent: ureq::Agent,
    config: ChatConfig,
}

impl ChatCompletions {
    pub fn new(config: ChatConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Self {
            agent: builder.build(),
            config,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

impl TextGenerator for ChatCompletions {
    fn complete(&mut self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(GenerationError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            stream: false,
        };

        let url = self.url();

        tracing::debug!(%url, model = %self.config.model, "requesting completion");

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(&request);

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();

                return Err(match status {
                    401 | 403 => GenerationError::Unauthorized { status, body },
                    _ => GenerationError::Endpoint { status, body },
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(GenerationError::Unreachable(transport.to_string()))
            }
        };

        let body = response
            .into_string()
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        parse_completion(&body)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(GenerationError::EmptyCompletion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "SELECT COUNT(*) FROM DATA;"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        }"#;

        assert_eq!(parse_completion(body).unwrap(), "SELECT COUNT(*) FROM DATA;");
    }

    #[test]
    fn missing_choices_is_empty() {
        assert!(matches!(
            parse_completion(r#"{"choices": []}"#),
            Err(GenerationError::EmptyCompletion)
        ));
        assert!(matches!(
            parse_completion(r#"{"choices": [{"message": {"role": "assistant"}}]}"#),
            Err(GenerationError::EmptyCompletion)
        ));
    }

    #[test]
    fn garbage_body_is_malformed() {
        assert!(matches!(
            parse_completion("<html>bad gateway</html>"),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let mut client = ChatCompletions::new(ChatConfig::default());
        assert!(matches!(
            client.complete("hi"),
            Err(GenerationError::MissingApiKey)
        ));
    }

    #[test]
    fn unreachable_endpoint() {
        let mut client = ChatCompletions::new(ChatConfig {
            endpoint: "http://127.0.0.1:1/v1/".to_string(),
            api_key: Some("key".to_string()),
            timeout: Some(Duration::from_secs(5)),
            ..ChatConfig::default()
        });

        assert!(matches!(
            client.complete("hi"),
            Err(GenerationError::Unreachable(_))
        ));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = ChatCompletions::new(ChatConfig {
            endpoint: "http://localhost:8080/v1/".to_string(),
            ..ChatConfig::default()
        });
        assert_eq!(client.url(), "http://localhost:8080/v1/chat/completions");
    }
}
