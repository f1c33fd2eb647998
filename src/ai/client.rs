use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::error::AppError;

/// A text-in, text-out chat completion provider.
///
/// Abstracted as a trait so handlers can be tested without network access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send one system + user exchange and return the reply text.
    async fn complete(&self, system: &str, prompt: &str, max_tokens: u32)
        -> Result<String, AppError>;
}

/// OpenAI chat completions via `async-openai`.
pub struct OpenAiCompletionService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompletionService {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .max_completion_tokens(max_tokens)
            .messages([
                ChatCompletionRequestSystemMessage::from(system).into(),
                ChatCompletionRequestUserMessage::from(prompt).into(),
            ])
            .build()
            .map_err(|e| AppError::Ai(format!("Could not build completion request: {e}")))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::Ai(format!("Completion request failed: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::Ai("Completion returned no content".into()))
    }
}
