//! Chat completion client for answering questions.

use super::LlmError;
use crate::config::{CHAT_MODEL, CHAT_TEMPERATURE};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};

/// System role given to the model for every answer.
pub const SYSTEM_PROMPT: &str = "You are a knowledgeable Quantified Ante trading assistant. \
     Only use information explicitly stated in the provided context.";

/// Compose the grounded user prompt for one question.
#[must_use]
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a knowledgeable Quantified Ante trading assistant. \
         Answer the question based on the following context.\n\
         Be specific and cite concepts from the context. If something isn't \
         explicitly mentioned in the context, don't make assumptions.\n\n\
         Context: {context}\n\n\
         Question: {question}\n\n\
         Please provide a detailed answer using only information found in the context above."
    )
}

fn build_messages(
    context: &str,
    question: &str,
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    Ok(vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(build_user_prompt(context, question))
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into(),
    ])
}

/// OpenAI chat client that answers questions grounded in retrieved context.
pub struct ChatClient {
    client: Client<OpenAIConfig>,
}

impl ChatClient {
    /// Create a client for the OpenAI API.
    #[must_use]
    pub fn new(api_key: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
        }
    }

    /// Answer `question` using only the supplied `context`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::ApiError` when the API call fails or the response
    /// comes back empty, `LlmError::Unknown` when the request cannot be built.
    pub async fn answer(&self, context: &str, question: &str) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(CHAT_MODEL)
            .messages(build_messages(context, question)?)
            .temperature(CHAT_TEMPERATURE)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))
    }
}
