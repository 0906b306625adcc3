//! services/api/src/adapters/analysis_llm.rs
//!
//! This module contains the adapter for the email analysis LLM.
//! It implements the `EmailAnalysisService` port from the `core` crate against
//! any OpenAI-compatible chat completion endpoint (OpenAI itself, or Gemini
//! through its compatibility layer).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use mail_triage_core::{
    domain::Category,
    ports::{EmailAnalysisService, PortError, PortResult},
};

use crate::config::AiSettings;

const CLASSIFY_INSTRUCTIONS: &str = "You sort incoming work email. Classify the email as \
'Productive' if it needs an action or a reply (a request, a question, a status update on \
ongoing work, a support case) or as 'Unproductive' if it does not (greetings, thanks, \
congratulations, chit-chat, spam). Answer with exactly one word: Productive or Unproductive.";

const REPLY_INSTRUCTIONS: &str = "You draft replies to work email. Write a short, professional \
reply to the email you are given, in the same language as the email. Output only the reply \
text, with no preamble, no subject line and no placeholders.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `EmailAnalysisService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnalysisAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnalysisAdapter {
    /// Creates a new `OpenAiAnalysisAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds the client from the configured credentials and endpoint.
    pub fn from_settings(settings: &AiSettings) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(settings.api_key.clone());
        if let Some(api_base) = &settings.api_base {
            openai_config = openai_config.with_api_base(api_base.clone());
        }
        Self::new(Client::with_config(openai_config), settings.model.clone())
    }

    /// Sends one system + user exchange and returns the first choice's text.
    async fn complete(&self, instructions: &str, prompt: String, max_tokens: u32) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instructions)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(max_tokens)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                PortError::Unexpected("Analysis LLM response contained no text content.".to_string())
            })
    }
}

//=========================================================================================
// `EmailAnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmailAnalysisService for OpenAiAnalysisAdapter {
    async fn classify_email(&self, text: &str) -> PortResult<String> {
        self.complete(CLASSIFY_INSTRUCTIONS, format!("EMAIL:\n\"\"\"\n{}\n\"\"\"", text), 10)
            .await
    }

    async fn suggest_reply(&self, text: &str, category: Category) -> PortResult<String> {
        let prompt = format!(
            "The following email was classified as '{}'. Based on its content, suggest a reply.\n\nEMAIL:\n\"\"\"\n{}\n\"\"\"",
            category, text
        );
        self.complete(REPLY_INSTRUCTIONS, prompt, 300).await
    }
}
