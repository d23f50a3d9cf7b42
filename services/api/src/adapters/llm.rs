//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the study-material LLM.
//! It implements the `LanguageModelService` port from the `core` crate against any
//! OpenAI-compatible chat completions endpoint (Gemini by default).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use study_kit_core::{
    ports::{LanguageModelService, PortError, PortResult},
    ChatRole, ChatTurn,
};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LanguageModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiStudyAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiStudyAdapter {
    /// Creates a new `OpenAiStudyAdapter` from an existing client.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds a client for `api_base` authenticated with `api_key`.
    pub fn with_key(api_key: &SecretString, api_base: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(api_base);
        Self::new(Client::with_config(config), model.to_string())
    }

    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        json_output: bool,
    ) -> PortResult<String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages).n(1);
        if json_output {
            args.response_format(ResponseFormat::JsonObject);
        }
        let request = args
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        first_choice_text(response)
    }
}

fn map_openai_error(e: OpenAIError) -> PortError {
    match &e {
        OpenAIError::ApiError(api) if is_auth_failure(&api.message) => PortError::Unauthorized,
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn is_auth_failure(message: &str) -> bool {
    message.contains("API key not valid") || message.contains("Incorrect API key")
}

/// Extracts the text content from the first choice in the response.
fn first_choice_text(response: CreateChatCompletionResponse) -> PortResult<String> {
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        PortError::Unexpected("LLM returned no choices in its response.".to_string())
    })?;
    choice.message.content.ok_or_else(|| {
        PortError::Unexpected("LLM response contained no text content.".to_string())
    })
}

/// Maps a stored chat turn to a request message. Error turns carry no content
/// and are skipped.
fn to_request_message(turn: &ChatTurn) -> PortResult<Option<ChatCompletionRequestMessage>> {
    let Some(text) = turn.content() else {
        return Ok(None);
    };
    let message = match turn.role {
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatRole::Model => ChatCompletionRequestAssistantMessageArgs::default()
            .content(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    };
    Ok(Some(message))
}

//=========================================================================================
// `LanguageModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModelService for OpenAiStudyAdapter {
    async fn generate(&self, prompt: &str, json_output: bool) -> PortResult<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);
        if json_output {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content("Respond with a single valid JSON object and nothing else.")
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        debug!("Sending generation prompt ({} chars)", prompt.chars().count());
        self.complete(messages, json_output).await
    }

    async fn chat(&self, turns: &[ChatTurn]) -> PortResult<String> {
        let mut messages = Vec::with_capacity(turns.len());
        for turn in turns {
            if let Some(message) = to_request_message(turn)? {
                messages.push(message);
            }
        }
        if messages.is_empty() {
            return Err(PortError::InvalidInput(
                "A chat needs at least one message.".to_string(),
            ));
        }

        debug!("Sending chat with {} turns", messages.len());
        self.complete(messages, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_turns_map_to_matching_roles() {
        let user = to_request_message(&ChatTurn::user("hi")).unwrap().unwrap();
        let model = to_request_message(&ChatTurn::model("hello")).unwrap().unwrap();

        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));
        assert!(matches!(model, ChatCompletionRequestMessage::Assistant(_)));
    }

    #[test]
    fn error_turns_are_skipped() {
        let turn = ChatTurn::model_error("Sorry");
        assert!(to_request_message(&turn).unwrap().is_none());
    }

    #[test]
    fn invalid_key_messages_are_recognised() {
        assert!(is_auth_failure("API key not valid. Please pass a valid API key."));
        assert!(!is_auth_failure("quota exceeded"));
    }

    #[tokio::test]
    async fn empty_chat_is_rejected_without_a_request() {
        let adapter = OpenAiStudyAdapter::with_key(
            &SecretString::from("test-key".to_string()),
            "http://127.0.0.1:9",
            "gemini-2.5-flash",
        );
        let result = adapter.chat(&[ChatTurn::model_error("x")]).await;
        assert!(matches!(result, Err(PortError::InvalidInput(_))));
    }
}
