//! Chat-completions client for emoji suggestions.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{HttpConfig, LlmConfig};
use crate::{AppError, Result};

use super::{parse_emoji_reply, EmojiSuggester, SuggestFuture};

fn system_prompt(count: usize) -> String {
    format!(
        "You are an intelligent assistant. You respond to every message with a single line \
         of exactly {count} unique emojis, formatted for Slack as :name:. The emojis should \
         represent things mentioned in the message, with at most one emoji expressing \
         sentiment. Text surrounded by ~ or a line that starts with a negative emoji such as \
         :no_pedestrians: describes something that was not done; leave those lines out. If \
         the message expresses deep sadness or high stress, use :people_hugging: to offer \
         comfort instead of something more specific to that part of the text. Prefer \
         ungendered emojis, for example :cook: over :female-cook: or :male-cook:."
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// [`EmojiSuggester`] backed by an OpenAI-compatible `/chat/completions` API.
pub struct OpenAiEmojiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    emoji_count: usize,
}

impl OpenAiEmojiClient {
    /// Build a client from config. Returns `Ok(None)` when no API key is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Llm` if the HTTP client cannot be built.
    pub fn from_config(llm: &LlmConfig, http: &HttpConfig) -> Result<Option<Self>> {
        let Some(api_key) = llm.api_key.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(http.timeout())
            .build()
            .map_err(|err| AppError::Llm(format!("failed to init http client: {err}")))?;

        Ok(Some(Self {
            http: client,
            endpoint: format!("{}/chat/completions", llm.api_base.trim_end_matches('/')),
            api_key,
            model: llm.model.clone(),
            emoji_count: llm.emoji_count,
        }))
    }

    async fn complete(&self, text: &str) -> Result<String> {
        let prompt = system_prompt(self.emoji_count);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| AppError::Llm(format!("chat completion request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!(
                "chat completion returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| AppError::Llm(format!("chat completion reply unreadable: {err}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm("chat completion returned no content".into()))
    }
}

impl EmojiSuggester for OpenAiEmojiClient {
    fn suggest<'a>(&'a self, text: &'a str, limit: usize) -> SuggestFuture<'a> {
        Box::pin(async move {
            let reply = self.complete(text).await?;
            debug!(reply = %reply, "emoji reply received");
            let names = parse_emoji_reply(&reply, limit);
            info!(count = names.len(), model = %self.model, "emoji suggested");
            Ok(names)
        })
    }
}
