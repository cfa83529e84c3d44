//! Emoji suggestions from an OpenAI-compatible chat model.
//!
//! [`EmojiSuggester`] is the seam the message handler depends on;
//! [`client::OpenAiEmojiClient`] is the production implementation.

pub mod client;

use std::future::Future;
use std::pin::Pin;

use crate::Result;

/// Boxed future returned by [`EmojiSuggester::suggest`].
pub type SuggestFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

/// Source of emoji names for a check-in message.
pub trait EmojiSuggester: Send + Sync {
    /// Emoji short-codes (no colons) that fit `text`, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Llm` if the model call fails.
    fn suggest<'a>(&'a self, text: &'a str, limit: usize) -> SuggestFuture<'a>;
}

/// Split a model reply such as `:tada: :coffee::dog:` into emoji names.
///
/// Surrounding whitespace and colons are trimmed, then the reply is split
/// on runs of colons and whitespace. Empty tokens are dropped, duplicates
/// keep their first position, and at most `limit` names are returned.
#[must_use]
pub fn parse_emoji_reply(reply: &str, limit: usize) -> Vec<String> {
    let trimmed = reply.trim().trim_matches(':');
    let mut names: Vec<String> = Vec::new();
    for token in trimmed.split(|c: char| c == ':' || c.is_whitespace()) {
        if token.is_empty() || names.iter().any(|name| name == token) {
            continue;
        }
        names.push(token.to_owned());
        if names.len() == limit {
            break;
        }
    }
    names
}
