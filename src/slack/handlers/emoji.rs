//! Emoji reactions on top-level check-ins.

use tracing::{info, warn};

use crate::llm::EmojiSuggester;
use crate::slack::gateway::ChatGateway;

/// React to one message with model-suggested emoji.
///
/// Returns the names that were added. A suggestion failure adds nothing;
/// a failed reaction is logged and the rest are still attempted.
pub async fn react_to_checkin(
    gateway: &dyn ChatGateway,
    suggester: &dyn EmojiSuggester,
    channel_id: &str,
    ts: &str,
    text: &str,
    max_reactions: usize,
) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let names = match suggester.suggest(text, max_reactions).await {
        Ok(names) => names,
        Err(err) => {
            warn!(channel_id, ts, %err, "emoji suggestion failed");
            return Vec::new();
        }
    };

    let mut added = Vec::with_capacity(names.len());
    for name in names.into_iter().take(max_reactions) {
        match gateway.add_reaction(channel_id, ts, &name).await {
            Ok(()) => added.push(name),
            Err(err) => warn!(channel_id, ts, emoji = %name, %err, "emoji reaction failed"),
        }
    }
    info!(channel_id, ts, count = added.len(), "check-in reacted to");
    added
}
