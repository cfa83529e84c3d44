//! Export of a user's own check-ins from one channel as a text file.

use tracing::{info, warn};

use crate::models::message::{ChannelMessage, MessageSubtype};
use crate::orchestrator::messages::channel_link;
use crate::slack::commands::ChannelRef;
use crate::{AppError, Result};

use super::admin::resolve_channel;
use super::DirectMessage;

/// `user`'s channel-visible messages in chronological order. Thread
/// replies count only when also sent to the channel; join/leave notices
/// never do.
#[must_use]
pub fn own_messages<'a>(history: &'a [ChannelMessage], user: &str) -> Vec<&'a ChannelMessage> {
    let mut own: Vec<&ChannelMessage> = history
        .iter()
        .filter(|msg| msg.author.as_deref() == Some(user))
        .filter(|msg| !msg.is_membership_event())
        .filter(|msg| {
            !msg.is_thread_reply() || msg.subtype == Some(MessageSubtype::ThreadBroadcast)
        })
        .collect();
    own.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()).then_with(|| a.ts.cmp(&b.ts)));
    own
}

/// Render messages as a plain-text document, one dated entry per message.
#[must_use]
pub fn render_export(channel_name: &str, messages: &[&ChannelMessage]) -> String {
    let mut out = format!("Check-ins from #{channel_name}\n");
    for msg in messages {
        let when = msg.timestamp().map_or_else(
            || msg.ts.clone(),
            |at| at.format("%Y-%m-%d %H:%M UTC").to_string(),
        );
        out.push_str(&format!("\n[{when}]\n{}\n", msg.text));
    }
    out
}

fn file_stem(channel: &ChannelRef, channel_id: &str) -> String {
    match channel {
        ChannelRef::Id { name: Some(name), .. } | ChannelRef::Name(name) => name.clone(),
        ChannelRef::Id { name: None, .. } => channel_id.to_owned(),
    }
}

/// Upload the sender's messages from `channel` into their DM.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown channel,
/// `AppError::Validation` when the bot cannot read it, or the upload error.
pub async fn export_own_messages(dm: &DirectMessage<'_>, channel: &ChannelRef) -> Result<String> {
    let channel_id = resolve_channel(dm.gateway, channel).await?;
    let history = dm
        .gateway
        .channel_history(&channel_id, None)
        .await
        .map_err(|err| {
            warn!(channel_id = %channel_id, %err, "export history fetch failed");
            AppError::Validation(format!(
                "I couldn't read {}; add me to the channel and try again",
                channel_link(&channel_id)
            ))
        })?;

    let own = own_messages(&history, dm.user_id);
    if own.is_empty() {
        return Ok(format!(
            "I didn't find any check-ins from you in {}.",
            channel_link(&channel_id)
        ));
    }

    let stem = file_stem(channel, &channel_id);
    let content = render_export(&stem, &own);
    dm.gateway
        .upload_text_file(dm.channel_id, &format!("{stem}-checkins.txt"), &content)
        .await?;
    info!(user_id = dm.user_id, channel_id = %channel_id, count = own.len(), "check-ins exported");
    Ok(format!(
        "Here are your {} check-in(s) from {}.",
        own.len(),
        channel_link(&channel_id)
    ))
}
