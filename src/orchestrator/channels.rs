//! Lookup of the group channels that belong to a given month.

use crate::models::channel_format::ChannelFormat;
use crate::models::message::ChannelSummary;
use crate::slack::gateway::ChatGateway;
use crate::Result;

/// A group channel together with its group number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChannel {
    /// 1-based group number parsed from the channel name.
    pub number: usize,
    /// The channel itself.
    pub channel: ChannelSummary,
}

/// Pick the channels named for `year`/`month` out of `channels`, ordered
/// by group number.
#[must_use]
pub fn month_channels(
    channels: Vec<ChannelSummary>,
    format: &ChannelFormat,
    year: i32,
    month: u32,
) -> Vec<GroupChannel> {
    let mut found: Vec<GroupChannel> = channels
        .into_iter()
        .filter_map(|channel| {
            format
                .group_number(&channel.name, year, month)
                .map(|number| GroupChannel { number, channel })
        })
        .collect();
    found.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.channel.name.cmp(&b.channel.name)));
    found
}

/// Fetch every visible channel and keep the ones for `year`/`month`.
///
/// # Errors
///
/// Returns `AppError::Slack` if listing channels fails.
pub async fn fetch_month_channels(
    gateway: &dyn ChatGateway,
    format: &ChannelFormat,
    year: i32,
    month: u32,
) -> Result<Vec<GroupChannel>> {
    let channels = gateway.list_channels().await?;
    Ok(month_channels(channels, format, year, month))
}
