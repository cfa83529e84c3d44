//! Slack Block Kit builders for the App Home tab.

use slack_morphism::prelude::{SlackBlock, SlackBlockText, SlackDividerBlock, SlackSectionBlock};

use crate::orchestrator::messages::mentions;

/// Build a markdown section block.
#[must_use]
pub fn text_section(text: &str) -> SlackBlock {
    SlackBlock::Section(
        SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(text.to_owned().into())),
    )
}

fn divider() -> SlackBlock {
    SlackBlock::Divider(SlackDividerBlock::new())
}

/// Administrator paragraph of the Home tab.
#[must_use]
pub fn admin_text(admins: &[String]) -> String {
    let list = if admins.is_empty() {
        "No administrators yet. You can become one by sending me `king me`.".to_owned()
    } else {
        mentions(admins)
    };
    format!(
        "*Administrators:*\n{list}\n\nAdministrators can ask me to keep certain people out \
         of the same check-in group."
    )
}

/// Blocks of the Home tab for a workspace with the given admins.
#[must_use]
pub fn home_blocks(admins: &[String]) -> Vec<SlackBlock> {
    vec![
        text_section(
            "*Welcome to Check-in Bot!* :wave:\n\nI run monthly check-in groups and add \
             emoji reactions to check-ins to encourage members to interact.",
        ),
        divider(),
        text_section(
            "*Want to save your check-ins?*\nDM me a channel name (like #check-ins-2025-03) \
             and I'll send you every check-in you posted there. Threaded replies are not \
             included unless they were also sent to the channel.",
        ),
        divider(),
        text_section(&admin_text(admins)),
    ]
}
