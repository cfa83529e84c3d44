//! Channel-name templates for monthly check-in groups.
//!
//! A template contains the tokens `[year]` and `[month]` and optionally
//! `[number]`. Rendering rules:
//!
//! - with `[number]`, the group number is always substituted (`1` for a
//!   single group);
//! - without `[number]`, a single group gets the bare name and multiple
//!   groups get a `-N` suffix starting at 1.

use regex::Regex;

use crate::{AppError, Result};

const YEAR: &str = "[year]";
const MONTH: &str = "[month]";
const NUMBER: &str = "[number]";

/// Slack's upper bound on channel name length.
const MAX_CHANNEL_NAME_LEN: usize = 80;

/// A validated, normalized channel-name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFormat {
    template: String,
}

impl ChannelFormat {
    /// Validate and normalize a template.
    ///
    /// The template is lowercased and whitespace runs become `-` so that
    /// rendered names are valid Slack channel names.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when the template is empty, contains
    /// `<`, `>` or `&`, uses an unknown bracket token, lacks `[year]` or
    /// `[month]`, or renders longer than Slack allows.
    pub fn parse(raw: &str) -> Result<Self> {
        let template = normalize(raw.trim().trim_start_matches('#'));
        if template.is_empty() {
            return Err(AppError::Validation("channel format cannot be empty".into()));
        }

        if template.contains(['<', '>', '&']) {
            return Err(AppError::Validation(
                "channel format cannot contain `<`, `>` or `&`".into(),
            ));
        }

        let mut rest = template.as_str();
        while let Some(open) = rest.find('[') {
            let after = &rest[open..];
            let close = after.find(']').ok_or_else(|| {
                AppError::Validation("channel format has an unclosed `[`".into())
            })?;
            let token = &after[..=close];
            if token != YEAR && token != MONTH && token != NUMBER {
                return Err(AppError::Validation(format!(
                    "unknown token `{token}`; allowed tokens are [year], [month] and [number]"
                )));
            }
            rest = &after[close + 1..];
        }
        let without_tokens = template.replace(YEAR, "").replace(MONTH, "").replace(NUMBER, "");
        if without_tokens.contains(']') {
            return Err(AppError::Validation(
                "channel format has an unmatched `]`".into(),
            ));
        }

        if !template.contains(YEAR) || !template.contains(MONTH) {
            return Err(AppError::Validation(
                "channel format must contain both [year] and [month]".into(),
            ));
        }

        let format = Self { template };
        if format.channel_name(9999, 12, 99, 99).len() > MAX_CHANNEL_NAME_LEN {
            return Err(AppError::Validation(format!(
                "channel names must be at most {MAX_CHANNEL_NAME_LEN} characters"
            )));
        }
        Ok(format)
    }

    /// The normalized template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Whether the template places the group number itself.
    #[must_use]
    pub fn has_number_token(&self) -> bool {
        self.template.contains(NUMBER)
    }

    /// Render the name for group `number` (1-based) out of `group_count`.
    #[must_use]
    pub fn channel_name(&self, year: i32, month: u32, number: usize, group_count: usize) -> String {
        let base = self
            .template
            .replace(YEAR, &year.to_string())
            .replace(MONTH, &format!("{month:02}"));

        if self.has_number_token() {
            base.replace(NUMBER, &number.to_string())
        } else if group_count > 1 {
            format!("{base}-{number}")
        } else {
            base
        }
    }

    /// Render every channel name for `group_count` groups.
    #[must_use]
    pub fn channel_names(&self, year: i32, month: u32, group_count: usize) -> Vec<String> {
        (1..=group_count)
            .map(|number| self.channel_name(year, month, number, group_count))
            .collect()
    }

    /// Group number of `name` if it belongs to this template's `year`/`month`.
    ///
    /// An unsuffixed name of a template without `[number]` is group 1.
    #[must_use]
    pub fn group_number(&self, name: &str, year: i32, month: u32) -> Option<usize> {
        let regex = self.matcher(year, month)?;
        let captures = regex.captures(name)?;
        match captures.get(1) {
            Some(number) => number.as_str().parse().ok(),
            None => Some(1),
        }
    }

    fn matcher(&self, year: i32, month: u32) -> Option<Regex> {
        let mut pattern = String::from("^");
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('[') {
            pattern.push_str(&regex::escape(&rest[..open]));
            let after = &rest[open..];
            let close = after.find(']')?;
            match &after[..=close] {
                YEAR => pattern.push_str(&year.to_string()),
                MONTH => pattern.push_str(&format!("{month:02}")),
                _ => pattern.push_str(r"(\d+)"),
            }
            rest = &after[close + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        if !self.has_number_token() {
            pattern.push_str(r"(?:-(\d+))?");
        }
        pattern.push('$');
        Regex::new(&pattern).ok()
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}
