//! Free-text intent matching for page commands.

use pagechat_protocols::{CommandParams, PageCommand, PageCommandRequest, ScrollDirection};
use regex::Regex;

/// Patterns tried in order against the lowercased message.
const PATTERNS: [(&str, PageCommand); 8] = [
    (r"summarize (this )?page", PageCommand::SummarizePage),
    (r"find.*email", PageCommand::FindEmail),
    (r"find.*phone", PageCommand::FindPhone),
    (r"click.*button|press.*button", PageCommand::ClickButton),
    (r"fill.*form|enter.*text", PageCommand::FillForm),
    (r"scroll (down|up)", PageCommand::Scroll),
    (r"get.*text|extract.*text", PageCommand::ExtractText),
    (r"take.*screenshot", PageCommand::Screenshot),
];

/// Maps chat messages like "find the email on this page" to page commands.
pub struct IntentMatcher {
    patterns: Vec<(Regex, PageCommand)>,
}

impl IntentMatcher {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|(pattern, command)| Regex::new(pattern).ok().map(|re| (re, *command)))
            .collect();
        Self { patterns }
    }

    /// First matching command for `message`, with its parameters filled in.
    pub fn parse(&self, message: &str) -> Option<PageCommandRequest> {
        let lower = message.to_lowercase();
        let command = self
            .patterns
            .iter()
            .find(|(re, _)| re.is_match(&lower))
            .map(|(_, command)| *command)?;

        let params = match command {
            PageCommand::ClickButton | PageCommand::FillForm | PageCommand::ExtractText => {
                CommandParams {
                    text: Some(message.to_string()),
                    direction: None,
                }
            }
            PageCommand::Scroll => CommandParams {
                text: None,
                direction: Some(if lower.contains("down") {
                    ScrollDirection::Down
                } else {
                    ScrollDirection::Up
                }),
            },
            _ => CommandParams::default(),
        };

        Some(PageCommandRequest::new(command, message).with_params(params))
    }
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self::new()
    }
}
