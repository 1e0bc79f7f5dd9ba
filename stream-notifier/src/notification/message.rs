//! Announcement text.

use crate::domain::{BroadcasterHandle, StreamSnapshot};
use crate::{Error, Result};

/// Footer used when none is configured.
pub const DEFAULT_PROMO_FOOTER: &str = "Sent with stream-notifier";

/// Characters that must be escaped in Telegram MarkdownV2 text.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

/// Escape `text` for MarkdownV2.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Renders "went live" announcements.
///
/// The only difference between tiers is the promotional footer, which every
/// non-privileged destination gets.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    promo_footer: String,
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self {
            promo_footer: DEFAULT_PROMO_FOOTER.to_string(),
        }
    }
}

impl MessageComposer {
    /// Build a composer. A blank footer is a configuration error.
    pub fn new(promo_footer: impl Into<String>) -> Result<Self> {
        let promo_footer = promo_footer.into().trim().to_string();
        if promo_footer.is_empty() {
            return Err(Error::config("promo footer must not be blank"));
        }
        Ok(Self { promo_footer })
    }

    pub fn promo_footer(&self) -> &str {
        &self.promo_footer
    }

    pub fn compose(
        &self,
        handle: &BroadcasterHandle,
        snapshot: &StreamSnapshot,
        privileged: bool,
    ) -> String {
        let mut text = format!(
            "\u{1f534} *{}* started streaming\\!",
            escape_markdown(handle.as_str())
        );

        if !snapshot.title.is_empty() {
            text.push_str(&format!(
                "\n\u{1f4dd} *Title:* {}",
                escape_markdown(&snapshot.title)
            ));
        }
        if !snapshot.category.is_empty() {
            text.push_str(&format!(
                "\n\u{1f3ae} *Category:* {}",
                escape_markdown(&snapshot.category)
            ));
        }
        text.push_str(&format!(
            "\n\u{1f449} {}",
            escape_markdown(&handle.channel_url())
        ));

        if !privileged {
            text.push_str("\n\n");
            text.push_str(&escape_markdown(&self.promo_footer));
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> StreamSnapshot {
        StreamSnapshot {
            title: "Test".into(),
            category: "Just Chatting".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b.c!"), "a\\_b\\.c\\!");
        assert_eq!(escape_markdown("(1+1=2)"), "\\(1\\+1\\=2\\)");
        assert_eq!(escape_markdown("back\\slash"), "back\\\\slash");
        assert_eq!(escape_markdown("plain text"), "plain text");
    }

    #[test]
    fn test_compose_privileged_has_no_footer() {
        let composer = MessageComposer::new("Sent with Notifier").unwrap();
        let handle = BroadcasterHandle::parse("alice").unwrap();
        let text = composer.compose(&handle, &snapshot(), true);

        assert!(text.contains("*alice* started streaming"));
        assert!(text.contains("Test"));
        assert!(text.contains("Just Chatting"));
        assert!(text.contains("https://twitch\\.tv/alice"));
        assert!(!text.contains("Sent with Notifier"));
    }

    #[test]
    fn test_compose_non_privileged_has_footer() {
        let composer = MessageComposer::new("Sent with Notifier").unwrap();
        let handle = BroadcasterHandle::parse("alice").unwrap();
        let text = composer.compose(&handle, &snapshot(), false);
        assert!(text.ends_with("\n\nSent with Notifier"));
    }

    #[test]
    fn test_compose_escapes_user_content() {
        let composer = MessageComposer::default();
        let handle = BroadcasterHandle::parse("some_user").unwrap();
        let snap = StreamSnapshot {
            title: "Day 1 [speedrun]!".into(),
            category: String::new(),
            ..Default::default()
        };
        let text = composer.compose(&handle, &snap, false);

        assert!(text.contains("*some\\_user*"));
        assert!(text.contains("Day 1 \\[speedrun\\]\\!"));
        assert!(!text.contains("Category"));
    }

    #[test]
    fn test_blank_footer_is_rejected() {
        let err = MessageComposer::new("   ").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(MessageComposer::default().promo_footer(), DEFAULT_PROMO_FOOTER);
    }

    #[test]
    fn test_default_footer_on_non_privileged() {
        let composer = MessageComposer::default();
        let handle = BroadcasterHandle::parse("alice").unwrap();
        let text = composer.compose(&handle, &snapshot(), false);
        assert!(text.ends_with(&format!("\n\n{}", escape_markdown(DEFAULT_PROMO_FOOTER))));
    }
}
