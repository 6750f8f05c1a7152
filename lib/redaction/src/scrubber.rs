//! Line-oriented masking of credential secrets in display text.
//!
//! A [`Scrubber`] holds the redaction set for one viewpoint: the secrets of
//! every credential whose job ran at or before the viewed step. Scrubbing is
//! read-only and computed fresh per view; the stored dataclip is never
//! touched.

use crate::credential::MIN_SECRET_LEN;
use serde_json::Value as JsonValue;

/// Secrets of at least this length keep their first and last two characters
/// visible, which lets operators recognize which credential leaked without
/// exposing it.
const EDGE_VISIBLE_LEN: usize = 8;

/// The fixed masked infix. Deliberately constant-width: the mask reveals
/// neither the secret nor its exact length.
const MASK: &str = "****";

/// A compiled redaction set.
#[derive(Debug, Clone, Default)]
pub struct Scrubber {
    /// Longest first, so a long secret is masked before any of its
    /// substrings.
    secrets: Vec<String>,
}

impl Scrubber {
    /// Builds a scrubber from a redaction set.
    ///
    /// Values shorter than [`MIN_SECRET_LEN`] are dropped; duplicates are
    /// collapsed; the rest are ordered longest first.
    #[must_use]
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = secrets
            .into_iter()
            .filter(|secret| secret.len() >= MIN_SECRET_LEN)
            .collect();
        secrets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        secrets.dedup();
        Self { secrets }
    }

    /// Returns true if there is nothing to mask.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Masks every secret occurrence in the given display text, line by line.
    #[must_use]
    pub fn scrub_text(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        let mut lines: Vec<String> = Vec::new();
        for line in text.split('\n') {
            if self.secrets.iter().any(|secret| line.contains(secret.as_str())) {
                let mut masked = line.to_string();
                for secret in &self.secrets {
                    if masked.contains(secret.as_str()) {
                        masked = masked.replace(secret.as_str(), &mask(secret));
                    }
                }
                lines.push(masked);
            } else {
                lines.push(line.to_string());
            }
        }
        lines.join("\n")
    }

    /// Serializes a JSON payload to its display form and masks it.
    #[must_use]
    pub fn scrub_json(&self, value: &JsonValue) -> String {
        let rendered =
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.scrub_text(&rendered)
    }
}

/// Masks a single secret value.
///
/// Long secrets keep two characters on each edge around the fixed infix;
/// anything shorter is replaced outright. The original can never be read
/// back out of the mask.
fn mask(secret: &str) -> String {
    if secret.len() >= EDGE_VISIBLE_LEN {
        let head: String = secret.chars().take(2).collect();
        let tail: String = secret
            .chars()
            .rev()
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{head}{MASK}{tail}")
    } else {
        MASK.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_every_occurrence_in_a_line() {
        let scrubber = Scrubber::new(vec!["hunter2".to_string()]);
        let scrubbed = scrubber.scrub_text("password=hunter2 retry=hunter2");
        assert!(!scrubbed.contains("hunter2"));
        assert_eq!(scrubbed.matches(MASK).count(), 2);
    }

    #[test]
    fn short_secret_is_fully_replaced() {
        let scrubber = Scrubber::new(vec!["789".to_string()]);
        let scrubbed = scrubber.scrub_text("another_no: 789");
        assert_eq!(scrubbed, "another_no: ****");
    }

    #[test]
    fn long_secret_keeps_edges() {
        let scrubber = Scrubber::new(vec!["tok_abc123xyz".to_string()]);
        let scrubbed = scrubber.scrub_text("authorization: tok_abc123xyz");
        assert_eq!(scrubbed, "authorization: to****yz");
        assert!(!scrubbed.contains("tok_abc123xyz"));
    }

    #[test]
    fn lines_without_secrets_are_untouched() {
        let scrubber = Scrubber::new(vec!["hunter2".to_string()]);
        let text = "plain line\nanother plain line";
        assert_eq!(scrubber.scrub_text(text), text);
    }

    #[test]
    fn too_short_values_never_enter_the_set() {
        let scrubber = Scrubber::new(vec!["55".to_string()]);
        assert!(scrubber.is_empty());
        assert_eq!(scrubber.scrub_text("age: 55"), "age: 55");
    }

    #[test]
    fn longer_secrets_mask_before_their_substrings() {
        let scrubber = Scrubber::new(vec!["123".to_string(), "123456".to_string()]);
        let scrubbed = scrubber.scrub_text("pin: 123456");
        // The six-digit secret wins; the three-digit one must not split it.
        assert_eq!(scrubbed, "pin: ****");
    }

    #[test]
    fn scrub_json_renders_then_masks() {
        let scrubber = Scrubber::new(vec!["123456".to_string(), "789".to_string()]);
        let payload = json!({
            "integer": 123456,
            "another_no": 789,
            "foo": "bar",
        });

        let scrubbed = scrubber.scrub_json(&payload);
        assert!(!scrubbed.contains("123456"));
        assert!(!scrubbed.contains("789"));
        assert!(scrubbed.contains("\"foo\": \"bar\""));
    }

    #[test]
    fn scrubbing_does_not_mutate_the_payload() {
        let scrubber = Scrubber::new(vec!["123456".to_string()]);
        let payload = json!({"pin": 123456});
        let _ = scrubber.scrub_json(&payload);
        assert_eq!(payload, json!({"pin": 123456}));
    }
}
