//! Renders retrieved hits into the bullet-list context block fed to prompts.

use crate::types::Hit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextComposer {
    pub limit: usize,
    pub snippet_chars: usize,
    pub separator: &'static str,
}

impl ContextComposer {
    /// Question answering: four hits, 500 characters each, one per line.
    pub const fn answer() -> Self {
        Self { limit: 4, snippet_chars: 500, separator: "\n" }
    }

    /// Drafting: `limit` hits, 300 characters each, blank line between.
    pub const fn draft(limit: usize) -> Self {
        Self { limit, snippet_chars: 300, separator: "\n\n" }
    }

    pub fn render(&self, hits: &[Hit]) -> String {
        hits.iter()
            .take(self.limit)
            .map(|h| {
                let snippet = snippet(&h.text, self.snippet_chars);
                let label = h.metadata.label();
                if label.is_empty() {
                    format!("- {snippet}")
                } else {
                    format!("- {label} - {snippet}")
                }
            })
            .collect::<Vec<_>>()
            .join(self.separator)
    }
}

/// Trimmed, flattened to one line, cut to `max_chars` characters.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.trim()
        .replace("\r\n", " ")
        .replace('\n', " ")
        .chars()
        .take(max_chars)
        .collect()
}
