use tracing::{debug, info};

use crate::Generator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthResolution {
    WithinRange,
    Regenerated,
    /// Regenerated text was long enough but over the limit; cut to `max`.
    TruncatedRegenerated,
    /// Regeneration failed or came back too short; the original was cut to `max`.
    TruncatedOriginal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthOutcome {
    pub text: String,
    pub resolution: LengthResolution,
}

/// Characters of the trimmed text, newlines excluded.
pub fn measure(text: &str) -> usize {
    text.trim().chars().filter(|c| *c != '\n').count()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Keeps a draft body within `[min_chars, max_chars]`, asking for at most one rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthEnforcer {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl LengthEnforcer {
    pub fn new(min_chars: usize, max_chars: usize) -> Self {
        Self { min_chars, max_chars }
    }

    pub fn instruction(&self) -> String {
        format!(
            "\n\n# 制約: 出力は本文のみ。前置き禁止。{}〜{}字に収めて再構成せよ。",
            self.min_chars, self.max_chars
        )
    }

    pub fn in_range(&self, text: &str) -> bool {
        (self.min_chars..=self.max_chars).contains(&measure(text))
    }

    /// `prompt` is the one that produced `text`.
    pub fn enforce(&self, generator: &Generator, prompt: &str, text: &str) -> LengthOutcome {
        let original = text.trim();
        let n = measure(original);
        if self.in_range(original) {
            return LengthOutcome { text: original.to_string(), resolution: LengthResolution::WithinRange };
        }
        info!(chars = n, min = self.min_chars, max = self.max_chars, "draft length out of range, regenerating");

        let regenerated = generator.generate(&format!("{prompt}{}", self.instruction()));
        if !regenerated.succeeded() {
            return LengthOutcome {
                text: truncate_chars(original, self.max_chars),
                resolution: LengthResolution::TruncatedOriginal,
            };
        }

        let rewritten = regenerated.text.trim();
        let n2 = measure(rewritten);
        debug!(chars = n2, "regenerated draft");
        if self.in_range(rewritten) {
            LengthOutcome { text: rewritten.to_string(), resolution: LengthResolution::Regenerated }
        } else if n2 >= self.min_chars {
            LengthOutcome {
                text: truncate_chars(rewritten, self.max_chars),
                resolution: LengthResolution::TruncatedRegenerated,
            }
        } else {
            LengthOutcome {
                text: truncate_chars(original, self.max_chars),
                resolution: LengthResolution::TruncatedOriginal,
            }
        }
    }
}
