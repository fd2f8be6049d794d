//! Advisory check for destructive suggestions in the recommended-action part
//! of a generated text. Not a security boundary: a keyword list per language.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::Generator;

/// `(label, term)` pairs matched as whole ASCII words, case-insensitively.
const ENGLISH_TERMS: &[(&str, &str)] = &[
    ("rm -rf", r"rm\s+-rf"),
    ("rm", "rm"),
    ("del", "del"),
    ("delete", "delete"),
    ("format", "format"),
    ("mkfs", r"mkfs(?:\.[a-z0-9]+)?"),
    ("uninstall", "uninstall"),
    ("overwrite", "overwrite"),
    ("reset --hard", r"reset\s+--hard"),
    ("wipe", "wipe"),
    ("regedit", "regedit"),
    ("reg delete", r"reg\s+delete"),
    ("registry", "registry"),
    ("drop table", r"drop\s+table"),
    ("dd if=", r"dd\s+if"),
    ("factory reset", r"factory\s+reset"),
];

const JAPANESE_TERMS: &[&str] = &["削除", "消去", "初期化", "フォーマット", "アンインストール", "上書き", "レジストリ", "リセット"];

/// Matched as substrings.
const JAPANESE_ACTION_MARKERS: &[&str] = &["今日の一歩", "手順", "推奨", "おすすめ", "対策"];

/// Whole words only, so "Transaction" or "Interaction" do not open a section.
static ENGLISH_ACTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9_])(?:recommended\s+actions?|next\s+steps?|actions?)(?:[^a-z0-9_]|$)")
        .expect("action marker pattern compiles")
});

static DESTRUCTIVE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    let english = ENGLISH_TERMS.iter().map(|(label, term)| {
        let re = Regex::new(&format!(r"(?i)(?:^|[^a-z0-9_])({term})(?:[^a-z0-9_]|$)")).expect("destructive pattern compiles");
        (*label, re)
    });
    let japanese = JAPANESE_TERMS
        .iter()
        .map(|term| (*term, Regex::new(&regex::escape(term)).expect("literal pattern compiles")));
    english.chain(japanese).collect()
});

/// Appended to the prompt for the single regeneration.
pub const SAFETY_INSTRUCTION: &str = "\n\n# 安全制約: データやシステムを壊す操作（削除・初期化・上書き・レジストリ変更・フォーマットなど）は提案しないこと。\
代わりに、新しい作業フォルダを用意して試す、事前にバックアップを取る、ドライランで結果を確かめる、といった安全な手順を示すこと。";

/// Appended when the regenerated text is still flagged. Contains no flagged vocabulary.
pub const SAFE_BOILERPLATE: &str = "\n\n---\n※安全のため、システムや大切なデータに手を加える操作は避けてください。\
試すときは新しい作業フォルダを用意し、事前にバックアップを取り、ドライランで結果を確かめてから進めましょう。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyResolution {
    /// Nothing flagged in the first text.
    Safe,
    /// First text flagged, regenerated text clean.
    Regenerated,
    /// Still flagged (or regeneration failed); boilerplate appended.
    BoilerplateAppended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyOutcome {
    pub text: String,
    /// The prompt that produced `text`, for any later regeneration.
    pub prompt: String,
    pub resolution: SafetyResolution,
}

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
        || (line.starts_with('【') && line.contains('】'))
        || (line.len() > 4 && line.starts_with("**") && line.ends_with("**"))
}

fn names_action(s: &str) -> bool {
    JAPANESE_ACTION_MARKERS.iter().any(|m| s.contains(m)) || ENGLISH_ACTION_MARKER.is_match(s)
}

/// `Recommended action: ...` style line outside any heading.
fn is_action_label(line: &str) -> bool {
    match line.find([':', '：']) {
        Some(i) => names_action(&line[..i]),
        None => false,
    }
}

/// Every span from a heading or label naming an action up to the next heading,
/// in document order. Empty when no such line exists.
pub fn action_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut offset = 0;
    let mut start: Option<usize> = None;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if is_heading(trimmed) {
            if let Some(s) = start.take() {
                sections.push(&text[s..offset]);
            }
            if names_action(trimmed) {
                start = Some(offset);
            }
        } else if start.is_none() && is_action_label(trimmed) {
            start = Some(offset);
        }
        offset += line.len();
    }
    if let Some(s) = start {
        sections.push(&text[s..]);
    }
    sections
}

/// Labels of destructive terms found in any action section, in list order.
/// The whole text is scanned when it has no action section.
pub fn flagged_terms(text: &str) -> Vec<&'static str> {
    let mut sections = action_sections(text);
    if sections.is_empty() {
        sections.push(text);
    }
    DESTRUCTIVE_PATTERNS
        .iter()
        .filter(|(_, re)| sections.iter().any(|s| re.is_match(s)))
        .map(|(label, _)| *label)
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    pub fn is_safe(&self, text: &str) -> bool {
        flagged_terms(text).is_empty()
    }

    /// At most one extra generation call.
    pub fn enforce(&self, generator: &Generator, prompt: &str, text: String) -> SafetyOutcome {
        let terms = flagged_terms(&text);
        if terms.is_empty() {
            return SafetyOutcome { text, prompt: prompt.to_string(), resolution: SafetyResolution::Safe };
        }
        info!(terms = ?terms, "destructive wording in recommended action, regenerating");

        let safer_prompt = format!("{prompt}{SAFETY_INSTRUCTION}");
        let regenerated = generator.generate(&safer_prompt);
        if !regenerated.succeeded() {
            warn!("regeneration failed, appending safety note to original text");
            return SafetyOutcome {
                text: format!("{}{SAFE_BOILERPLATE}", text.trim_end()),
                prompt: prompt.to_string(),
                resolution: SafetyResolution::BoilerplateAppended,
            };
        }

        let remaining = flagged_terms(&regenerated.text);
        if remaining.is_empty() {
            return SafetyOutcome { text: regenerated.text, prompt: safer_prompt, resolution: SafetyResolution::Regenerated };
        }
        warn!(terms = ?remaining, "still flagged after regeneration, appending safety note");
        SafetyOutcome {
            text: format!("{}{SAFE_BOILERPLATE}", regenerated.text.trim_end()),
            prompt: safer_prompt,
            resolution: SafetyResolution::BoilerplateAppended,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBackend;

    const UNSAFE: &str = "## 振り返り\n今日は散歩した。\n## 今日の一歩\n古い設定を rm -rf ~/.config/app で消して再起動する。\n## まとめ\n良い日。";
    const SAFE: &str = "## 振り返り\n今日は散歩した。\n## 今日の一歩\n新しい作業フォルダで設定を試す。\n## まとめ\n良い日。";

    fn generator(backend: &ScriptedBackend) -> Generator {
        Generator::new(vec![Box::new(backend.clone())])
    }

    #[test]
    fn section_stops_at_next_heading() {
        assert_eq!(action_sections(UNSAFE), vec!["## 今日の一歩\n古い設定を rm -rf ~/.config/app で消して再起動する。\n"]);
    }

    #[test]
    fn heading_containing_action_as_a_substring_is_not_a_section() {
        let text = "## Transaction log\nok\n## 今日の一歩\nrm -rf ~/work で消してやり直す。";
        assert_eq!(action_sections(text), vec!["## 今日の一歩\nrm -rf ~/work で消してやり直す。"]);
        assert_eq!(flagged_terms(text), vec!["rm -rf", "rm"]);
        assert!(action_sections("## Interaction notes\n削除した").is_empty());
    }

    #[test]
    fn every_action_section_is_scanned() {
        let text = "## Next steps\n散歩する。\n## 振り返り\n写真を削除した話。\n## 対策\n設定を初期化する。";
        assert_eq!(action_sections(text).len(), 2);
        assert_eq!(flagged_terms(text), vec!["初期化"]);
    }

    #[test]
    fn label_line_opens_a_section() {
        let text = "メモ\nRecommended action: delete the temp folder\n# Notes\nok";
        assert_eq!(action_sections(text), vec!["Recommended action: delete the temp folder\n"]);
        assert_eq!(flagged_terms(text), vec!["delete"]);
    }

    #[test]
    fn without_action_heading_the_whole_text_is_scanned() {
        assert_eq!(flagged_terms("設定ファイルを上書きしてください"), vec!["上書き"]);
    }

    #[test]
    fn words_outside_the_action_section_are_ignored() {
        let text = "## 振り返り\n昔の写真を削除した話。\n## 今日の一歩\n散歩に出る。";
        assert!(SafetyGate::new().is_safe(text));
    }

    #[test]
    fn english_terms_match_whole_words_only() {
        assert!(flagged_terms("Next step: reformatting is fine, formation too").is_empty());
        assert_eq!(flagged_terms("Next step: run git reset --hard now"), vec!["reset --hard"]);
        assert!(flagged_terms("Action: rmで消す").contains(&"rm"));
    }

    #[test]
    fn boilerplate_and_sentinel_are_clean() {
        assert!(flagged_terms(SAFE_BOILERPLATE).is_empty());
        assert!(flagged_terms(crate::NO_BACKEND_SENTINEL).is_empty());
    }

    #[test]
    fn safe_text_passes_without_generation() {
        let b = ScriptedBackend::failing("x");
        let out = SafetyGate::new().enforce(&generator(&b), "p", SAFE.to_string());
        assert_eq!(out.resolution, SafetyResolution::Safe);
        assert_eq!(out.text, SAFE);
        assert_eq!(b.calls(), 0);
    }

    #[test]
    fn unsafe_text_is_regenerated_once() {
        let b = ScriptedBackend::with_responses("x", vec![SAFE.to_string()]);
        let out = SafetyGate::new().enforce(&generator(&b), "p", UNSAFE.to_string());
        assert_eq!(out.resolution, SafetyResolution::Regenerated);
        assert_eq!(out.text, SAFE);
        assert_eq!(b.calls(), 1);
        assert!(b.prompts()[0].ends_with(SAFETY_INSTRUCTION));
        assert_eq!(out.prompt, b.prompts()[0]);
    }

    #[test]
    fn still_unsafe_gets_boilerplate() {
        let b = ScriptedBackend::repeating("x", UNSAFE);
        let out = SafetyGate::new().enforce(&generator(&b), "p", UNSAFE.to_string());
        assert_eq!(out.resolution, SafetyResolution::BoilerplateAppended);
        assert!(out.text.ends_with(SAFE_BOILERPLATE));
        assert_eq!(b.calls(), 1);
    }

    #[test]
    fn failed_regeneration_keeps_original_with_boilerplate() {
        let b = ScriptedBackend::failing("x");
        let out = SafetyGate::new().enforce(&generator(&b), "p", UNSAFE.to_string());
        assert_eq!(out.resolution, SafetyResolution::BoilerplateAppended);
        assert!(out.text.starts_with("## 振り返り"));
        assert_eq!(out.prompt, "p");
    }
}
