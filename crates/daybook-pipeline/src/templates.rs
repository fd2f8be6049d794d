use std::path::Path;

use tracing::{debug, warn};

/// Question answering prompt. Placeholders: `{question}`, `{context}`.
pub const QA_TEMPLATE: &str = "あなたは技術質問に日本語で答える編集者や。関西弁を少し混ぜ、語尾は常体。前置き禁止、出力のみ。
過去記録（コンテキスト）を最大限使い、事実は簡潔に。手順は箇条書きで最大5個。危険な操作は提案しない。

# 質問
{question}

# コンテキスト
{context}

# 出力要件
- まず結論を1〜2文
- 次に手順（最大5）
- 最後に注意点があれば1行
";

/// Daily essay prompt used when no template file can be read.
/// Placeholders: `{topic}`, `{context}`.
pub const DEFAULT_DRAFT_TEMPLATE: &str = "あなたは日本語で短い技術エッセイを書くライターです。関西弁で、300〜600字。
出力のみ返す。前置きや説明は禁止。
次の素材（過去の知見）を1〜3個ほど引用しつつ、「今日の問い」「過去知見」「今日の一歩」の3段で構成してください。
なるべく曖昧表現を避け、読者が真似できる行動を1つ具体に書くこと。
---
テーマ: {topic}

素材:
{context}
";

/// Read a template file as UTF-8; any failure yields [`DEFAULT_DRAFT_TEMPLATE`].
pub fn load_template(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(t) => {
            debug!(path = %path.display(), "loaded prompt template");
            t
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "template unreadable, using built-in draft template");
            DEFAULT_DRAFT_TEMPLATE.to_string()
        }
    }
}

/// Replace each `{key}` with its value. Unknown placeholders are left as-is.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| acc.replace(&format!("{{{key}}}"), value))
}
