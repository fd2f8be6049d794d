use std::fs;

use figment::Jail;
use proptest::prelude::*;
use tempfile::TempDir;

use daybook_core::chunker::{sections, Chunker};
use daybook_core::config::{AppConfig, RerankBackendKind};
use daybook_core::corpus::CorpusWalker;
use daybook_core::records::{read_jsonl, write_jsonl};
use daybook_core::types::Document;

#[test]
fn corpus_walk_prefers_days_and_skips_git() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("days/2024")).unwrap();
    fs::create_dir_all(root.join(".git/refs")).unwrap();
    fs::write(root.join("README.md"), "# Readme\nhello").unwrap();
    fs::write(root.join("days/2024/0102.md"), "# Jan 2\nsecond").unwrap();
    fs::write(root.join("days/2024/0101.md"), "# Jan 1\nfirst").unwrap();
    fs::write(root.join(".git/refs/x.md"), "# ignored").unwrap();
    fs::write(root.join("notes.txt"), "not markdown").unwrap();

    let walker = CorpusWalker::new(Chunker::default());
    let docs = walker.documents(root).expect("walk");
    let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(paths, vec!["days/2024/0101.md", "days/2024/0102.md", "README.md"]);

    let chunks = walker.collect(root).expect("collect");
    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].id.starts_with("days/2024/0101.md::0::"));
}

#[test]
fn corpus_walk_missing_root_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let walker = CorpusWalker::new(Chunker::default());
    assert!(walker.documents(&tmp.path().join("nope")).is_err());
}

#[test]
fn jsonl_write_then_read_preserves_records() {
    let tmp = TempDir::new().unwrap();
    let chunks = Chunker::default().split(&Document { path: "a.md".into(), text: "# A\none\n# B\ntwo".into() });
    let out = tmp.path().join("nested/chunks.jsonl");
    assert_eq!(write_jsonl(&chunks, &out).unwrap(), 2);
    let back = read_jsonl(&out).unwrap();
    assert_eq!(back, chunks);
}

#[test]
fn toml_and_env_layers_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "daybook.toml",
            r#"
            [collection]
            name = "journal"

            [generation.ollama]
            model = "llama3"

            [rerank]
            backend = "bge"
            "#,
        )?;
        jail.set_env("OLLAMA_BASE_URL", "http://gpu-box:11434");
        jail.set_env("LMSTUDIO_BASE_URL", "http://127.0.0.1:1234/v1");
        jail.set_env("DAYBOOK_DRAFT__MAX_CHARS", "800");

        let c = AppConfig::from_figment(&AppConfig::figment()).map_err(|e| e.to_string())?;
        assert_eq!(c.collection.name, "journal");
        assert_eq!(c.generation.ollama.model, "llama3");
        assert_eq!(c.generation.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(c.generation.lmstudio.base_url.as_deref(), Some("http://127.0.0.1:1234/v1"));
        assert_eq!(c.rerank.backend, RerankBackendKind::Bge);
        assert_eq!(c.draft.max_chars, 800);
        assert_eq!(c.draft.min_chars, 300);
        Ok(())
    });
}

#[test]
fn prefixed_env_beats_legacy_env() {
    Jail::expect_with(|jail| {
        jail.set_env("OPENAI_MODEL", "gpt-legacy");
        jail.set_env("DAYBOOK_GENERATION__OPENAI__MODEL", "gpt-prefixed");
        let c = AppConfig::from_figment(&AppConfig::figment()).map_err(|e| e.to_string())?;
        assert_eq!(c.generation.openai.model, "gpt-prefixed");
        Ok(())
    });
}

#[test]
fn reranker_backend_is_case_insensitive_in_every_layer() {
    Jail::expect_with(|jail| {
        jail.set_env("RERANKER_BACKEND", "CE");
        let c = AppConfig::from_figment(&AppConfig::figment()).map_err(|e| e.to_string())?;
        assert_eq!(c.rerank.backend, RerankBackendKind::CrossEncoder);

        jail.create_file("daybook.toml", "[rerank]\nbackend = \"Bge\"\n")?;
        jail.set_env("RERANKER_BACKEND", "BGE");
        let c = AppConfig::from_figment(&AppConfig::figment()).map_err(|e| e.to_string())?;
        assert_eq!(c.rerank.backend, RerankBackendKind::Bge);

        jail.set_env("DAYBOOK_RERANK__BACKEND", "colbert");
        assert!(AppConfig::from_figment(&AppConfig::figment()).is_err());
        Ok(())
    });
}

#[test]
fn invalid_layer_is_a_config_error() {
    Jail::expect_with(|jail| {
        jail.create_file("daybook.toml", "[chunking]\nmax_chars = 0\n")?;
        assert!(AppConfig::from_figment(&AppConfig::figment()).is_err());
        Ok(())
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chunks_are_bounded_and_reconstruct_sections(
        text in "(#{1,3} [a-z]{1,8}\n)?[a-z \n]{0,120}(\n# [a-z]{1,6}\n[a-zあ-ん ]{0,150})*",
        max in 1usize..40,
    ) {
        let chunker = Chunker::new(max).unwrap();
        let chunks = chunker.split(&Document { path: "p.md".into(), text: text.clone() });

        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        let expected: String = sections(&text).concat();
        prop_assert_eq!(joined, expected);

        let mut ids = std::collections::HashSet::new();
        for c in &chunks {
            prop_assert!(!c.text.is_empty());
            prop_assert!(c.text.chars().count() <= max);
            prop_assert!(ids.insert(c.id.clone()));
        }
    }
}
