//! Text generation: HTTP chat backends tried in order, plus the post-generation
//! safety and length passes that may ask for one more completion each.

use std::time::Duration;

use daybook_core::config::GenerationConfig;
use tracing::{info, warn};

pub mod error;
pub mod http;
pub mod length;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod safety;

pub use error::BackendError;
pub use http::{BackendKind, HttpBackend};
pub use length::{LengthEnforcer, LengthOutcome, LengthResolution};
pub use safety::{SafetyGate, SafetyOutcome, SafetyResolution};

/// Returned verbatim when no backend is configured or every backend failed.
pub const NO_BACKEND_SENTINEL: &str = "【生成バックエンド未設定】.env を確認してください。";

pub trait TextBackend: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, prompt: &str) -> error::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded { backend: String },
    Failed { backend: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub attempts: Vec<AttemptOutcome>,
}

impl Generation {
    /// True when some backend produced the text, false for the sentinel.
    pub fn succeeded(&self) -> bool {
        self.attempts.iter().any(|a| matches!(a, AttemptOutcome::Succeeded { .. }))
    }
}

/// Ordered list of backends. The first success wins; failures fall through.
pub struct Generator {
    backends: Vec<Box<dyn TextBackend>>,
}

impl Generator {
    pub fn new(backends: Vec<Box<dyn TextBackend>>) -> Self {
        Self { backends }
    }

    /// LM Studio when a base URL is set, Ollama when enabled, OpenAI when a key is set.
    pub fn from_config(cfg: &GenerationConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let mut backends: Vec<Box<dyn TextBackend>> = Vec::new();
        if let Some(base) = cfg.lmstudio.base_url.as_deref().filter(|s| !s.trim().is_empty()) {
            let b = HttpBackend::new(BackendKind::LmStudio, base, &cfg.lmstudio.model, timeout)?
                .with_temperature(cfg.temperature);
            backends.push(Box::new(b));
        }
        if cfg.ollama.enabled {
            let b = HttpBackend::new(BackendKind::Ollama, &cfg.ollama.base_url, &cfg.ollama.model, timeout)?
                .with_temperature(cfg.temperature);
            backends.push(Box::new(b));
        }
        if let Some(key) = cfg.openai.api_key.as_deref().filter(|s| !s.trim().is_empty()) {
            let b = HttpBackend::new(BackendKind::OpenAi, &cfg.openai.base_url, &cfg.openai.model, timeout)?
                .with_api_key(key)
                .with_temperature(cfg.temperature);
            backends.push(Box::new(b));
        }
        info!(backends = ?backends.iter().map(|b| b.name()).collect::<Vec<_>>(), "generation backends");
        Ok(Self::new(backends))
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn generate(&self, prompt: &str) -> Generation {
        let mut attempts = Vec::with_capacity(self.backends.len());
        for b in &self.backends {
            match b.complete(prompt) {
                Ok(text) => {
                    attempts.push(AttemptOutcome::Succeeded { backend: b.name().to_string() });
                    return Generation { text, attempts };
                }
                Err(e) => {
                    warn!(backend = b.name(), error = %e, "generation fallback");
                    attempts.push(AttemptOutcome::Failed { backend: b.name().to_string(), reason: e.to_string() });
                }
            }
        }
        warn!(attempted = attempts.len(), "no generation backend succeeded");
        Generation { text: NO_BACKEND_SENTINEL.to_string(), attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBackend;
    use daybook_core::config::GenerationConfig;

    #[test]
    fn first_failure_falls_through_to_second() {
        let first = ScriptedBackend::failing("lmstudio");
        let second = ScriptedBackend::with_responses("ollama", vec!["from ollama".into()]);
        let g = Generator::new(vec![Box::new(first.clone()), Box::new(second.clone())]);
        let out = g.generate("prompt");
        assert_eq!(out.text, "from ollama");
        assert!(out.succeeded());
        assert!(matches!(&out.attempts[0], AttemptOutcome::Failed { backend, .. } if backend == "lmstudio"));
        assert_eq!(out.attempts[1], AttemptOutcome::Succeeded { backend: "ollama".into() });
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[test]
    fn later_backends_are_not_called_after_success() {
        let first = ScriptedBackend::with_responses("a", vec!["ok".into()]);
        let second = ScriptedBackend::with_responses("b", vec!["unused".into()]);
        let g = Generator::new(vec![Box::new(first), Box::new(second.clone())]);
        assert_eq!(g.generate("p").text, "ok");
        assert_eq!(second.calls(), 0);
    }

    #[test]
    fn exhaustion_returns_sentinel() {
        let g = Generator::new(vec![Box::new(ScriptedBackend::failing("a")), Box::new(ScriptedBackend::failing("b"))]);
        let out = g.generate("p");
        assert_eq!(out.text, NO_BACKEND_SENTINEL);
        assert!(!out.succeeded());
        assert_eq!(out.attempts.len(), 2);
    }

    #[test]
    fn no_backends_returns_sentinel() {
        let out = Generator::new(Vec::new()).generate("p");
        assert_eq!(out.text, NO_BACKEND_SENTINEL);
        assert!(out.attempts.is_empty());
    }

    #[test]
    fn config_controls_backend_order() {
        let mut cfg = GenerationConfig::default();
        assert_eq!(Generator::from_config(&cfg).unwrap().backend_names(), vec!["ollama"]);

        cfg.lmstudio.base_url = Some("http://127.0.0.1:1234/v1".into());
        cfg.openai.api_key = Some("sk-x".into());
        assert_eq!(Generator::from_config(&cfg).unwrap().backend_names(), vec!["lmstudio", "ollama", "openai"]);

        cfg.ollama.enabled = false;
        cfg.openai.api_key = Some("  ".into());
        assert_eq!(Generator::from_config(&cfg).unwrap().backend_names(), vec!["lmstudio"]);
    }
}
