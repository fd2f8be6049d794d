use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};
use crate::TextBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OpenAI-compatible local server (`{base}/chat/completions`).
    LmStudio,
    /// `{base}/api/chat` with streaming disabled.
    Ollama,
    /// Hosted API, bearer-authenticated.
    OpenAi,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::LmStudio => "lmstudio",
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<ResponseMessage>,
}

#[derive(Clone)]
pub struct HttpBackend {
    kind: BackendKind,
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    pub fn new(kind: BackendKind, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            kind,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            temperature: 0.7,
        })
    }

    #[must_use]
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn endpoint(&self) -> String {
        match self.kind {
            BackendKind::LmStudio | BackendKind::OpenAi => format!("{}/chat/completions", self.base_url),
            BackendKind::Ollama => format!("{}/api/chat", self.base_url),
        }
    }

    fn send<B: Serialize>(&self, body: &B) -> Result<String> {
        let mut req = self.client.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(BackendError::Status {
                backend: self.kind.name(),
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }
        Ok(text)
    }
}

impl TextBackend for HttpBackend {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![ChatMessage { role: "user", content: prompt }];
        let content = match self.kind {
            BackendKind::LmStudio | BackendKind::OpenAi => {
                let body = CompletionsRequest { model: &self.model, messages, temperature: self.temperature };
                let parsed: CompletionsResponse = serde_json::from_str(&self.send(&body)?)?;
                parsed.choices.into_iter().next().and_then(|c| c.message.content)
            }
            BackendKind::Ollama => {
                let body = OllamaRequest {
                    model: &self.model,
                    messages,
                    stream: false,
                    options: OllamaOptions { temperature: self.temperature },
                };
                let parsed: OllamaResponse = serde_json::from_str(&self.send(&body)?)?;
                parsed.message.and_then(|m| m.content)
            }
        };
        match content {
            Some(c) if !c.trim().is_empty() => Ok(c.trim().to_string()),
            _ => Err(BackendError::EmptyResponse { backend: self.kind.name() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server(rt: &Runtime) -> MockServer {
        rt.block_on(MockServer::start())
    }

    fn mount(rt: &Runtime, server: &MockServer, mock: Mock) {
        rt.block_on(mock.mount(server));
    }

    #[test]
    fn ollama_reads_message_content() {
        let rt = Runtime::new().unwrap();
        let srv = server(&rt);
        mount(
            &rt,
            &srv,
            Mock::given(method("POST"))
                .and(path("/api/chat"))
                .and(body_partial_json(json!({"model": "qwen2.5:7b", "stream": false})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "message": {"role": "assistant", "content": "  こんにちは  "},
                    "done": true
                }))),
        );
        let b = HttpBackend::new(BackendKind::Ollama, &srv.uri(), "qwen2.5:7b", Duration::from_secs(5)).unwrap();
        assert_eq!(b.complete("hi").unwrap(), "こんにちは");
    }

    #[test]
    fn openai_sends_bearer_and_reads_first_choice() {
        let rt = Runtime::new().unwrap();
        let srv = server(&rt);
        mount(
            &rt,
            &srv,
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .and(header("authorization", "Bearer sk-test"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "answer"}}]
                }))),
        );
        let base = format!("{}/v1/", srv.uri());
        let b = HttpBackend::new(BackendKind::OpenAi, &base, "gpt-4o-mini", Duration::from_secs(5))
            .unwrap()
            .with_api_key("sk-test");
        assert_eq!(b.complete("q").unwrap(), "answer");
    }

    #[test]
    fn non_success_status_is_an_error() {
        let rt = Runtime::new().unwrap();
        let srv = server(&rt);
        mount(
            &rt,
            &srv,
            Mock::given(method("POST")).respond_with(ResponseTemplate::new(503).set_body_string("loading model")),
        );
        let b = HttpBackend::new(BackendKind::LmStudio, &srv.uri(), "m", Duration::from_secs(5)).unwrap();
        match b.complete("q") {
            Err(BackendError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn empty_choices_are_an_error() {
        let rt = Runtime::new().unwrap();
        let srv = server(&rt);
        mount(
            &rt,
            &srv,
            Mock::given(method("POST")).respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []}))),
        );
        let b = HttpBackend::new(BackendKind::LmStudio, &srv.uri(), "m", Duration::from_secs(5)).unwrap();
        assert!(matches!(b.complete("q"), Err(BackendError::EmptyResponse { .. })));
    }

    #[test]
    fn unreachable_host_is_an_error() {
        let b = HttpBackend::new(BackendKind::Ollama, "http://127.0.0.1:1", "m", Duration::from_secs(2)).unwrap();
        assert!(matches!(b.complete("q"), Err(BackendError::Http(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let b = HttpBackend::new(BackendKind::OpenAi, "https://api.openai.com/v1", "m", Duration::from_secs(1))
            .unwrap()
            .with_api_key("sk-secret");
        let dbg = format!("{b:?}");
        assert!(!dbg.contains("sk-secret"));
        assert_eq!(b.endpoint(), "https://api.openai.com/v1/chat/completions");
    }
}
