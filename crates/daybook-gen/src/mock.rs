//! Scripted backend for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BackendError, Result};
use crate::TextBackend;

/// Pops one scripted reply per call; `Err` entries simulate a failing service.
/// Clones share the script, call counter and prompt log.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    name: String,
    responses: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    pub default_response: Option<String>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn with_responses(name: &str, responses: Vec<String>) -> Self {
        Self::scripted(name, responses.into_iter().map(Ok).collect())
    }

    #[must_use]
    pub fn scripted(name: &str, script: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            name: name.to_string(),
            responses: Arc::new(Mutex::new(script.into())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            default_response: None,
        }
    }

    #[must_use]
    pub fn failing(name: &str) -> Self {
        Self::scripted(name, Vec::new())
    }

    #[must_use]
    pub fn repeating(name: &str, reply: &str) -> Self {
        let mut b = Self::scripted(name, Vec::new());
        b.default_response = Some(reply.to_string());
        b
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TextBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_string());
        let next = self.responses.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(BackendError::Other(reason)),
            None => self
                .default_response
                .clone()
                .ok_or_else(|| BackendError::Other(format!("{} has no scripted reply", self.name))),
        }
    }
}
