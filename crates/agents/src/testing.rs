//! Scripted test doubles for the language model and the extractor.
//!
//! Both record every call so tests can assert on call counts and prompts
//! without network access.

use crate::extractor::{Extraction, Extractor};
use crate::llm::LanguageModel;
use crate::{AgentError, Result};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Record of one completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCall {
    pub system: String,
    pub user: String,
}

type Responder = dyn Fn(&str, &str) -> Result<String> + Send + Sync;

/// Language model answering from a closure of `(system, user)`
pub struct ScriptedModel {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<ModelCall>>>,
}

impl ScriptedModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Always answer with `text`
    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_, _| Ok(text.clone()))
    }

    /// Always fail with a model error
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_, _| Err(AgentError::Model(message.clone())))
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(ModelCall {
                system: system.to_string(),
                user: user.to_string(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(system, user)
    }
}

type ExtractFn = dyn Fn(&str) -> Result<Extraction> + Send + Sync;

/// Extractor answering from a closure of the chunk text
pub struct ScriptedExtractor {
    script: Box<ExtractFn>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl ScriptedExtractor {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str) -> Result<Extraction> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Extractor that finds nothing in any text
    pub fn empty() -> Self {
        Self::new(|_| Ok(Extraction::default()))
    }

    /// Texts passed to `extract`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        text: &str,
        _allowed_nodes: Option<&[String]>,
        _allowed_relationships: Option<&[String]>,
    ) -> Result<Extraction> {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        (self.script)(text)
    }
}
