//! Shared test helpers
//!
//! `ScriptedProvider` replays canned replies per (call kind, model) and
//! records every call, so tests can assert the exact attempt sequence.

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sunplan_ai::providers::ProviderEntry;
use sunplan_ai::types::{ImagePayload, ProviderError, VisionProvider};

/// Which capability was called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Classify,
    Extract,
    Text,
}

/// One scripted response
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(ProviderError),
    /// Never answers within any test deadline
    Hang,
}

impl Step {
    pub fn reply(text: impl Into<String>) -> Self {
        Step::Reply(text.into())
    }
}

/// Recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub model: String,
}

/// Queue of steps; the last step repeats once the queue runs dry
#[derive(Default)]
struct Script {
    queue: VecDeque<Step>,
    last: Option<Step>,
}

impl Script {
    fn next(&mut self) -> Option<Step> {
        match self.queue.pop_front() {
            Some(step) => {
                self.last = Some(step.clone());
                Some(step)
            }
            None => self.last.clone(),
        }
    }
}

/// Provider double driven by per-model scripts
pub struct ScriptedProvider {
    name: String,
    scripts: Mutex<HashMap<(CallKind, String), Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the replies of one capability for one model
    pub fn on(self, kind: CallKind, model: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(
            (kind, model.to_string()),
            Script {
                queue: steps.into(),
                last: None,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.kind == kind)
            .count()
    }

    async fn play(&self, kind: CallKind, model: &str) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(Call {
            kind,
            model: model.to_string(),
        });

        // Unscripted models behave like a model the provider does not know
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&(kind, model.to_string()))
            .and_then(Script::next)
            .unwrap_or_else(|| Step::Fail(ProviderError::ModelNotFound(model.to_string())));

        match step {
            Step::Reply(text) => Ok(text),
            Step::Fail(err) => Err(err),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Timeout(Duration::from_secs(3600)))
            }
        }
    }
}

#[async_trait]
impl VisionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify_image(
        &self,
        model: &str,
        _image: &ImagePayload,
        _prompt: &str,
    ) -> Result<String, ProviderError> {
        self.play(CallKind::Classify, model).await
    }

    async fn extract_structured_analysis(
        &self,
        model: &str,
        _image: &ImagePayload,
        _prompt: &str,
    ) -> Result<String, ProviderError> {
        self.play(CallKind::Extract, model).await
    }

    async fn generate_text(&self, model: &str, _prompt: &str) -> Result<String, ProviderError> {
        self.play(CallKind::Text, model).await
    }
}

/// Chain entry sharing the double with the test
pub fn entry(provider: &Arc<ScriptedProvider>, models: &[&str]) -> ProviderEntry {
    ProviderEntry::new(
        provider.clone(),
        models.iter().map(|m| m.to_string()).collect(),
    )
}
