//! Deterministic provider fakes for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::{DispatchRequest, Dispatcher};
use crate::error::LlmError;
use crate::executor::{Executor, ExecutorConfig};
use crate::registry::{Credentials, ProviderRegistry, builtin_providers};
use crate::types::Message;

/// What a faked provider does when called
#[derive(Debug, Clone)]
pub(crate) enum Script {
    Reply { text: String, delay: Duration },
    Fail { status: u16, delay: Duration },
    Hang,
}

/// A call as seen by the fake
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub provider_id: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

/// Per-provider scripted responses.
///
/// Each provider has a queue of scripts; calls pop from the front and the last
/// script repeats forever.
#[derive(Clone, Default)]
pub(crate) struct ScriptedDispatcher {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Script>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, provider: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(provider.to_string())
            .or_default()
            .push_back(script);
        self
    }

    pub fn reply(self, provider: &str, text: &str) -> Self {
        self.reply_after(provider, text, Duration::ZERO)
    }

    pub fn reply_after(self, provider: &str, text: &str, delay: Duration) -> Self {
        self.script(
            provider,
            Script::Reply {
                text: text.to_string(),
                delay,
            },
        )
    }

    pub fn fail(self, provider: &str, status: u16) -> Self {
        self.fail_after(provider, status, Duration::ZERO)
    }

    pub fn fail_after(self, provider: &str, status: u16, delay: Duration) -> Self {
        self.script(provider, Script::Fail { status, delay })
    }

    pub fn hang(self, provider: &str) -> Self {
        self.script(provider, Script::Hang)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, provider: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.provider_id == provider)
            .collect()
    }

    fn next_script(&self, provider: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(provider)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn dispatch(&self, request: DispatchRequest<'_>) -> Result<String, LlmError> {
        let provider = request.provider.id.clone();
        self.calls.lock().unwrap().push(RecordedCall {
            provider_id: provider.clone(),
            model: request.model.to_string(),
            timeout: request.timeout,
            max_tokens: request.params.max_tokens,
            messages: request.messages.to_vec(),
        });

        match self.next_script(&provider) {
            Some(Script::Reply { text, delay }) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Some(Script::Fail { status, delay }) => {
                tokio::time::sleep(delay).await;
                Err(LlmError::http(&provider, status, "scripted failure"))
            }
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LlmError::provider(&provider, "hung call returned"))
            }
            None => Err(LlmError::provider(&provider, "no script")),
        }
    }
}

/// Built-in catalog with credentials only for `ids`
pub(crate) fn registry_with(ids: &[&str]) -> ProviderRegistry {
    let providers = builtin_providers();
    let credentials = Credentials::from_pairs(
        providers
            .iter()
            .filter(|p| ids.contains(&p.id.as_str()))
            .map(|p| (p.credential_key.clone(), format!("key-for-{}", p.id))),
    );
    ProviderRegistry::new(providers, credentials)
}

pub(crate) fn executor_with(
    available: &[&str],
    dispatcher: &ScriptedDispatcher,
    config: ExecutorConfig,
) -> Executor {
    Executor::new(
        Arc::new(registry_with(available)),
        Arc::new(dispatcher.clone()),
        config,
    )
}

/// Paused-clock durations land on exact ticks; allow a few ms of timer rounding
#[track_caller]
pub(crate) fn assert_near(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}
