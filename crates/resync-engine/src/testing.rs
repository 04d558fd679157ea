//! Scripted fakes shared by the engine's unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use resync_core::RemoteOperation;

use crate::client::{AccessFunctionPublisher, RemoteEndpointClient, ResyncStatusReport};
use crate::error::{EngineError, EngineResult};
use crate::pacer::Pacer;

/// One remote call as seen by [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pause(String),
    Resume(String),
    StartResync(String, String, Vec<String>),
    Status(String),
    Publish(String, String, String, String),
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    statuses: HashMap<String, VecDeque<EngineResult<Option<String>>>>,
    failing: HashMap<(String, RemoteOperation), u16>,
}

/// Records every call and answers status polls from a per-endpoint queue.
///
/// An exhausted queue answers `"in-progress"`.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
    cancel_on_status: Mutex<Option<(u32, CancellationToken)>>,
    cancel_on_pause: Mutex<Option<CancellationToken>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        ScriptedClient::default()
    }

    /// Queues status answers for an endpoint.
    pub fn statuses(self, endpoint: &str, states: &[&str]) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            let queue = script.statuses.entry(endpoint.to_string()).or_default();
            queue.extend(states.iter().map(|s| Ok(Some(s.to_string()))));
        }
        self
    }

    /// Queues a failed status call for an endpoint.
    pub fn status_error(self, endpoint: &str, code: u16) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            let queue = script.statuses.entry(endpoint.to_string()).or_default();
            queue.push_back(Err(http_error(RemoteOperation::ResyncStatus, endpoint, code)));
        }
        self
    }

    /// Makes every call of `operation` for `endpoint` fail with `code`.
    pub fn failing(self, endpoint: &str, operation: RemoteOperation, code: u16) -> Self {
        self.script
            .lock()
            .unwrap()
            .failing
            .insert((endpoint.to_string(), operation), code);
        self
    }

    /// Cancels `token` once the given number of status calls has been answered.
    pub fn cancel_after_polls(self, polls: u32, token: CancellationToken) -> Self {
        *self.cancel_on_status.lock().unwrap() = Some((polls, token));
        self
    }

    /// Cancels `token` while the pause call is in flight.
    pub fn cancel_on_pause(self, token: CancellationToken) -> Self {
        *self.cancel_on_pause.lock().unwrap() = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call, endpoint: &str, operation: RemoteOperation) -> EngineResult<()> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(call);
        match script.failing.get(&(endpoint.to_string(), operation)) {
            Some(code) => Err(http_error(operation, endpoint, *code)),
            None => Ok(()),
        }
    }
}

fn http_error(operation: RemoteOperation, endpoint: &str, code: u16) -> EngineError {
    EngineError::RemoteCallFailed {
        operation,
        endpoint: endpoint.to_string(),
        status: Some(code),
        message: format!("HTTP {}", code),
    }
}

#[async_trait]
impl RemoteEndpointClient for ScriptedClient {
    async fn pause(&self, endpoint: &str) -> EngineResult<()> {
        if let Some(token) = self.cancel_on_pause.lock().unwrap().as_ref() {
            token.cancel();
        }
        self.record(Call::Pause(endpoint.into()), endpoint, RemoteOperation::Pause)
    }

    async fn resume(&self, endpoint: &str) -> EngineResult<()> {
        self.record(Call::Resume(endpoint.into()), endpoint, RemoteOperation::Resume)
    }

    async fn start_resync(
        &self,
        endpoint: &str,
        scope: &str,
        collections: &[String],
    ) -> EngineResult<()> {
        self.record(
            Call::StartResync(endpoint.into(), scope.into(), collections.to_vec()),
            endpoint,
            RemoteOperation::StartResync,
        )
    }

    async fn resync_status(&self, endpoint: &str) -> EngineResult<ResyncStatusReport> {
        self.record(
            Call::Status(endpoint.into()),
            endpoint,
            RemoteOperation::ResyncStatus,
        )?;

        let answer = {
            let mut script = self.script.lock().unwrap();
            let polls = script
                .calls
                .iter()
                .filter(|c| matches!(c, Call::Status(_)))
                .count() as u32;

            if let Some((after, token)) = self.cancel_on_status.lock().unwrap().as_ref() {
                if polls >= *after {
                    token.cancel();
                }
            }

            script
                .statuses
                .get_mut(endpoint)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Ok(Some("in-progress".to_string())))
        };

        answer.map(|state| ResyncStatusReport {
            state,
            details: Default::default(),
        })
    }
}

#[async_trait]
impl AccessFunctionPublisher for ScriptedClient {
    async fn publish_access_function(
        &self,
        endpoint: &str,
        scope: &str,
        collection: &str,
        source: &str,
    ) -> EngineResult<()> {
        self.record(
            Call::Publish(endpoint.into(), scope.into(), collection.into(), source.into()),
            endpoint,
            RemoteOperation::PublishFunction,
        )
    }
}

/// Counts waits instead of sleeping.
#[derive(Default)]
pub struct RecordingPacer {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn wait(&self, period: Duration) {
        self.waits.lock().unwrap().push(period);
        tokio::task::yield_now().await;
    }
}
