//! # Resync State Machine
//!
//! Drives one endpoint through a full resync cycle.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   no collections ─────────────────────────────────────► Skipped         │
//! │                                                                         │
//! │   pause ──► start_resync ──► status ─┬─ "completed" ──► Completed ─┐    │
//! │    │            │              ▲     │                             │    │
//! │    │ (failure   │ (failure     │     ├─ other / error: wait ───┐   │    │
//! │    │  logged)   │  recorded)   └─────┼─────────────────────────┘   │    │
//! │    │            │                    ├─ budget spent ──► TimedOut ─┤    │
//! │    │            │                    └─ cancelled ─────► Cancelled ┤    │
//! │    │            │                                                  │    │
//! │    └────────────┴──────────── pause attempted ─────────► resume ◄──┘    │
//! │                                                      (exactly once)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A run never returns an error. Every failure along the way ends up in the
//! [`RunOutcome`], and resume is issued whenever pause was issued, whatever
//! happened in between.
//!
//! Cancellation is observed before the first call, after pause (so no resync
//! job is submitted once it fires) and between polls. Calls already in flight
//! finish under their own request timeout.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use resync_core::{
    EndpointDescriptor, PollDecision, PollPolicy, PollTracker, ResyncState, RunFailure,
    RunOutcome,
};

use crate::client::RemoteEndpointClient;
use crate::error::EngineError;
use crate::pacer::{Pacer, TokioPacer};

// =============================================================================
// Run Record
// =============================================================================

/// Mutable record of a run in flight. Discarded once turned into an outcome.
struct ResyncRun {
    id: Uuid,
    endpoint: String,
    state: ResyncState,
    attempts: u32,
    pause_attempted: bool,
    resumed: bool,
    failures: Vec<RunFailure>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl ResyncRun {
    fn start(endpoint: &EndpointDescriptor) -> Self {
        ResyncRun {
            id: Uuid::new_v4(),
            endpoint: endpoint.name.clone(),
            state: ResyncState::NotStarted,
            attempts: 0,
            pause_attempted: false,
            resumed: false,
            failures: Vec::new(),
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn advance(&mut self, next: ResyncState) {
        match self.state.transition(next) {
            Ok(state) => self.state = state,
            Err(e) => warn!(error = %e, "Ignoring illegal state transition"),
        }
    }

    fn record(&mut self, err: &EngineError) {
        self.failures.push(err.to_failure());
    }

    fn finish(self) -> RunOutcome {
        RunOutcome {
            run_id: self.id,
            endpoint_name: self.endpoint,
            state: self.state,
            attempts: self.attempts,
            duration: self.clock.elapsed(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            pause_attempted: self.pause_attempted,
            resumed: self.resumed,
            failures: self.failures,
        }
    }
}

// =============================================================================
// State Machine
// =============================================================================

/// Runs the pause, resync, poll, resume cycle for single endpoints.
#[derive(Clone)]
pub struct ResyncStateMachine {
    client: Arc<dyn RemoteEndpointClient>,
    pacer: Arc<dyn Pacer>,
    policy: PollPolicy,
}

impl ResyncStateMachine {
    /// Creates a machine that waits on the tokio timer.
    pub fn new(client: Arc<dyn RemoteEndpointClient>, policy: PollPolicy) -> Self {
        ResyncStateMachine {
            client,
            pacer: Arc::new(TokioPacer),
            policy,
        }
    }

    /// Replaces the pacer used between polls.
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Runs a full cycle for `endpoint`.
    pub async fn run(&self, endpoint: &EndpointDescriptor) -> RunOutcome {
        self.run_until_cancelled(endpoint, &CancellationToken::new())
            .await
    }

    /// Runs a full cycle for `endpoint`, stopping early once `cancel` fires.
    ///
    /// A cancelled run that already paused the endpoint still resumes it.
    pub async fn run_until_cancelled(
        &self,
        endpoint: &EndpointDescriptor,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let mut run = ResyncRun::start(endpoint);
        let span = info_span!("resync", endpoint = %endpoint.name, run_id = %run.id);

        async {
            self.cycle(endpoint, &mut run, cancel).await;
            if run.pause_attempted {
                self.resume(endpoint, &mut run).await;
            }

            info!(
                state = %run.state,
                attempts = run.attempts,
                resumed = run.resumed,
                failures = run.failures.len(),
                elapsed_ms = run.clock.elapsed().as_millis() as u64,
                "Resync run finished"
            );
        }
        .instrument(span)
        .await;

        run.finish()
    }

    async fn cycle(
        &self,
        endpoint: &EndpointDescriptor,
        run: &mut ResyncRun,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            info!("Cancelled before start, endpoint untouched");
            run.advance(ResyncState::Cancelled);
            return;
        }

        if !endpoint.has_work() {
            info!("No collections to resync, skipping endpoint");
            run.advance(ResyncState::Skipped);
            return;
        }

        info!(
            scope = %endpoint.scope,
            collections = ?endpoint.collections,
            "Starting resync"
        );

        // Set before the call: a lost response may still have paused it.
        run.pause_attempted = true;
        if let Err(e) = self.client.pause(&endpoint.name).await {
            warn!(error = %e, "Pause failed, continuing with resync");
            run.record(&e);
        }

        if cancel.is_cancelled() {
            warn!("Cancelled after pause, resync not started");
            run.advance(ResyncState::Cancelled);
            return;
        }

        if let Err(e) = self
            .client
            .start_resync(&endpoint.name, &endpoint.scope, &endpoint.collections)
            .await
        {
            error!(error = %e, "Start resync failed, polling anyway");
            run.record(&e);
        }
        run.advance(ResyncState::InProgress);

        let state = self.poll(endpoint, run, cancel).await;
        run.advance(state);

        match state {
            ResyncState::Completed => {
                info!(attempts = run.attempts, "Resync completed");
            }
            ResyncState::TimedOut => {
                let e = EngineError::ResyncTimedOut {
                    endpoint: endpoint.name.clone(),
                    attempts: run.attempts,
                };
                error!(error = %e, "Resync did not complete");
                run.record(&e);
            }
            ResyncState::Cancelled => {
                warn!(attempts = run.attempts, "Resync cancelled while polling");
            }
            _ => {}
        }
    }

    /// Polls until completion, budget exhaustion or cancellation.
    async fn poll(
        &self,
        endpoint: &EndpointDescriptor,
        run: &mut ResyncRun,
        cancel: &CancellationToken,
    ) -> ResyncState {
        let mut tracker = PollTracker::new(self.policy);

        while tracker.can_poll() {
            if cancel.is_cancelled() {
                return ResyncState::Cancelled;
            }

            let observed = match self.client.resync_status(&endpoint.name).await {
                Ok(report) => ResyncState::from_remote(report.state.as_deref()),
                Err(e) => {
                    warn!(
                        error = %e,
                        retryable = e.is_retryable(),
                        "Status poll failed, counting as in progress"
                    );
                    run.record(&e);
                    ResyncState::InProgress
                }
            };

            let decision = tracker.observe(observed);
            run.attempts = tracker.polls();
            info!(
                attempt = tracker.polls(),
                max = self.policy.max_retries,
                state = %observed,
                "Resync status"
            );

            match decision {
                PollDecision::Complete | PollDecision::Exhausted => break,
                PollDecision::Wait(period) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return ResyncState::Cancelled,
                        _ = self.pacer.wait(period) => {}
                    }
                }
            }
        }

        tracker.final_state()
    }

    async fn resume(&self, endpoint: &EndpointDescriptor, run: &mut ResyncRun) {
        match self.client.resume(&endpoint.name).await {
            Ok(()) => {
                run.resumed = true;
                info!("Endpoint resumed");
            }
            Err(e) => {
                let failure = EngineError::ResumeFailed {
                    endpoint: endpoint.name.clone(),
                    reason: e.to_string(),
                };
                error!(
                    paused = true,
                    error = %failure,
                    "Endpoint may be left paused, resume it manually"
                );
                run.record(&failure);
            }
        }
    }
}
