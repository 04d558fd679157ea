//! # Fleet Orchestrator
//!
//! Runs the resync cycle across a list of endpoints, one at a time.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   deploy_then_resync                                                    │
//! │     │                                                                   │
//! │     ├─► FunctionDeployer::deploy_all   (every function, in order)       │
//! │     │                                                                   │
//! │     └─► run_all_until_cancelled                                         │
//! │           │                                                             │
//! │           ├─► endpoint 1: pause → resync → poll → resume                │
//! │           ├─► endpoint 2: pause → resync → poll → resume                │
//! │           └─► ...                                                       │
//! │                                                                         │
//! │   A failed endpoint never stops the next one. After cancellation the   │
//! │   current endpoint is resumed and the rest are reported as cancelled.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Endpoints are never processed in parallel: they share one backend
//! cluster, and at most one of them is paused at any time.

use chrono::Utc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use resync_core::{EndpointDescriptor, FleetReport, ResyncState, RunOutcome};

use crate::deploy::{FunctionAsset, FunctionDeployer};
use crate::machine::ResyncStateMachine;

/// Sequences [`ResyncStateMachine`] runs over a fleet of endpoints.
#[derive(Clone)]
pub struct FleetOrchestrator {
    machine: ResyncStateMachine,
}

impl FleetOrchestrator {
    pub fn new(machine: ResyncStateMachine) -> Self {
        FleetOrchestrator { machine }
    }

    /// Runs every endpoint in order and returns one outcome per endpoint.
    pub async fn run_all(&self, endpoints: &[EndpointDescriptor]) -> Vec<RunOutcome> {
        self.run_all_until_cancelled(endpoints, &CancellationToken::new())
            .await
    }

    /// Like [`run_all`](Self::run_all), but stops starting new cycles once
    /// `cancel` fires.
    pub async fn run_all_until_cancelled(
        &self,
        endpoints: &[EndpointDescriptor],
        cancel: &CancellationToken,
    ) -> Vec<RunOutcome> {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(endpoints.len());

        info!(endpoints = endpoints.len(), "Starting fleet resync");

        let mut announced = false;
        for endpoint in endpoints {
            if cancel.is_cancelled() && !announced {
                announced = true;
                warn!(
                    remaining = endpoints.len() - outcomes.len(),
                    "Fleet resync cancelled, remaining endpoints are not touched"
                );
            }

            let outcome = self.machine.run_until_cancelled(endpoint, cancel).await;
            if !outcome.is_success() && outcome.state != ResyncState::Cancelled {
                warn!(endpoint = %endpoint.name, state = %outcome.state, "Endpoint failed, continuing");
            }
            outcomes.push(outcome);
        }

        let completed = outcomes
            .iter()
            .filter(|o| o.state == ResyncState::Completed)
            .count();
        info!(
            endpoints = outcomes.len(),
            completed,
            failed = outcomes.iter().filter(|o| !o.is_success()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fleet resync finished"
        );

        outcomes
    }

    /// Runs the fleet resync and wraps the outcomes in a report.
    pub async fn resync_fleet(
        &self,
        endpoints: &[EndpointDescriptor],
        cancel: &CancellationToken,
    ) -> FleetReport {
        let started_at = Utc::now();
        let outcomes = self.run_all_until_cancelled(endpoints, cancel).await;
        FleetReport::new(started_at, Utc::now(), Vec::new(), outcomes)
    }

    /// Deploys every function first, then resyncs the fleet.
    ///
    /// A failed deploy is reported but does not prevent the resync.
    pub async fn deploy_then_resync(
        &self,
        deployer: &FunctionDeployer,
        assets: &[FunctionAsset],
        endpoints: &[EndpointDescriptor],
        cancel: &CancellationToken,
    ) -> FleetReport {
        let started_at = Utc::now();

        let deploys = deployer.deploy_all(assets, cancel).await;
        let failed = deploys.iter().filter(|d| !d.deployed).count();
        if failed > 0 {
            warn!(failed, total = deploys.len(), "Some functions failed to deploy");
        }

        let outcomes = self.run_all_until_cancelled(endpoints, cancel).await;
        FleetReport::new(started_at, Utc::now(), deploys, outcomes)
    }
}
