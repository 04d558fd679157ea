//! # resync-engine: Pause / Resync / Resume Engine
//!
//! This crate performs the I/O side of an endpoint resync: HTTP calls to the
//! control plane, the poll loop with its waits, fleet sequencing and the
//! function deploy that precedes it.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Resync Engine Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 FleetOrchestrator (orchestrator)                 │  │
//! │  │                                                                  │  │
//! │  │  deploy functions ──► endpoint 1 ──► endpoint 2 ──► ...          │  │
//! │  │  strictly sequential, failures isolated per endpoint             │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ FunctionDeployer│ │ ResyncState-   │  │  Pacer                 │    │
//! │  │                │  │ Machine        │  │                        │    │
//! │  │ Reads sources, │  │ pause, resync, │  │ Non-blocking wait      │    │
//! │  │ unwraps module │  │ poll, resume   │  │ between polls          │    │
//! │  │ exports, PUTs  │  │ exactly once   │  │                        │    │
//! │  └───────┬────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │          │                   │                                          │
//! │          ▼                   ▼                                          │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │        HttpEndpointClient (reqwest, bearer auth, timeouts)       │  │
//! │  │  RemoteEndpointClient + AccessFunctionPublisher                  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ResyncConfig (TOML + RESYNC_* env) feeds the client and the policy.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - Remote control-plane traits and the reqwest client
//! - [`config`] - Connection, poll, HTTP and endpoint configuration
//! - [`deploy`] - Access-control function deployment
//! - [`error`] - Engine error types
//! - [`machine`] - Single-endpoint resync state machine
//! - [`orchestrator`] - Sequential fleet runs and reports
//! - [`pacer`] - Suspension between polls
//!
//! ## Usage
//!
//! ```rust,ignore
//! use resync_engine::{FleetOrchestrator, HttpEndpointClient, ResyncConfig, ResyncStateMachine};
//! use std::sync::Arc;
//!
//! let config = ResyncConfig::load(None)?;
//! let client = Arc::new(HttpEndpointClient::new(config.connection.clone(), &config.http)?);
//!
//! let machine = ResyncStateMachine::new(client, config.poll_policy());
//! let outcomes = FleetOrchestrator::new(machine)
//!     .run_all(&config.descriptors())
//!     .await;
//!
//! for outcome in &outcomes {
//!     println!("{}", outcome);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod machine;
pub mod orchestrator;
pub mod pacer;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{
    AccessFunctionPublisher, HttpEndpointClient, RemoteEndpointClient, ResyncStatusReport,
};
pub use config::{ConnectionConfig, EndpointSettings, ResyncConfig};
pub use deploy::{FunctionAsset, FunctionDeployer};
pub use error::{EngineError, EngineResult};
pub use machine::ResyncStateMachine;
pub use orchestrator::FleetOrchestrator;
pub use pacer::{Pacer, TokioPacer};
