//! # Pacer
//!
//! The only suspension point of the resync cycle: the wait between two
//! status polls. It sits behind a trait so tests can count waits instead of
//! sleeping.

use async_trait::async_trait;
use std::time::Duration;

/// Suspends the current task between polls.
///
/// Implementations must yield to the runtime rather than block the thread.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self, period: Duration);
}

/// Waits on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn wait(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}
