//! Shutdown coordination.

use tokio::sync::broadcast;

use crate::lifecycle::startup::Services;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Final teardown: replay the log buffer, then close both stores.
///
/// Returns the number of buffered records persisted.
pub async fn teardown(services: &Services) -> usize {
    let flushed = services.logger.flush().await;
    let remaining = services.logger.buffer().depth;
    if remaining > 0 {
        tracing::warn!(remaining = remaining, "Buffered logs lost at shutdown");
    }

    if let Err(e) = services.kv.close().await {
        tracing::warn!(error = %e, "Failed to close key-value store");
    }
    if let Err(e) = services.logger.close().await {
        tracing::warn!(error = %e, "Failed to close log store");
    }

    tracing::info!(flushed = flushed, "Teardown complete");
    flushed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
