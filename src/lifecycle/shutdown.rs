//! Process-wide stop signal.
//!
//! `main` owns one [`Shutdown`]; the signal task fires it and the HTTP
//! server holds a receiver that ends `axum::serve` gracefully.

use tokio::sync::broadcast;

/// One-shot fan-out: every receiver taken before `trigger` sees it once.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for [`HttpServer::run`](crate::http::HttpServer::run).
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. A no-op when nobody listens.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Receivers still alive, i.e. servers that have not stopped yet.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut metrics = shutdown.subscribe();
        assert_eq!(shutdown.listeners(), 2);

        shutdown.trigger();
        assert!(server.recv().await.is_ok());
        assert!(metrics.recv().await.is_ok());
    }

    #[tokio::test]
    async fn dropped_receivers_are_not_counted() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        drop(rx);
        assert_eq!(shutdown.listeners(), 0);
    }

    #[test]
    fn trigger_without_subscribers_is_harmless() {
        Shutdown::default().trigger();
    }
}
