use crate::Error;
use futures::future;
use std::sync::Arc;
use tokio::{sync::watch, time};

/// How long a request waits for caches to sync before it is refused as not ready.
pub const DEFAULT_READY_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Holds a plugin's cache sync signals. Ready once every signal is true.
///
/// Each plugin owns its own gate, naming exactly the caches it reads.
#[derive(Clone, Debug)]
pub struct ReadyGate {
    signals: Vec<(Arc<str>, watch::Receiver<bool>)>,
    timeout: time::Duration,
}

// === impl ReadyGate ===

impl ReadyGate {
    pub fn new(timeout: time::Duration) -> Self {
        Self {
            signals: Vec::new(),
            timeout,
        }
    }

    pub fn with_signal(mut self, name: impl Into<Arc<str>>, synced: watch::Receiver<bool>) -> Self {
        self.signals.push((name.into(), synced));
        self
    }

    /// Names the caches this gate waits for.
    pub fn caches(&self) -> impl Iterator<Item = &str> + '_ {
        self.signals.iter().map(|(name, _)| &**name)
    }

    pub fn is_ready(&self) -> bool {
        self.signals.iter().all(|(_, rx)| *rx.borrow())
    }

    /// Waits up to `timeout` for all signals to become ready.
    pub async fn wait(&self, timeout: time::Duration) -> bool {
        if self.is_ready() {
            return true;
        }

        let waits = self.signals.iter().map(|(_, rx)| {
            let mut rx = rx.clone();
            async move { rx.wait_for(|synced| *synced).await.is_ok() }
        });
        match time::timeout(timeout, future::join_all(waits)).await {
            Ok(results) => results.into_iter().all(|ok| ok),
            Err(_) => false,
        }
    }

    /// Fails with [`Error::NotReady`] unless all caches sync within the gate's timeout.
    pub async fn ensure(&self, plugin: &'static str) -> Result<(), Error> {
        if self.wait(self.timeout).await {
            return Ok(());
        }

        let pending = self
            .signals
            .iter()
            .filter(|(_, rx)| !*rx.borrow())
            .map(|(name, _)| &**name)
            .collect::<Vec<_>>();
        tracing::info!(plugin, ?pending, "Caches not yet synced");
        Err(Error::NotReady { plugin })
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new(DEFAULT_READY_TIMEOUT)
    }
}
