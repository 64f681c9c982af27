//! Lifecycle state and request admission for graceful shutdown.
//!
//! The lifecycle lives in an `ArcSwap` so probes read it without locking.
//! Each admitted request holds a [`RequestGuard`] that is counted until
//! dropped, so shutdown can wait for in-flight work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Server lifecycle: `Starting -> Ready -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Tracks the lifecycle and the requests currently being served.
#[derive(Debug)]
pub struct ShutdownController {
    signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    state: ArcSwap<HealthState>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        let (signal, _rx) = watch::channel(false);
        Self {
            signal,
            in_flight: Arc::new(AtomicU64::new(0)),
            state: ArcSwap::from_pointee(HealthState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    /// Moves to `Draining` and wakes every [`wait_for_signal`](Self::wait_for_signal) caller.
    pub fn trigger_shutdown(&self) {
        self.state.store(Arc::new(HealthState::Draining));
        let _ = self.signal.send(true);
    }

    /// Resolves once [`trigger_shutdown`](Self::trigger_shutdown) has run.
    pub async fn wait_for_signal(&self) {
        let mut rx = self.signal.subscribe();
        // Sender lives in self, so wait_for only fails if self is gone.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.state.load()
    }

    /// Admits a request while the server is `Ready`.
    ///
    /// Returns `None` in any other state. The guard keeps the request
    /// counted as in flight until it is dropped.
    #[must_use]
    pub fn admit(&self) -> Option<RequestGuard> {
        if self.health_state() != HealthState::Ready {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        Some(RequestGuard {
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits up to `timeout` for in-flight requests to finish.
    ///
    /// On success the state becomes `Stopped` and `true` is returned. On
    /// timeout the state is left as is.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.in_flight_count() == 0 {
                self.state.store(Arc::new(HealthState::Stopped));
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts one admitted request until dropped.
#[derive(Debug)]
pub struct RequestGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
