use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Shared flag used to abandon a pending readiness wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The check succeeded on this (1-based) attempt.
    Ready { attempts: u32 },
    Cancelled,
}

/// Wait until `is_ready` reports the map library is loaded.
///
/// The check runs immediately and then once per `interval`, with no attempt
/// limit. `sleep` supplies the timer so the same loop runs on browser timers
/// and in tests.
pub async fn wait_until_ready<P, S, F>(
    mut is_ready: P,
    interval: Duration,
    cancel: &CancelToken,
    mut sleep: S,
) -> Readiness
where
    P: FnMut() -> bool,
    S: FnMut(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut attempts: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Readiness::Cancelled;
        }
        attempts = attempts.saturating_add(1);
        if is_ready() {
            if attempts > 1 {
                tracing::info!(attempts, "Map library is now available");
            }
            return Readiness::Ready { attempts };
        }
        if attempts == 1 {
            tracing::warn!("Map library not loaded yet, waiting");
        }
        sleep(interval).await;
    }
}
