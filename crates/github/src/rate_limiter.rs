use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::model::RateLimitSnapshot;

const DEFAULT_MINIMUM_SLEEP: Duration = Duration::from_millis(50);

struct State {
    snapshot: Option<RateLimitSnapshot>,
    estimated_cost: f64,
}

/// Serializes rate-limit accounting across every concurrent caller.
/// Holds the mutex for the whole of each operation except the sleep in
/// `acquire`, which happens outside the lock.
pub struct RateCoordinator {
    state: Mutex<State>,
    minimum_sleep: Duration,
}

impl Default for RateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RateCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                snapshot: None,
                estimated_cost: 1.0,
            }),
            minimum_sleep: DEFAULT_MINIMUM_SLEEP,
        }
    }

    #[cfg(test)]
    pub fn with_minimum_sleep(minimum_sleep: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                snapshot: None,
                estimated_cost: 1.0,
            }),
            minimum_sleep,
        }
    }

    /// Blocks until the estimated cost of the next request fits the
    /// remaining budget, then reserves that amount.
    pub async fn acquire(&self) {
        loop {
            let outcome = {
                let mut state = self.state.lock().await;
                let needed = state.estimated_cost.ceil() as u32;
                match state.snapshot {
                    None => return,
                    Some(snapshot) if snapshot.remaining >= needed => {
                        if let Some(snap) = state.snapshot.as_mut() {
                            snap.remaining -= needed;
                        }
                        return;
                    }
                    Some(snapshot) => {
                        let now = Utc::now();
                        let wait = (snapshot.reset_at - now)
                            .to_std()
                            .unwrap_or(Duration::ZERO)
                            .max(self.minimum_sleep);
                        Some((wait, snapshot))
                    }
                }
            };

            let Some((wait, observed)) = outcome else {
                return;
            };
            sleep(wait).await;

            let mut state = self.state.lock().await;
            if state.snapshot == Some(observed) {
                state.snapshot = None;
            }
        }
    }

    /// Installs a fresh snapshot and folds its cost into the EMA.
    pub async fn record(&self, snapshot: RateLimitSnapshot) {
        let mut state = self.state.lock().await;
        if snapshot.cost > 0 {
            state.estimated_cost = (0.5 * state.estimated_cost + 0.5 * snapshot.cost as f64).max(1.0);
        }
        state.snapshot = Some(snapshot);
    }

    /// Discards the current snapshot after a transport failure so
    /// stale accounting does not stall callers.
    pub async fn reset(&self) {
        self.state.lock().await.snapshot = None;
    }

    pub async fn remaining(&self) -> Option<u32> {
        self.state.lock().await.snapshot.map(|s| s.remaining)
    }
}
