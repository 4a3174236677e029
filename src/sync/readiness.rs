//! Bounded readiness polling
//!
//! Waits for an external precondition (a view existing, a view being idle, a
//! change list being populated) by re-evaluating it a fixed number of times
//! with a fixed pause in between.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Attempt budget for one readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl PollBudget {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Waiting for the change view to exist
    pub const SURFACE: Self = Self::new(20, Duration::from_millis(500));
    /// Waiting for the change view to stop refreshing
    pub const NOT_BUSY: Self = Self::new(20, Duration::from_millis(500));
    /// Waiting for the change list handle to exist
    pub const CHANGE_LIST: Self = Self::new(20, Duration::from_millis(500));
    /// Waiting for the change list to fill
    pub const CHANGES: Self = Self::new(10, Duration::from_millis(500));
}

/// Re-evaluates a condition within a [`PollBudget`]
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    budget: PollBudget,
}

impl ReadinessPoller {
    pub fn new(budget: PollBudget) -> Self {
        Self { budget }
    }

    /// True as soon as `predicate` is; false once the budget is spent.
    ///
    /// Attempt `k` runs after `k - 1` sleeps; there is no sleep before the
    /// first attempt nor after the last.
    pub async fn poll<F, Fut>(&self, mut predicate: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        self.poll_value(|| {
            let fut = predicate();
            async move { fut.await.then_some(()) }
        })
        .await
        .is_some()
    }

    /// Like [`poll`](Self::poll) for conditions that produce a value once met
    pub async fn poll_value<T, F, Fut>(&self, mut check: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.budget.max_attempts {
            if let Some(value) = check().await {
                debug!("Readiness reached on attempt {}", attempt);
                return Some(value);
            }
            if attempt < self.budget.max_attempts {
                tokio::time::sleep(self.budget.delay).await;
            }
        }
        debug!(
            "Readiness not reached after {} attempts",
            self.budget.max_attempts
        );
        None
    }
}

/// Shorthand for `ReadinessPoller::new(budget).poll(predicate)`
pub async fn poll_until<F, Fut>(budget: PollBudget, predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    ReadinessPoller::new(budget).poll(predicate).await
}
