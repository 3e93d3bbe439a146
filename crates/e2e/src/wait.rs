//! Bounded polling
//!
//! Every action and assertion resolves its condition through [`poll`]: the
//! probe runs at least once, then repeatedly until it reports ready or the
//! budget is spent. Driver errors end the poll immediately. A probe that is
//! still running when the budget runs out is abandoned.

use std::future::Future;
use std::time::{Duration, Instant};

use loancheck_common::config::TimeoutConfig;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::error::E2eResult;

/// Timeout and poll interval for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBudget {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitBudget {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Default budget from configuration
    pub fn from_config(timeouts: &TimeoutConfig) -> Self {
        Self::new(timeouts.default_timeout(), timeouts.poll_interval())
    }

    /// Same interval, different timeout (per-call override)
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self { timeout, ..self },
            None => self,
        }
    }
}

/// One observation of a polled condition
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    /// Condition holds
    Ready(T),
    /// Not yet; carries what was observed for the eventual error message
    Pending(String),
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq)]
pub enum Polled<T> {
    Ready(T),
    TimedOut { last: String, waited: Duration },
}

impl<T> Polled<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Polled::Ready(_))
    }
}

/// Run `probe` until it is ready or `budget.timeout` elapses
pub async fn poll<T, F, Fut>(budget: WaitBudget, mut probe: F) -> E2eResult<Polled<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Probe<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0usize;
    let mut last = String::from("no observation");

    loop {
        attempts += 1;
        let remaining = budget.timeout.saturating_sub(start.elapsed());
        // A probe that resolves without yielding still counts on a zero budget
        let observed = match timeout(remaining, probe()).await {
            Ok(observed) => observed?,
            Err(_) => {
                let waited = start.elapsed();
                debug!("Probe still pending when the {:?} budget ran out", budget.timeout);
                return Ok(Polled::TimedOut { last, waited });
            }
        };
        match observed {
            Probe::Ready(value) => return Ok(Polled::Ready(value)),
            Probe::Pending(observed) => {
                last = observed;
                let waited = start.elapsed();
                if waited >= budget.timeout {
                    debug!("Gave up after {} attempt(s) in {:?}: {}", attempts, waited, last);
                    return Ok(Polled::TimedOut { last, waited });
                }
                let remaining = budget.timeout - waited;
                sleep(budget.interval.min(remaining)).await;
            }
        }
    }
}
