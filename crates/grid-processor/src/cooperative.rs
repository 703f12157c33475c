//! Time-boxed cooperative yielding for long CPU loops.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{GridProcessorError, Result};

/// Default slice of work between yields.
pub const DEFAULT_YIELD_BUDGET: Duration = Duration::from_millis(16);

/// Tracks elapsed work and yields to the scheduler once the budget is spent.
///
/// Call [`checkpoint`](Self::checkpoint) between units of work. It returns
/// `Err(Cancelled)` as soon as the token is set.
#[derive(Debug)]
pub struct CooperativeBudget {
    token: CancellationToken,
    budget: Duration,
    slice_start: Instant,
    yields: usize,
}

impl CooperativeBudget {
    pub fn new(token: CancellationToken, budget: Duration) -> Self {
        Self {
            token,
            budget,
            slice_start: Instant::now(),
            yields: 0,
        }
    }

    /// Fail fast if the token is already cancelled.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(GridProcessorError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Yield when the current slice is over budget, then re-check the token.
    pub async fn checkpoint(&mut self) -> Result<()> {
        if self.slice_start.elapsed() >= self.budget {
            tokio::task::yield_now().await;
            self.yields += 1;
            self.slice_start = Instant::now();
        }
        self.check()
    }

    /// Number of times the budget forced a yield.
    pub fn yields(&self) -> usize {
        self.yields
    }
}
