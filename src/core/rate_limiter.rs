use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimiterError {
    #[error("max_requests must be greater than zero")]
    ZeroRequests,

    #[error("period must be greater than zero")]
    ZeroPeriod,
}

/// Sliding-window admission control shared by every caller of the directory.
///
/// At most `max_requests` calls are admitted within any trailing `period`.
/// Callers are admitted in arrival order: one waiter at a time holds the
/// turn and re-checks the window after sleeping, the rest queue on `turn`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    period: Duration,
    /// Tokio's mutex is FIFO, so it doubles as the waiter queue
    turn: Mutex<()>,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, period: Duration) -> Result<Self, RateLimiterError> {
        if max_requests == 0 {
            return Err(RateLimiterError::ZeroRequests);
        }
        if period.is_zero() {
            return Err(RateLimiterError::ZeroPeriod);
        }

        Ok(Self {
            max_requests,
            period,
            turn: Mutex::new(()),
            admitted: Mutex::new(VecDeque::with_capacity(max_requests.min(1024))),
        })
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until the window has room, then register this call.
    ///
    /// A caller never overtakes an earlier one still waiting. Dropping the
    /// future while it waits registers nothing and gives up its place.
    pub async fn acquire(&self) {
        let _turn = self.turn.lock().await;
        loop {
            let wait = {
                let mut admitted = self.admitted.lock().await;
                let now = Instant::now();
                self.prune(&mut admitted, now);

                if admitted.len() < self.max_requests {
                    admitted.push_back(now);
                    return;
                }

                // Full: sleep until the oldest entry leaves the window
                admitted
                    .front()
                    .map(|oldest| (*oldest + self.period).saturating_duration_since(now))
                    .unwrap_or(self.period)
            };

            tracing::trace!("Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of calls registered in the current window
    pub async fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        self.prune(&mut admitted, Instant::now());
        admitted.len()
    }

    fn prune(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = admitted.front() {
            if now.duration_since(*oldest) >= self.period {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}
