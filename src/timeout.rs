//! Cancelable execution of blocking jobs with a polling deadline.
//!
//! The math evaluators funnel every arithmetic operation through
//! [`run_with_timeout`]: the job runs on a blocking worker, readiness is
//! polled on an interval, and the caller gets [`TimeoutError`] once the
//! limit passes without a result.

use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};

/// Raised when a job does not finish within its limit.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("execution timed out before terminating")]
pub struct TimeoutError;

/// Run `job` on a blocking worker, polling every `poll` until it finishes
/// or `limit` elapses. On timeout the worker is detached and abandoned.
pub async fn run_with_timeout<T, F>(
    limit: Duration,
    poll: Duration,
    job: F,
) -> Result<T, TimeoutError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let deadline = Instant::now() + limit;
    let handle = tokio::task::spawn_blocking(job);
    let finished = loop {
        if handle.is_finished() {
            break true;
        }
        if Instant::now() >= deadline {
            break false;
        }
        sleep(poll).await;
    };
    if finished {
        handle.await.map_err(|_| TimeoutError)
    } else {
        handle.abort();
        Err(TimeoutError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quick_job_completes() {
        let value = run_with_timeout(
            Duration::from_secs(5),
            Duration::from_millis(10),
            || 2 + 2,
        )
        .await;
        assert_eq!(value, Ok(4));
    }

    #[tokio::test]
    async fn slow_job_times_out() {
        let value = run_with_timeout(
            Duration::from_millis(50),
            Duration::from_millis(10),
            || {
                std::thread::sleep(Duration::from_millis(500));
                0
            },
        )
        .await;
        assert_eq!(value, Err(TimeoutError));
    }
}
