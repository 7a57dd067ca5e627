// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use safe_rpc::CallContext;

use crate::TransferError;

/// Exponential backoff for transient transport failures.
///
/// Retried calls are re-issued unchanged, so anything keyed by the trace id
/// stays idempotent on the server.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn run<T>(
        &self,
        ctx: &CallContext,
        label: &str,
        mut op: impl FnMut() -> Result<T, TransferError>,
    ) -> Result<T, TransferError> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let mut delay = self.delay_for(attempt);
                    if let Some(left) = ctx.remaining()? {
                        delay = delay.min(left);
                    }
                    tracing::warn!(label, attempt, ?delay, error = %e, "transient failure, retrying");
                    std::thread::sleep(delay);
                    ctx.check()?;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safe_rpc::RpcError;

    fn transient() -> TransferError {
        TransferError::Transport(RpcError::Status {
            path: "/safe/keys".into(),
            status: 503,
        })
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let mut calls = 0;
        let out = quick(3)
            .run(&CallContext::new(), "test", || {
                calls += 1;
                if calls < 3 {
                    Err(transient())
                } else {
                    Ok(calls)
                }
            })
            .unwrap();
        assert_eq!(out, 3);
    }

    #[test]
    fn attempts_are_bounded() {
        let mut calls = 0;
        let err = quick(2)
            .run(&CallContext::new(), "test", || -> Result<(), _> {
                calls += 1;
                Err(transient())
            })
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls, 2);
    }

    #[test]
    fn application_errors_are_not_retried() {
        let mut calls = 0;
        let err = quick(5)
            .run(&CallContext::new(), "test", || -> Result<(), _> {
                calls += 1;
                Err(TransferError::IntegrityMismatch)
            })
            .unwrap_err();
        assert!(matches!(err, TransferError::IntegrityMismatch));
        assert_eq!(calls, 1);
    }

    #[test]
    fn cancellation_stops_the_retry_loop() {
        let ctx = CallContext::new();
        let mut calls = 0;
        let err = quick(5)
            .run(&ctx, "test", || -> Result<(), _> {
                calls += 1;
                ctx.cancel();
                Err(transient())
            })
            .unwrap_err();
        assert!(matches!(err, TransferError::Transport(RpcError::Cancelled)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_secs(2));
    }
}
