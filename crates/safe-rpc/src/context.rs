// SPDX-License-Identifier: Apache-2.0
//! Per-call deadline and cancellation signal shared by every network call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::RpcError;

/// Carries an optional deadline and a cancellation flag through a pipeline run.
///
/// Clones share the same flag, so cancelling any clone cancels them all.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl CallContext {
    /// A context that never expires until cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails if the context is cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), RpcError> {
        self.remaining().map(|_| ())
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Result<Option<Duration>, RpcError> {
        if self.is_cancelled() {
            return Err(RpcError::Cancelled);
        }
        match self.deadline {
            None => Ok(None),
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    Err(RpcError::DeadlineExceeded)
                } else {
                    Ok(Some(left))
                }
            }
        }
    }
}
