/*!
 * Bounded retry on pending protocol replies
 *
 * A server may answer any request with `PENDING`: the operation was
 * accepted but has not completed, and the same request should be issued
 * again. The policy here re-polls with no backoff until the reply changes
 * or a wall-clock budget (the client session timeout) runs out.
 */

use std::time::{Duration, Instant};

use crate::status::NtStatus;

/// Why a retried operation did not produce a value
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError {
    /// Still pending when the budget ran out
    Timeout { budget: Duration, elapsed: Duration },
    /// A non-pending status; end-of-file included. Never retried.
    Status(NtStatus),
}

/// Elapsed-time-bounded retry loop for a single protocol request.
///
/// Separate from the stream so the bound can be tested without a stream
/// and swapped without touching engine logic.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    budget: Duration,
}

impl RetryPolicy {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `op` until it returns something other than `PENDING`.
    ///
    /// The op always runs at least once. The clock starts at the first
    /// attempt and is checked after every pending reply; once elapsed time
    /// exceeds the budget the call fails with [`RetryError::Timeout`].
    pub fn run<T, F>(&self, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Result<T, NtStatus>,
    {
        let started = Instant::now();
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(status) if status.is_pending() => {
                    let elapsed = started.elapsed();
                    if elapsed > self.budget {
                        return Err(RetryError::Timeout {
                            budget: self.budget,
                            elapsed,
                        });
                    }
                }
                Err(status) => return Err(RetryError::Status(status)),
            }
        }
    }
}
