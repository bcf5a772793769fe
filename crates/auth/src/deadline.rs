//! Caller-supplied deadlines for store calls and lock waits.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::AuthError;

/// Point in time after which an operation gives up with `Timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No bound.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn within(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    /// Drive `fut` to completion unless the deadline passes first.
    pub async fn run<F>(self, op: &'static str, fut: F) -> Result<F::Output, AuthError>
    where
        F: Future,
    {
        match self.0 {
            None => Ok(fut.await),
            Some(at) => tokio::time::timeout_at(at, fut).await.map_err(|_| {
                tracing::warn!(op, "deadline exceeded");
                AuthError::Timeout(op)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn unbounded_deadline_waits() {
        let out = Deadline::none()
            .run("sleep", async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                7
            })
            .await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_names_the_operation() {
        let err = Deadline::within(Duration::from_millis(10))
            .run("store.find_by_id", tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Timeout("store.find_by_id"));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
