//! Tagged outcome of one accessor call.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{AccessError, AccessResult};

/// Boxed future as produced by `async_trait` methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one attempt against one accessor.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    Failed(AccessError),
}

impl<T> Attempt<T> {
    /// Run `call`, bounded by `timeout` and abandoned as soon as `cancel` fires.
    pub async fn run(
        accessor: &str,
        call: BoxFuture<'_, AccessResult<T>>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Self {
        if cancel.is_cancelled() {
            return Attempt::Failed(AccessError::Cancelled);
        }

        let bounded = async {
            match timeout {
                Some(timeout) => tokio::time::timeout(timeout, call)
                    .await
                    .unwrap_or_else(|_| {
                        Err(AccessError::Timeout {
                            accessor: accessor.to_string(),
                            timeout,
                        })
                    }),
                None => call.await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AccessError::Cancelled),
            result = bounded => result,
        };
        result.into()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Attempt::Success(_))
    }

    pub fn into_result(self) -> AccessResult<T> {
        match self {
            Attempt::Success(value) => Ok(value),
            Attempt::Failed(error) => Err(error),
        }
    }
}

impl<T> From<AccessResult<T>> for Attempt<T> {
    fn from(result: AccessResult<T>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(error) => Attempt::Failed(error),
        }
    }
}
