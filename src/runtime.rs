use std::{future::Future, time::Duration};

use crate::error::{ErrorKind, Result};

/// Await `future` for at most `timeout`, reporting expiry as an [`ErrorKind::Timeout`] for
/// `operation`.
pub(crate) async fn timeout<F: Future>(
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> Result<F::Output> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| ErrorKind::Timeout { operation, timeout }.into())
}
