//! Bounded polling of remote resources.

use std::future::Future;

use tracing::debug;

use crate::config::PollPolicy;
use crate::error::{GeminiError, GeminiResult};
use crate::metrics::record_poll;

/// Outcome of one status fetch.
#[derive(Debug)]
pub(crate) enum PollStatus<T> {
    Pending,
    Ready(T),
}

/// Fetch a status every `policy.interval` until it is ready.
///
/// `operation` labels the poll metric; `what` names the resource in logs and in
/// the timeout error.
///
/// The interval elapses before every fetch, so a resource that becomes ready on
/// the Nth status check costs exactly N fetches. Fails with
/// [`GeminiError::PollTimeout`] after `policy.max_attempts` pending fetches; any
/// error from `fetch` ends polling immediately.
pub(crate) async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    operation: &str,
    what: &str,
    mut fetch: F,
) -> GeminiResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = GeminiResult<PollStatus<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;
        record_poll(operation);

        match fetch(attempt).await? {
            PollStatus::Ready(value) => {
                debug!(what = %what, attempt, "Poll finished");
                return Ok(value);
            }
            PollStatus::Pending => {
                debug!(what = %what, attempt, max_attempts = policy.max_attempts, "Still pending");
            }
        }
    }

    Err(GeminiError::poll_timeout(what, policy.max_attempts))
}
